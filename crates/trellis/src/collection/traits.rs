//! The collection trait.

use trellis_core::{ConnectionId, Signal};

use super::model::Model;
use super::state::CollectionState;

/// An observable, sectioned collection of models.
///
/// Implementations hold their current [`CollectionState`] and emit every new
/// state through [`state_changed`](Self::state_changed), synchronously and
/// after the state is readable through [`state`](Self::state).
///
/// Collections are single-writer: mutate and observe them from one serial
/// context.
pub trait ModelCollection<M: Model>: Send + Sync {
    /// Identifier used in logs and diagnostics.
    fn collection_id(&self) -> &str;

    /// The current state.
    fn state(&self) -> CollectionState<M>;

    /// Signal emitted with each new state.
    fn state_changed(&self) -> &Signal<CollectionState<M>>;
}

/// Subscription helpers for any [`ModelCollection`], trait objects included.
pub trait ModelCollectionExt<M: Model> {
    /// Subscribe to state changes. Keep the returned id to unsubscribe.
    fn observe<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&CollectionState<M>) + Send + Sync + 'static;

    /// Remove a subscription made with [`observe`](Self::observe).
    fn unobserve(&self, id: ConnectionId) -> bool;
}

impl<M: Model, C: ModelCollection<M> + ?Sized> ModelCollectionExt<M> for C {
    fn observe<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&CollectionState<M>) + Send + Sync + 'static,
    {
        self.state_changed().connect(f)
    }

    fn unobserve(&self, id: ConnectionId) -> bool {
        self.state_changed().disconnect(id)
    }
}
