//! Combining several collections into one sectioned collection.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use trellis_core::logging::targets;
use trellis_core::{ConnectionId, Signal};

use super::model::Model;
use super::state::CollectionState;
use super::traits::ModelCollection;

/// Presents N collections as one, section after section.
///
/// The state is [`CollectionState::flatten`] of the sub-states, recomputed
/// and re-emitted whenever any sub-collection notifies. A sub-collection with
/// no models still occupies one (empty) section, so section positions stay
/// stable while parts of the whole are loading.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis::collection::{
///     ModelCollection, MultiplexModelCollection, StaticModel, StaticModelCollection,
/// };
///
/// let pinned = Arc::new(StaticModelCollection::from_models("pinned", vec![StaticModel::new("p", ())]));
/// let recent = Arc::new(StaticModelCollection::from_models("recent", vec![StaticModel::new("r", ())]));
///
/// let combined = MultiplexModelCollection::new("home", vec![pinned, recent]);
/// assert_eq!(combined.state().sections().len(), 2);
/// ```
pub struct MultiplexModelCollection<M: Model> {
    inner: Arc<MultiplexInner<M>>,
    connections: Vec<ConnectionId>,
}

struct MultiplexInner<M: Model> {
    id: String,
    sources: Vec<Arc<dyn ModelCollection<M>>>,
    state: RwLock<CollectionState<M>>,
    state_changed: Signal<CollectionState<M>>,
}

impl<M: Model> MultiplexModelCollection<M> {
    /// Combine `sources`, in order.
    pub fn new(id: impl Into<String>, sources: Vec<Arc<dyn ModelCollection<M>>>) -> Self {
        let state = CollectionState::flatten(&sources.iter().map(|s| s.state()).collect::<Vec<_>>());
        let inner = Arc::new(MultiplexInner {
            id: id.into(),
            sources,
            state: RwLock::new(state),
            state_changed: Signal::new(),
        });

        let connections = inner
            .sources
            .iter()
            .map(|source| {
                let weak: Weak<MultiplexInner<M>> = Arc::downgrade(&inner);
                source.state_changed().connect(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh();
                    }
                })
            })
            .collect();

        Self { inner, connections }
    }

    /// The combined collections.
    pub fn sources(&self) -> &[Arc<dyn ModelCollection<M>>] {
        &self.inner.sources
    }
}

impl<M: Model> MultiplexInner<M> {
    fn refresh(&self) {
        let states: Vec<_> = self.sources.iter().map(|s| s.state()).collect();
        let state = CollectionState::flatten(&states);
        tracing::trace!(
            target: targets::COLLECTION,
            collection = %self.id,
            sources = states.len(),
            ?state,
            "multiplexed state recomputed"
        );

        *self.state.write() = state.clone();
        self.state_changed.emit(state);
    }
}

impl<M: Model> ModelCollection<M> for MultiplexModelCollection<M> {
    fn collection_id(&self) -> &str {
        &self.inner.id
    }

    fn state(&self) -> CollectionState<M> {
        self.inner.state.read().clone()
    }

    fn state_changed(&self) -> &Signal<CollectionState<M>> {
        &self.inner.state_changed
    }
}

impl<M: Model> Drop for MultiplexModelCollection<M> {
    fn drop(&mut self) {
        for (source, id) in self.inner.sources.iter().zip(&self.connections) {
            source.state_changed().disconnect(*id);
        }
    }
}
