//! A collection driven by explicit events.

use parking_lot::RwLock;
use trellis_core::logging::targets;
use trellis_core::{SerialAffinity, Signal};

use super::model::Model;
use super::state::{CollectionError, CollectionState, Sections};
use super::traits::ModelCollection;

/// Input accepted by [`SimpleModelCollection::on_next`].
///
/// Each case maps one-to-one onto the state the collection moves into.
#[derive(Debug, Clone)]
pub enum CollectionEvent<M> {
    /// Start (or continue) loading, optionally with partial data.
    Loading(Option<Sections<M>>),
    /// Loading finished with these sections.
    Loaded(Sections<M>),
    /// Loading failed.
    Error(CollectionError),
}

/// The easiest way to wrap a producer into a [`ModelCollection`].
///
/// Starts `NotLoaded`; every [`on_next`](Self::on_next) replaces the state
/// and notifies observers before returning.
///
/// # Example
///
/// ```
/// use trellis::collection::{CollectionEvent, ModelCollection, SimpleModelCollection, StaticModel};
///
/// let collection = SimpleModelCollection::new("inbox");
/// assert!(collection.state().is_not_loaded());
///
/// collection.on_next(CollectionEvent::Loaded(vec![vec![StaticModel::new("m1", "hello")]]));
/// assert_eq!(collection.state().model_count(), 1);
/// ```
pub struct SimpleModelCollection<M: Model> {
    id: String,
    state: RwLock<CollectionState<M>>,
    state_changed: Signal<CollectionState<M>>,
    affinity: SerialAffinity,
}

impl<M: Model> SimpleModelCollection<M> {
    /// Create a collection in the `NotLoaded` state.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(CollectionState::NotLoaded),
            state_changed: Signal::new(),
            affinity: SerialAffinity::new(),
        }
    }

    /// Move to the state matching `event` and notify observers.
    ///
    /// # Panics
    ///
    /// With thread checks enabled, panics if called from a different thread
    /// than earlier calls.
    pub fn on_next(&self, event: CollectionEvent<M>) {
        self.affinity.check("SimpleModelCollection::on_next");

        let state = match event {
            CollectionEvent::Loading(sections) => CollectionState::Loading(sections),
            CollectionEvent::Loaded(sections) => CollectionState::Loaded(sections),
            CollectionEvent::Error(err) => CollectionState::Error(err),
        };
        tracing::debug!(
            target: targets::COLLECTION,
            collection = %self.id,
            ?state,
            "collection state changed"
        );

        *self.state.write() = state.clone();
        self.state_changed.emit(state);
    }
}

impl<M: Model> ModelCollection<M> for SimpleModelCollection<M> {
    fn collection_id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> CollectionState<M> {
        self.state.read().clone()
    }

    fn state_changed(&self) -> &Signal<CollectionState<M>> {
        &self.state_changed
    }
}

static_assertions::assert_impl_all!(SimpleModelCollection<crate::collection::StaticModel<String>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{ModelCollectionExt, StaticModel};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type M = StaticModel<u32>;

    #[test]
    fn test_events_map_to_states() {
        let collection = SimpleModelCollection::<M>::new("simple");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        collection.observe(move |state| s.lock().push(format!("{state:?}")));

        collection.on_next(CollectionEvent::Loading(None));
        collection.on_next(CollectionEvent::Loaded(vec![vec![StaticModel::new("a", 1)]]));
        collection.on_next(CollectionEvent::Error(CollectionError::msg("offline")));

        assert_eq!(
            *seen.lock(),
            vec![
                "Loading(None)",
                "Loaded([1 sections, 1 models])",
                "Error(offline)"
            ]
        );
        assert!(collection.state().is_error());
    }

    #[test]
    fn test_state_readable_inside_notification() {
        let collection = Arc::new(SimpleModelCollection::<M>::new("simple"));
        let observed = Arc::new(Mutex::new(0));
        let (c, o) = (Arc::downgrade(&collection), observed.clone());
        collection.observe(move |_| {
            if let Some(c) = c.upgrade() {
                *o.lock() = c.state().model_count();
            }
        });

        collection.on_next(CollectionEvent::Loaded(vec![vec![
            StaticModel::new("a", 1),
            StaticModel::new("b", 2),
        ]]));
        assert_eq!(*observed.lock(), 2);
    }

    #[test]
    fn test_unobserve() {
        let collection = SimpleModelCollection::<M>::new("simple");
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let id = collection.observe(move |_| *c.lock() += 1);

        collection.on_next(CollectionEvent::Loading(None));
        assert!(collection.unobserve(id));
        collection.on_next(CollectionEvent::Loading(None));
        assert_eq!(*count.lock(), 1);
    }
}
