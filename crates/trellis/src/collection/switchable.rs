//! A collection whose source can be swapped at runtime.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use trellis_core::logging::targets;
use trellis_core::{ConnectionId, SerialAffinity, Signal};

use super::model::Model;
use super::state::CollectionState;
use super::traits::ModelCollection;

/// Forwards the state of another collection, which can be replaced with
/// [`switch_to`](Self::switch_to).
///
/// Typical use is swapping between a search-results collection and the
/// unfiltered one without re-binding the consumer.
pub struct SwitchableModelCollection<M: Model> {
    inner: Arc<SwitchableInner<M>>,
}

struct SwitchableInner<M: Model> {
    id: String,
    current: Mutex<Source<M>>,
    state_changed: Signal<CollectionState<M>>,
    affinity: SerialAffinity,
}

struct Source<M: Model> {
    collection: Arc<dyn ModelCollection<M>>,
    connection: ConnectionId,
}

impl<M: Model> SwitchableModelCollection<M> {
    /// Create a collection forwarding `initial`.
    pub fn new(id: impl Into<String>, initial: Arc<dyn ModelCollection<M>>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<SwitchableInner<M>>| SwitchableInner {
            id: id.into(),
            current: Mutex::new(Source {
                connection: forward(weak.clone(), &initial),
                collection: initial,
            }),
            state_changed: Signal::new(),
            affinity: SerialAffinity::new(),
        });
        Self { inner }
    }

    /// Forward `collection` from now on and emit its current state.
    ///
    /// The previous source is unsubscribed first, so late notifications from
    /// it are not forwarded.
    pub fn switch_to(&self, collection: Arc<dyn ModelCollection<M>>) {
        self.inner.affinity.check("SwitchableModelCollection::switch_to");

        let state = {
            let mut current = self.inner.current.lock();
            current
                .collection
                .state_changed()
                .disconnect(current.connection);
            tracing::debug!(
                target: targets::COLLECTION,
                collection = %self.inner.id,
                from = current.collection.collection_id(),
                to = collection.collection_id(),
                "switching source collection"
            );

            let connection = forward(Arc::downgrade(&self.inner), &collection);
            let state = collection.state();
            *current = Source {
                collection,
                connection,
            };
            state
        };
        self.inner.state_changed.emit(state);
    }

    /// The collection currently forwarded.
    pub fn current(&self) -> Arc<dyn ModelCollection<M>> {
        self.inner.current.lock().collection.clone()
    }
}

fn forward<M: Model>(
    weak: Weak<SwitchableInner<M>>,
    collection: &Arc<dyn ModelCollection<M>>,
) -> ConnectionId {
    collection.state_changed().connect(move |state| {
        if let Some(inner) = weak.upgrade() {
            inner.state_changed.emit(state.clone());
        }
    })
}

impl<M: Model> ModelCollection<M> for SwitchableModelCollection<M> {
    fn collection_id(&self) -> &str {
        &self.inner.id
    }

    fn state(&self) -> CollectionState<M> {
        let collection = self.current();
        collection.state()
    }

    fn state_changed(&self) -> &Signal<CollectionState<M>> {
        &self.inner.state_changed
    }
}

impl<M: Model> Drop for SwitchableModelCollection<M> {
    fn drop(&mut self) {
        let current = self.inner.current.lock();
        current
            .collection
            .state_changed()
            .disconnect(current.connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{
        CollectionEvent, ModelCollectionExt, SimpleModelCollection, StaticModel,
        StaticModelCollection,
    };

    type M = StaticModel<()>;

    #[test]
    fn test_forwards_state() {
        let stub = Arc::new(SimpleModelCollection::<M>::new("stub"));
        let subject = SwitchableModelCollection::new("switchable", stub.clone());
        assert!(subject.state().is_not_loaded());

        stub.on_next(CollectionEvent::Loading(None));
        assert!(subject.state().is_loading());
    }

    #[test]
    fn test_emits_when_switched() {
        let simple = Arc::new(SimpleModelCollection::<M>::new("simple"));
        simple.on_next(CollectionEvent::Loading(None));
        let subject = SwitchableModelCollection::new("switchable", simple);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        subject.observe(move |state| s.lock().push(state.clone()));

        subject.switch_to(Arc::new(StaticModelCollection::empty("empty")));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_loaded());
        assert_eq!(seen[0].sections().len(), 1);
        assert!(seen[0].is_empty());
        assert_eq!(subject.current().collection_id(), "empty");
    }

    #[test]
    fn test_unsubscribes_when_switched() {
        let old = Arc::new(SimpleModelCollection::<M>::new("old"));
        let subject = SwitchableModelCollection::new("switchable", old.clone());
        let new = Arc::new(SimpleModelCollection::<M>::new("new"));
        new.on_next(CollectionEvent::Loaded(vec![]));
        subject.switch_to(new);

        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        subject.observe(move |_| *c.lock() += 1);

        old.on_next(CollectionEvent::Loading(None));
        assert!(subject.state().is_loaded());
        assert_eq!(*count.lock(), 0);
        assert_eq!(old.state_changed().connection_count(), 0);
    }
}
