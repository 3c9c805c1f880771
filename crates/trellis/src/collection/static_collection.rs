//! A collection with fixed contents.

use trellis_core::Signal;

use super::model::Model;
use super::state::{CollectionState, Sections};
use super::traits::ModelCollection;

/// A collection that is permanently `Loaded` and never notifies.
pub struct StaticModelCollection<M: Model> {
    id: String,
    sections: Sections<M>,
    state_changed: Signal<CollectionState<M>>,
}

impl<M: Model> StaticModelCollection<M> {
    /// Create a collection holding `sections`.
    pub fn new(id: impl Into<String>, sections: Sections<M>) -> Self {
        Self {
            id: id.into(),
            sections,
            state_changed: Signal::new(),
        }
    }

    /// A single-section collection.
    pub fn from_models(id: impl Into<String>, models: Vec<M>) -> Self {
        Self::new(id, vec![models])
    }

    /// A collection with one empty section.
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, vec![Vec::new()])
    }
}

impl<M: Model> ModelCollection<M> for StaticModelCollection<M> {
    fn collection_id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> CollectionState<M> {
        CollectionState::Loaded(self.sections.clone())
    }

    fn state_changed(&self) -> &Signal<CollectionState<M>> {
        &self.state_changed
    }
}
