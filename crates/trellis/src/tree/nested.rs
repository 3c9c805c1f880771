//! Hierarchical collections.

use std::sync::Arc;

use trellis_core::Signal;

use crate::collection::{CollectionState, Model, ModelCollection};

/// A collection whose models may have child collections of their own.
pub trait NestedModelCollection<M: Model>: ModelCollection<M> {
    /// Whether `model` can have children. Must be cheap; it is asked for
    /// every visible row.
    fn can_expand(&self, model: &M) -> bool;

    /// The child collection of `model`, or `None` if it has none.
    ///
    /// Only called for models where [`can_expand`](Self::can_expand) is true.
    /// The result is cached by the tree controller until the model's id leaves
    /// this collection.
    fn child_collection(&self, model: &M) -> Option<Arc<dyn NestedModelCollection<M>>>;
}

type ExpandFn<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;
type ChildFn<M> = Box<dyn Fn(&M) -> Option<Arc<dyn NestedModelCollection<M>>> + Send + Sync>;

/// Turns any flat [`ModelCollection`] into a [`NestedModelCollection`] using
/// closures for expandability and child lookup.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis::collection::{StaticModel, StaticModelCollection};
/// use trellis::tree::{ExpandableCollection, NestedModelCollection};
///
/// type Folder = StaticModel<bool>;
///
/// let leaves = Arc::new(StaticModelCollection::from_models("leaves", vec![Folder::new("file", false)]));
/// let root = ExpandableCollection::new(
///     Arc::new(StaticModelCollection::from_models("root", vec![Folder::new("dir", true)])),
///     |m: &Folder| *m.payload(),
///     move |_| Some(Arc::new(ExpandableCollection::leaf(leaves.clone())) as Arc<dyn NestedModelCollection<Folder>>),
/// );
/// assert!(root.can_expand(&Folder::new("dir", true)));
/// ```
pub struct ExpandableCollection<M: Model> {
    source: Arc<dyn ModelCollection<M>>,
    can_expand: ExpandFn<M>,
    child: ChildFn<M>,
}

impl<M: Model> ExpandableCollection<M> {
    /// Wrap `source`, expanding models for which `can_expand` holds.
    pub fn new<E, C>(source: Arc<dyn ModelCollection<M>>, can_expand: E, child: C) -> Self
    where
        E: Fn(&M) -> bool + Send + Sync + 'static,
        C: Fn(&M) -> Option<Arc<dyn NestedModelCollection<M>>> + Send + Sync + 'static,
    {
        Self {
            source,
            can_expand: Box::new(can_expand),
            child: Box::new(child),
        }
    }

    /// Wrap `source` as a collection whose models never expand.
    pub fn leaf(source: Arc<dyn ModelCollection<M>>) -> Self {
        Self::new(source, |_| false, |_| None)
    }
}

impl<M: Model> ModelCollection<M> for ExpandableCollection<M> {
    fn collection_id(&self) -> &str {
        self.source.collection_id()
    }

    fn state(&self) -> CollectionState<M> {
        self.source.state()
    }

    fn state_changed(&self) -> &Signal<CollectionState<M>> {
        self.source.state_changed()
    }
}

impl<M: Model> NestedModelCollection<M> for ExpandableCollection<M> {
    fn can_expand(&self, model: &M) -> bool {
        (self.can_expand)(model)
    }

    fn child_collection(&self, model: &M) -> Option<Arc<dyn NestedModelCollection<M>>> {
        (self.child)(model)
    }
}
