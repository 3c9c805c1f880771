//! Lazily materialized trees over nested collections.
//!
//! [`NestedTreeController`] wraps a root [`NestedModelCollection`] and
//! materializes child collections only when a path below them is first
//! accessed. Each materialized collection becomes a cached node that the
//! controller subscribes to; when it notifies, the controller diffs it against
//! its last snapshot, evicts cached children whose model disappeared, and emits
//! one [`TreeEvent`] with tree-global index paths.
//!
//! # Node Snapshots
//!
//! A node views its collection as one flat list: the models of all sections
//! concatenated. Child `i` of a node is model `i` of that list, so a tree
//! position is an [`IndexPath`] and a tree identity is a [`TreePath`].
//!
//! # Failure
//!
//! Reading through a path whose ids are no longer present is a fatal error:
//! the caller holds a stale handle and carrying on would hide a reconciliation
//! bug. Such reads log at `error` and panic.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::collection::{StaticModel, StaticModelCollection};
//! use trellis::tree::{ExpandableCollection, NestedModelCollection, NestedTreeController, TreePath};
//!
//! type Node = StaticModel<()>;
//!
//! let children = Arc::new(StaticModelCollection::from_models(
//!     "children",
//!     vec![Node::new("leaf", ())],
//! ));
//! let root = Arc::new(ExpandableCollection::new(
//!     Arc::new(StaticModelCollection::from_models("root", vec![Node::new("dir", ())])),
//!     |_| true,
//!     move |_| {
//!         Some(Arc::new(ExpandableCollection::leaf(children.clone())) as Arc<dyn NestedModelCollection<Node>>)
//!     },
//! ));
//!
//! let tree = NestedTreeController::new(root);
//! let dir = TreePath::new(vec!["dir".to_string()]);
//! assert_eq!(tree.child_count(&TreePath::root()), 1);
//! assert_eq!(tree.child_count(&dir), 1);
//! assert_eq!(tree.model_id(&dir, 0), "leaf");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};
use trellis_core::logging::targets;
use trellis_core::{ConnectionId, PerfSpan, SerialAffinity, Signal};

use super::nested::NestedModelCollection;
use super::path::{IndexPath, TreePath};
use crate::collection::{CollectionState, DiffEngine, EditScript, Model, ModelPath};

new_key_type! {
    /// Arena key of a cached tree node.
    struct NodeKey;
}

/// A child that moved within its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeMove {
    /// Position before the change.
    pub from: IndexPath,
    /// Position after the change.
    pub to: IndexPath,
}

/// The changes to one node's children, in tree-global index paths.
///
/// Categories follow the same index semantics and application order as
/// [`EditScript`]: removals address the previous children, additions the new
/// ones, moves go from old to new, updates address unchanged positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeEvent {
    /// The node whose children changed. The root is the empty path.
    pub parent: IndexPath,
    pub removed: Vec<IndexPath>,
    pub added: Vec<IndexPath>,
    pub moved: Vec<TreeMove>,
    pub updated: Vec<IndexPath>,
    /// The node had no children and now has some.
    pub first_add_in_section: bool,
    /// The node had children and now has none.
    pub last_remove_in_section: bool,
}

impl TreeEvent {
    fn from_script(parent: IndexPath, script: &EditScript) -> Self {
        // Node snapshots have exactly one section.
        let at = |path: &ModelPath| parent.child(path.item);
        Self {
            removed: script.removed.iter().map(at).collect(),
            added: script.added.iter().map(at).collect(),
            moved: script
                .moved
                .iter()
                .map(|m| TreeMove {
                    from: at(&m.from),
                    to: at(&m.to),
                })
                .collect(),
            updated: script.updated.iter().map(at).collect(),
            first_add_in_section: script.first_add_in_section,
            last_remove_in_section: script.last_remove_in_section,
            parent,
        }
    }

    /// Whether any child changed.
    pub fn has_changes(&self) -> bool {
        !(self.removed.is_empty()
            && self.added.is_empty()
            && self.moved.is_empty()
            && self.updated.is_empty())
    }

    /// Whether consumers should reload the parent's children instead of
    /// applying the event incrementally.
    pub fn requires_reload(&self) -> bool {
        self.first_add_in_section || self.last_remove_in_section
    }
}

/// Presents a root [`NestedModelCollection`] as an addressable tree.
///
/// Single-writer: call it, and let its collections notify, from one serial
/// context. Collections must not notify from inside `state`, `can_expand` or
/// `child_collection`.
pub struct NestedTreeController<M: Model> {
    inner: Arc<TreeInner<M>>,
}

struct TreeInner<M: Model> {
    tree: Mutex<TreeState<M>>,
    events: Signal<TreeEvent>,
    affinity: SerialAffinity,
}

struct TreeState<M: Model> {
    nodes: SlotMap<NodeKey, TreeNode<M>>,
    root: NodeKey,
}

struct TreeNode<M: Model> {
    collection: Arc<dyn NestedModelCollection<M>>,
    /// Parent node and the id of the model this node expands. `None` for the root.
    parent: Option<(NodeKey, M::Id)>,
    children: HashMap<M::Id, NodeKey>,
    engine: DiffEngine<M>,
    connection: ConnectionId,
}

impl<M: Model> TreeNode<M> {
    fn models(&self) -> &[M] {
        self.engine.previous().first().map_or(&[], Vec::as_slice)
    }

    fn position(&self, id: &M::Id) -> Option<usize> {
        self.models().iter().position(|m| m.model_id() == id)
    }
}

impl<M: Model> NestedTreeController<M> {
    /// Create a controller over `root`. Only the root is materialized.
    pub fn new(root: Arc<dyn NestedModelCollection<M>>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<TreeInner<M>>| {
            let mut nodes = SlotMap::with_key();
            let root = attach_node(&mut nodes, weak, None, root);
            TreeInner {
                tree: Mutex::new(TreeState { nodes, root }),
                events: Signal::new(),
                affinity: SerialAffinity::new(),
            }
        });
        Self { inner }
    }

    /// Signal emitted with one [`TreeEvent`] per node notification.
    pub fn events(&self) -> &Signal<TreeEvent> {
        &self.inner.events
    }

    /// Subscribe to tree events. Keep the returned id to unsubscribe.
    pub fn observe<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&TreeEvent) + Send + Sync + 'static,
    {
        self.inner.events.connect(f)
    }

    /// Remove a subscription made with [`observe`](Self::observe).
    pub fn unobserve(&self, id: ConnectionId) -> bool {
        self.inner.events.disconnect(id)
    }

    /// The state of the root collection.
    pub fn current_state(&self) -> CollectionState<M> {
        self.inner.affinity.check("NestedTreeController::current_state");
        let root = {
            let tree = self.inner.tree.lock();
            tree.nodes[tree.root].collection.clone()
        };
        root.state()
    }

    /// Whether the node at `path` can have children. The root always can.
    ///
    /// # Panics
    ///
    /// Panics if an id along `path` is no longer present.
    pub fn is_expandable(&self, path: &TreePath<M::Id>) -> bool {
        self.inner.affinity.check("NestedTreeController::is_expandable");
        let Some((id, parent_ids)) = path.ids().split_last() else {
            return true;
        };
        let mut tree = self.inner.tree.lock();
        let parent = tree.resolve_parent(&self.weak(), path.ids(), parent_ids);
        let node = &tree.nodes[parent];
        let model = node.models().iter().find(|m| m.model_id() == id);
        match model {
            Some(model) => node.collection.can_expand(model),
            None => panic_stale_path(path.ids(), path.len() - 1),
        }
    }

    /// Number of children of the node at `path`, materializing it if needed.
    ///
    /// Nodes that cannot expand have no children.
    ///
    /// # Panics
    ///
    /// Panics if an id along `path` is no longer present, or if `path`
    /// continues below a model that cannot expand.
    pub fn child_count(&self, path: &TreePath<M::Id>) -> usize {
        self.inner.affinity.check("NestedTreeController::child_count");
        let mut tree = self.inner.tree.lock();
        tree.resolve(&self.weak(), path.ids())
            .map_or(0, |key| tree.nodes[key].models().len())
    }

    /// The model at `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is the root or an id along it is no longer present.
    pub fn model_at(&self, path: &TreePath<M::Id>) -> M {
        self.inner.affinity.check("NestedTreeController::model_at");
        let Some((id, parent_ids)) = path.ids().split_last() else {
            panic_root_has_no_model("model_at");
        };
        let mut tree = self.inner.tree.lock();
        let parent = tree.resolve_parent(&self.weak(), path.ids(), parent_ids);
        match tree.nodes[parent].models().iter().find(|m| m.model_id() == id) {
            Some(model) => model.clone(),
            None => panic_stale_path(path.ids(), path.len() - 1),
        }
    }

    /// The id of child `index` of the node at `path`.
    ///
    /// # Panics
    ///
    /// Panics if an id along `path` is no longer present or `index` is out of
    /// range.
    pub fn model_id(&self, path: &TreePath<M::Id>, index: usize) -> M::Id {
        self.inner.affinity.check("NestedTreeController::model_id");
        let mut tree = self.inner.tree.lock();
        let models: &[M] = match tree.resolve(&self.weak(), path.ids()) {
            Some(key) => tree.nodes[key].models(),
            None => &[],
        };
        match models.get(index) {
            Some(model) => model.model_id().clone(),
            None => panic_child_index(path.ids(), index, models.len()),
        }
    }

    /// The current position of the node named by `path`.
    ///
    /// # Panics
    ///
    /// Panics if an id along `path` is no longer present.
    pub fn index_path(&self, path: &TreePath<M::Id>) -> IndexPath {
        self.inner.affinity.check("NestedTreeController::index_path");
        let weak = self.weak();
        let mut tree = self.inner.tree.lock();
        let mut key = tree.root;
        let mut indices = Vec::with_capacity(path.len());
        for (depth, id) in path.ids().iter().enumerate() {
            let Some(index) = tree.nodes[key].position(id) else {
                panic_stale_path(path.ids(), depth);
            };
            indices.push(index);
            if depth + 1 < path.len() {
                key = tree.step(&weak, key, path.ids(), depth);
            }
        }
        IndexPath::from(indices)
    }

    /// The identity path of the node currently at `index_path`.
    ///
    /// # Panics
    ///
    /// Panics if any index along `index_path` is out of range.
    pub fn path_for(&self, index_path: &IndexPath) -> TreePath<M::Id> {
        self.inner.affinity.check("NestedTreeController::path_for");
        let weak = self.weak();
        let mut tree = self.inner.tree.lock();
        let mut key = tree.root;
        let mut ids: Vec<M::Id> = Vec::with_capacity(index_path.len());
        for (depth, &index) in index_path.indices().iter().enumerate() {
            let models = tree.nodes[key].models();
            let Some(model) = models.get(index) else {
                panic_child_index(&ids, index, models.len());
            };
            ids.push(model.model_id().clone());
            if depth + 1 < index_path.len() {
                key = tree.step(&weak, key, &ids, depth);
            }
        }
        TreePath::new(ids)
    }

    /// Number of materialized nodes below the root.
    pub fn cached_node_count(&self) -> usize {
        self.inner.tree.lock().nodes.len() - 1
    }

    fn weak(&self) -> Weak<TreeInner<M>> {
        Arc::downgrade(&self.inner)
    }
}

impl<M: Model> TreeInner<M> {
    fn node_changed(&self, key: NodeKey, state: &CollectionState<M>) {
        self.affinity.check("NestedTreeController::node_changed");
        let event = {
            let _span = PerfSpan::new("tree_node_changed");
            self.tree.lock().apply(key, state)
        };
        if let Some(event) = event {
            tracing::trace!(
                target: targets::TREE,
                parent = %event.parent,
                removed = event.removed.len(),
                added = event.added.len(),
                moved = event.moved.len(),
                updated = event.updated.len(),
                "emitting tree event"
            );
            self.events.emit(event);
        }
    }
}

fn attach_node<M: Model>(
    nodes: &mut SlotMap<NodeKey, TreeNode<M>>,
    weak: &Weak<TreeInner<M>>,
    parent: Option<(NodeKey, M::Id)>,
    collection: Arc<dyn NestedModelCollection<M>>,
) -> NodeKey {
    let models = collection.state().flat_models();
    nodes.insert_with_key(|key| {
        let weak = weak.clone();
        let connection = collection.state_changed().connect(move |state| {
            if let Some(inner) = weak.upgrade() {
                inner.node_changed(key, state);
            }
        });
        TreeNode {
            collection,
            parent,
            children: HashMap::new(),
            engine: DiffEngine::with_initial(vec![models]),
            connection,
        }
    })
}

impl<M: Model> TreeState<M> {
    /// Diff a node's new state, evict vanished children, and build the event.
    fn apply(&mut self, key: NodeKey, state: &CollectionState<M>) -> Option<TreeEvent> {
        let Some(node) = self.nodes.get_mut(key) else {
            tracing::trace!(target: targets::TREE, "ignoring notification from evicted node");
            return None;
        };

        let script = node.engine.update(vec![state.flat_models()]);

        let live: HashSet<&M::Id> = node.models().iter().map(Model::model_id).collect();
        let vanished: Vec<M::Id> = node
            .children
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        let evicted: Vec<NodeKey> = vanished
            .iter()
            .filter_map(|id| node.children.remove(id))
            .collect();
        for child in evicted {
            self.evict(child);
        }

        Some(TreeEvent::from_script(self.index_path_of(key), &script))
    }

    /// Remove a node and all its descendants, unsubscribing each.
    fn evict(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.remove(key) else {
            return;
        };
        node.collection.state_changed().disconnect(node.connection);
        tracing::debug!(
            target: targets::TREE,
            collection = node.collection.collection_id(),
            model_id = ?node.parent.as_ref().map(|(_, id)| id),
            "evicted tree node"
        );
        for child in node.children.into_values() {
            self.evict(child);
        }
    }

    /// Current index path of a cached node.
    fn index_path_of(&self, key: NodeKey) -> IndexPath {
        let mut indices = Vec::new();
        let mut current = key;
        while let Some((parent, id)) = &self.nodes[current].parent {
            match self.nodes[*parent].position(id) {
                Some(index) => indices.push(index),
                None => panic_vanished_model(id),
            }
            current = *parent;
        }
        indices.reverse();
        IndexPath::from(indices)
    }

    /// Resolve `ids` to a node, materializing along the way.
    ///
    /// Returns `None` if the last model cannot expand. A model that cannot
    /// expand anywhere else means the ids after it are stale.
    fn resolve(&mut self, weak: &Weak<TreeInner<M>>, ids: &[M::Id]) -> Option<NodeKey> {
        let mut key = self.root;
        for depth in 0..ids.len() {
            match self.try_step(weak, key, ids, depth) {
                Some(child) => key = child,
                None if depth + 1 == ids.len() => return None,
                None => panic_stale_path(ids, depth + 1),
            }
        }
        Some(key)
    }

    /// Resolve the parent of the node named by `full`, given `parent_ids`.
    fn resolve_parent(
        &mut self,
        weak: &Weak<TreeInner<M>>,
        full: &[M::Id],
        parent_ids: &[M::Id],
    ) -> NodeKey {
        match self.resolve(weak, parent_ids) {
            Some(key) => key,
            None => panic_stale_path(full, parent_ids.len()),
        }
    }

    /// Move from `key` to the child for `ids[depth]`, which must expand.
    fn step(
        &mut self,
        weak: &Weak<TreeInner<M>>,
        key: NodeKey,
        ids: &[M::Id],
        depth: usize,
    ) -> NodeKey {
        match self.try_step(weak, key, ids, depth) {
            Some(child) => child,
            None => panic_stale_path(ids, depth),
        }
    }

    /// Move from `key` to the child for `ids[depth]`, materializing it.
    ///
    /// Returns `None` if that model cannot expand.
    fn try_step(
        &mut self,
        weak: &Weak<TreeInner<M>>,
        key: NodeKey,
        ids: &[M::Id],
        depth: usize,
    ) -> Option<NodeKey> {
        let id = &ids[depth];
        if let Some(&child) = self.nodes[key].children.get(id) {
            return Some(child);
        }

        let node = &self.nodes[key];
        let Some(model) = node.models().iter().find(|m| m.model_id() == id) else {
            panic_stale_path(ids, depth);
        };
        if !node.collection.can_expand(model) {
            return None;
        }
        let collection = node.collection.child_collection(model)?;

        tracing::debug!(
            target: targets::TREE,
            collection = collection.collection_id(),
            depth,
            "materializing tree node"
        );
        let child = attach_node(&mut self.nodes, weak, Some((key, id.clone())), collection);
        self.nodes[key].children.insert(id.clone(), child);
        Some(child)
    }
}

impl<M: Model> Drop for TreeState<M> {
    fn drop(&mut self) {
        for node in self.nodes.values() {
            node.collection.state_changed().disconnect(node.connection);
        }
    }
}

#[cold]
#[inline(never)]
fn panic_stale_path<Id: fmt::Debug>(path: &[Id], depth: usize) -> ! {
    tracing::error!(target: targets::TREE, ?path, depth, "stale tree path");
    panic!(
        "stale tree path {path:?}: the id at depth {depth} is no longer present; \
         tree paths must be refreshed after the tree changes"
    )
}

#[cold]
#[inline(never)]
fn panic_child_index<Id: fmt::Debug>(path: &[Id], index: usize, count: usize) -> ! {
    tracing::error!(target: targets::TREE, ?path, index, count, "child index out of range");
    panic!("child index {index} out of range for tree node {path:?} with {count} children")
}

#[cold]
#[inline(never)]
fn panic_vanished_model<Id: fmt::Debug>(id: &Id) -> ! {
    tracing::error!(target: targets::TREE, ?id, "cached node references a vanished model");
    panic!("cached tree node references model {id:?}, which is no longer in its parent")
}

#[cold]
#[inline(never)]
fn panic_root_has_no_model(operation: &str) -> ! {
    tracing::error!(target: targets::TREE, operation, "root path has no model");
    panic!("{operation} called with the root path, which has no model")
}

static_assertions::assert_impl_all!(
    NestedTreeController<crate::collection::StaticModel<String>>: Send, Sync
);
