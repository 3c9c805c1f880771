//! Prelude module for Trellis.
//!
//! ```ignore
//! use trellis::prelude::*;
//! ```

// ============================================================================
// Signals and Scheduling
// ============================================================================

pub use crate::{Coalesce, ConnectionId, Debounce, SerialQueue, Signal, Throttle};

// ============================================================================
// Collections
// ============================================================================

pub use crate::collection::{
    CollectionError, CollectionEvent, CollectionState, DiffEngine, EditScript, Model,
    ModelCollection, ModelCollectionExt, ModelPath, SimpleModelCollection,
};

// ============================================================================
// Trees
// ============================================================================

pub use crate::tree::{IndexPath, NestedModelCollection, NestedTreeController, TreeEvent, TreePath};
