//! Lazily materialized trees over nested collections.
//!
//! # Core Types
//!
//! - [`NestedModelCollection`]: A collection whose models can expand into child collections
//! - [`NestedTreeController`]: Caches materialized children and emits tree-global events
//! - [`TreePath`]: Identity path of model ids from the root
//! - [`IndexPath`]: Positional path of child indices from the root
//! - [`TreeEvent`]: Changes to one node's children
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐
//! │ NestedTreeController │── TreeEvent ──> consumer
//! └──────────┬───────────┘
//!            │ node arena (SlotMap), parent links are keys
//!      ┌─────┴─────┐
//!   ┌──┴──┐     ┌──┴──┐
//!   │root │     │ p   │── each node: collection + DiffEngine + subscription
//!   └─────┘     └─────┘
//! ```

mod controller;
mod nested;
mod path;

pub use controller::{NestedTreeController, TreeEvent, TreeMove};
pub use nested::{ExpandableCollection, NestedModelCollection};
pub use path::{IndexPath, PATH_SEPARATOR, PathCodecError, TreePath};
