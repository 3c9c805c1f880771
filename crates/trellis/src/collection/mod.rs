//! Sectioned model collections and the diff engine.
//!
//! This module provides the data side of Trellis: identity-keyed models,
//! collections that publish their lifecycle state, and the engine that turns
//! consecutive snapshots into edit scripts.
//!
//! # Core Types
//!
//! - [`Model`]: Identity and version contract for collection items
//! - [`CollectionState`]: `NotLoaded` / `Loading` / `Loaded` / `Error`
//! - [`ModelCollection`]: The observable collection trait
//! - [`EditScript`]: Ordered section and item edits between two snapshots
//! - [`DiffEngine`]: Remembers the previous snapshot and diffs the next one
//!
//! # Collection Implementations
//!
//! - [`SimpleModelCollection`]: Driven by explicit events
//! - [`StaticModelCollection`]: Fixed contents
//! - [`MultiplexModelCollection`]: Several collections as consecutive sections
//! - [`SwitchableModelCollection`]: Forwards a replaceable source
//!
//! # Data Flow
//!
//! ```text
//! ┌────────────┐ state  ┌────────────┐ snapshot ┌────────────┐ script ┌──────────┐
//! │ Collection │───────>│   Signal   │─────────>│ DiffEngine │───────>│ Consumer │
//! └────────────┘        └────────────┘          └────────────┘        └──────────┘
//! ```
//!
//! Consumers apply an [`EditScript`] in field order (section removals,
//! section additions, item removals, item additions, moves, updates) and
//! reload instead when [`EditScript::requires_reload`] is set.

mod diff;
mod model;
mod multiplex;
mod path;
mod simple;
mod state;
mod static_collection;
mod switchable;
mod traits;

pub use diff::{DiffEngine, EditScript, diff};
pub use model::{Model, StaticModel};
pub use multiplex::MultiplexModelCollection;
pub use path::{ModelMove, ModelPath};
pub use simple::{CollectionEvent, SimpleModelCollection};
pub use state::{CollectionError, CollectionState, Sections, sectioned_states};
pub use static_collection::StaticModelCollection;
pub use switchable::SwitchableModelCollection;
pub use traits::{ModelCollection, ModelCollectionExt};
