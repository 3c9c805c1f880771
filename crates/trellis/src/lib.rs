//! Trellis - sectioned model collections, minimal edit scripts, and lazily
//! materialized trees for incremental list and outline rendering.
//!
//! This is the umbrella crate: it re-exports everything from `trellis-core`
//! (signals, serial queues, pacing) and adds the collection and tree layers.
//!
//! # Example
//!
//! ```
//! use trellis::collection::{
//!     CollectionEvent, DiffEngine, ModelCollection, ModelCollectionExt, SimpleModelCollection,
//!     StaticModel,
//! };
//! use std::sync::{Arc, Mutex};
//!
//! let feed = SimpleModelCollection::<StaticModel<&str>>::new("feed");
//! let engine = Arc::new(Mutex::new(DiffEngine::new()));
//!
//! let e = engine.clone();
//! feed.observe(move |state| {
//!     let script = e.lock().unwrap().update_from_state(state);
//!     if script.requires_reload() {
//!         println!("reload everything");
//!     } else {
//!         println!("apply {script}");
//!     }
//! });
//!
//! feed.on_next(CollectionEvent::Loaded(vec![vec![StaticModel::new("post-1", "hello")]]));
//! assert_eq!(feed.state().model_count(), 1);
//! ```

pub use trellis_core::*;

pub mod collection;
pub mod prelude;
pub mod tree;
