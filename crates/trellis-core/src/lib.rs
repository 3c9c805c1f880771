//! Core systems for Trellis.
//!
//! This crate provides the execution and notification plumbing that the
//! Trellis collection and tree layers are built on:
//!
//! - **Signals**: Synchronous multicast observer registry with disposal tokens
//! - **Serial Queues**: One-at-a-time task execution with delayed scheduling
//! - **Pacing**: Debounce, throttle and coalesce over a serial queue
//! - **Serial Affinity**: Runtime checks that single-writer objects stay on
//!   one execution context
//!
//! # Signal Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Pacing Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trellis_core::{Debounce, ManualQueue};
//!
//! let queue = Arc::new(ManualQueue::new());
//! let search = Debounce::new(queue.clone(), Duration::from_millis(50), |query: String| {
//!     println!("searching for {query}");
//! });
//!
//! search.trigger("tr".into());
//! search.trigger("trel".into());
//! queue.advance(Duration::from_millis(50)); // searches once, for "trel"
//! ```

mod error;
pub mod logging;
pub mod pacing;
pub mod queue;
pub mod signal;
pub mod thread_check;

pub use error::{Error, Result};
pub use logging::PerfSpan;
pub use pacing::{Coalesce, Debounce, Throttle};
pub use queue::{
    ManualQueue, SerialQueue, Task, TaskHandle, ThreadQueue, ThreadQueueBuilder,
    ThreadQueueConfig,
};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use thread_check::{SerialAffinity, are_thread_checks_enabled, set_thread_checks_enabled};
