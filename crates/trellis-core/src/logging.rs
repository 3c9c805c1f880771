//! Logging facilities for Trellis.
//!
//! Trellis uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("trellis=debug,trellis_core=trace")
//!         .init();
//! }
//! ```
//!
//! Every subsystem logs under one of the [`targets`] so output can be
//! filtered per component.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "trellis_core";
    /// Signal/observer registry target.
    pub const SIGNAL: &str = "trellis_core::signal";
    /// Serial task queue target.
    pub const QUEUE: &str = "trellis_core::queue";
    /// Debounce, throttle and coalesce target.
    pub const PACING: &str = "trellis_core::pacing";
    /// Diff engine target.
    pub const DIFF: &str = "trellis::diff";
    /// Model collection target.
    pub const COLLECTION: &str = "trellis::collection";
    /// Nested tree controller target.
    pub const TREE: &str = "trellis::tree";
    /// Performance span target.
    pub const PERF: &str = "trellis::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "trellis::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
        tracing::trace!(target: targets::PERF, "inside span");
    }

    #[test]
    fn test_targets_are_namespaced() {
        assert!(targets::SIGNAL.starts_with(targets::CORE));
        assert!(targets::QUEUE.starts_with(targets::CORE));
        assert!(targets::TREE.starts_with("trellis::"));
    }
}
