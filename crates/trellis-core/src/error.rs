//! Error types for Trellis core systems.

/// A specialized Result type for Trellis core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the scheduling layer.
///
/// Misuse that indicates a programming error (touching a collection from a
/// second execution context, reading a stale tree path) panics instead; these
/// variants cover conditions a caller can reasonably observe at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The queue has been shut down and no longer accepts work.
    #[error("serial queue '{name}' has been shut down")]
    QueueShutDown {
        /// Name of the queue that rejected the task.
        name: String,
    },

    /// The operating system refused to start a queue thread.
    #[error("failed to spawn thread for queue '{name}': {message}")]
    Spawn {
        /// Name of the queue being started.
        name: String,
        /// The underlying I/O error, rendered.
        message: String,
    },
}

impl Error {
    /// Create a shut-down error for the named queue.
    pub fn queue_shut_down(name: impl Into<String>) -> Self {
        Self::QueueShutDown { name: name.into() }
    }

    /// Create a spawn error from the I/O error returned by the thread builder.
    pub fn spawn(name: impl Into<String>, err: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::queue_shut_down("ui");
        assert_eq!(err.to_string(), "serial queue 'ui' has been shut down");

        let err = Error::spawn("io", std::io::Error::other("no threads"));
        assert_eq!(
            err.to_string(),
            "failed to spawn thread for queue 'io': no threads"
        );
    }
}
