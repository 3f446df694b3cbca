//! Error types for the capability boundaries of a partition run

use std::time::Duration;
use thiserror::Error;

/// Errors from building a partition specification.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Drop percent outside the valid range.
    #[error("drop percent must be between 1 and 100, got {0}")]
    DropPercentOutOfRange(u8),

    /// A target service and a target host were both given.
    #[error("target service and target host are mutually exclusive")]
    ConflictingTargets,
}

/// Errors from the target resolver.
///
/// Zero running pods is not an error; it is an empty list and the caller
/// decides whether that is fatal.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The pod listing call itself could not be made.
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
}

/// Errors from executing a command inside a pod.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The exec transport (attach websocket) failed.
    #[error("exec transport failed for pod {pod}: {source}")]
    Transport {
        pod: String,
        #[source]
        source: kube::Error,
    },

    /// The command did not complete within the allotted time.
    #[error("command timed out after {timeout:?} in pod {pod}")]
    Timeout { pod: String, timeout: Duration },

    /// The command ran but reported failure.
    #[error("command failed in pod {pod}: {message}")]
    CommandFailed { pod: String, message: String },
}
