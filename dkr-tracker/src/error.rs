//! Error types for the dkr-tracker crate.

use crate::resource::Resource;

/// Errors produced by the tracker client.
///
/// Nothing raised inside the polling loop is returned to the caller. Loop
/// failures are logged and recorded as the loop's
/// [`StopReason`](crate::StopReason).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The tracker needs a tokio runtime to drive its loop
    #[error("No tokio runtime available to run the polling loop")]
    NoRuntime,

    /// The request never produced a response (refused, reset, timed out)
    #[error("Network error for {url}: {message}")]
    Network {
        /// The requested URL
        url: String,
        /// Transport error description
        message: String,
    },

    /// A resource endpoint answered with a non-success status
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// A resource body could not be decoded as JSON
    #[error("Failed to decode {resource} payload: {message}")]
    Decode {
        /// The resource whose body was malformed
        resource: Resource,
        /// Decoder error description
        message: String,
    },
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
