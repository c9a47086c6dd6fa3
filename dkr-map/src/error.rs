//! Error types for dkr-map

/// Errors that can occur while updating the map
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The map payload was not an object of area code to area code list
    #[error("Invalid map payload: {0}")]
    InvalidPayload(String),
}

/// Result type for dkr-map operations
pub type Result<T> = std::result::Result<T, MapError>;
