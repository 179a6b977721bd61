//! Error types for the workload placement module.

use thiserror::Error;

/// Errors that can occur when using the workload placement API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The placement document, image catalog or launch environment is invalid.
    #[error("invalid placement configuration: {0}")]
    Config(String),

    /// No image was requested and no default image is configured.
    #[error("no image requested and no default image configured")]
    NoImage,

    /// The image reference cannot be used.
    #[error("invalid image reference '{image}': {reason}")]
    InvalidImage { image: String, reason: String },

    /// The primary group id cannot be used as a filesystem group.
    #[error("primary group id '{gid}' is not numeric")]
    NonNumericGroupId { gid: String },
}
