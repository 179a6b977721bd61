//! Domain errors for workload placement.

use thiserror::Error;
use workload_placement_sdk::PlacementError;

/// Domain-level errors for placement and workload building.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid placement document: {message}")]
    InvalidDocument { message: String },

    #[error("Invalid launch environment: {variable}='{value}': {reason}")]
    InvalidEnvironment {
        variable: String,
        value: String,
        reason: String,
    },

    #[error("IO error reading {path}: {message}")]
    IoError { path: String, message: String },

    #[error("Parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("No image requested and no default image configured")]
    NoImage,

    #[error("Invalid image reference '{image}': {reason}")]
    InvalidImage { image: String, reason: String },

    #[error("Primary group id '{gid}' is not numeric")]
    NonNumericGroupId { gid: String },
}

impl DomainError {
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    pub fn invalid_image(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            image: image.into(),
            reason: reason.into(),
        }
    }

    pub fn io_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<DomainError> for PlacementError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NoImage => Self::NoImage,
            DomainError::InvalidImage { image, reason } => Self::InvalidImage { image, reason },
            DomainError::NonNumericGroupId { gid } => Self::NonNumericGroupId { gid },
            other @ (DomainError::InvalidDocument { .. }
            | DomainError::InvalidEnvironment { .. }
            | DomainError::IoError { .. }
            | DomainError::ParseError { .. }) => Self::Config(other.to_string()),
        }
    }
}

impl From<PlacementError> for DomainError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::NoImage => Self::NoImage,
            PlacementError::InvalidImage { image, reason } => Self::InvalidImage { image, reason },
            PlacementError::NonNumericGroupId { gid } => Self::NonNumericGroupId { gid },
            PlacementError::Config(message) => Self::InvalidDocument { message },
        }
    }
}
