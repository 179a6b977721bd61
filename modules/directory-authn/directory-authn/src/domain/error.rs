//! Domain errors for the directory authenticator.

use directory_authn_sdk::{DenyReason, DirectoryAuthnError};

use super::directory::DirectoryError;
use super::query::TemplateError;

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("denied: {0}")]
    Denied(DenyReason),

    #[error("directory unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("directory error: {0}")]
    Directory(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("authentication cancelled")]
    Cancelled,
}

impl From<DenyReason> for DomainError {
    fn from(reason: DenyReason) -> Self {
        Self::Denied(reason)
    }
}

impl From<DirectoryError> for DomainError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Unavailable(reason) => Self::Unavailable {
                attempts: 1,
                reason,
            },
            DirectoryError::BindRejected(_) => Self::Denied(DenyReason::InvalidCredentials),
            DirectoryError::Search(reason) => Self::Directory(reason),
        }
    }
}

impl From<TemplateError> for DomainError {
    fn from(e: TemplateError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<regex::Error> for DomainError {
    fn from(e: regex::Error) -> Self {
        Self::Config(format!("valid_username_regex: {e}"))
    }
}

impl From<DomainError> for DirectoryAuthnError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Denied(reason) => Self::Denied(reason),
            DomainError::Unavailable { attempts, reason } => {
                Self::DirectoryUnavailable { attempts, reason }
            }
            DomainError::Cancelled => Self::Cancelled,
            DomainError::Directory(reason) | DomainError::Config(reason) => Self::Internal(reason),
        }
    }
}
