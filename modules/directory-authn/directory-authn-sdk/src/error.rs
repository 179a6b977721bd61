//! Error types for the directory authenticator.

use std::fmt;

use thiserror::Error;

/// Message shown to the credential submitter for every denial.
pub const GENERIC_DENIAL_MESSAGE: &str = "authentication failed";

/// Message shown when the directory could not be reached.
pub const RETRY_LOGIN_MESSAGE: &str = "Please log-out and log-back in to proceed.";

/// Why a login was denied.
///
/// Operator-facing only: the reason is logged, never echoed to the
/// credential submitter (see [`DirectoryAuthnError::user_message`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Username does not match the configured allow-list pattern.
    InvalidUsername,
    /// Password is empty or whitespace only.
    BlankPassword,
    /// The bind DN lookup found no usable name for the login.
    UnresolvableUsername,
    /// No bind template produced a successful bind.
    InvalidCredentials,
    /// The user search returned no entry.
    UserNotFound,
    /// The user search returned more than one entry.
    UserAmbiguous { count: usize },
    /// No group carries the user's primary group id.
    PrimaryGroupNotFound { gid: String },
    /// More than one group carries the user's primary group id.
    PrimaryGroupAmbiguous { gid: String, count: usize },
    /// A directory entry lacks an attribute the authenticator relies on.
    MissingAttribute { dn: String, attribute: String },
    /// A numeric attribute holds something that is not a number.
    MalformedAttribute {
        dn: String,
        attribute: String,
        value: String,
    },
    /// The user is not a member of any allowed group.
    NotAuthorized,
}

impl DenyReason {
    /// Stable reason code used in logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUsername => "invalid_username",
            Self::BlankPassword => "blank_password",
            Self::UnresolvableUsername => "unresolvable_username",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserNotFound => "not_found",
            Self::UserAmbiguous { .. } => "ambiguous",
            Self::PrimaryGroupNotFound { .. } => "primary_group_not_found",
            Self::PrimaryGroupAmbiguous { .. } => "primary_group_ambiguous",
            Self::MissingAttribute { .. } => "missing_attribute",
            Self::MalformedAttribute { .. } => "malformed_attribute",
            Self::NotAuthorized => "not_authorized",
        }
    }

    /// Taxonomy bucket this reason belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUsername | Self::BlankPassword => ErrorKind::InvalidInput,
            Self::UnresolvableUsername | Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::UserNotFound
            | Self::PrimaryGroupNotFound { .. }
            | Self::MissingAttribute { .. }
            | Self::MalformedAttribute { .. } => ErrorKind::NotFound,
            Self::UserAmbiguous { .. } | Self::PrimaryGroupAmbiguous { .. } => {
                ErrorKind::Ambiguous
            }
            Self::NotAuthorized => ErrorKind::NotAuthorized,
        }
    }

    /// Whether the reason points at inconsistent directory data rather
    /// than at the caller.
    #[must_use]
    pub fn is_data_integrity(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Ambiguous)
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserAmbiguous { count } => write!(f, "ambiguous ({count} user entries)"),
            Self::PrimaryGroupNotFound { gid } => write!(f, "primary_group_not_found (gid {gid})"),
            Self::PrimaryGroupAmbiguous { gid, count } => {
                write!(f, "primary_group_ambiguous (gid {gid}, {count} entries)")
            }
            Self::MissingAttribute { dn, attribute } => {
                write!(f, "missing_attribute ({attribute} on {dn})")
            }
            Self::MalformedAttribute {
                dn,
                attribute,
                value,
            } => write!(f, "malformed_attribute ({attribute}='{value}' on {dn})"),
            other => f.write_str(other.code()),
        }
    }
}

/// Error taxonomy shared by every failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DirectoryUnavailable,
    InvalidCredentials,
    NotFound,
    Ambiguous,
    NotAuthorized,
    Cancelled,
    Internal,
}

/// Errors that can occur when using the directory authenticator API.
#[derive(Debug, Clone, Error)]
pub enum DirectoryAuthnError {
    /// The login was denied.
    #[error("denied: {0}")]
    Denied(DenyReason),

    /// The directory could not be reached within the retry budget.
    #[error("directory unavailable after {attempts} attempt(s): {reason}")]
    DirectoryUnavailable { attempts: u32, reason: String },

    /// The enclosing request was cancelled before authentication finished.
    #[error("authentication cancelled")]
    Cancelled,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DirectoryAuthnError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Denied(reason) => reason.kind(),
            Self::DirectoryUnavailable { .. } => ErrorKind::DirectoryUnavailable,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The deny reason, if this is a denial.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Denied(reason) => Some(reason),
            _ => None,
        }
    }

    /// Text safe to show to the credential submitter.
    ///
    /// Denials collapse to one generic message so callers cannot probe
    /// which directory condition failed. An unreachable directory is the
    /// only distinct outcome, because the user should retry rather than
    /// doubt their password.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable { .. } => RETRY_LOGIN_MESSAGE,
            _ => GENERIC_DENIAL_MESSAGE,
        }
    }
}

impl From<DenyReason> for DirectoryAuthnError {
    fn from(reason: DenyReason) -> Self {
        Self::Denied(reason)
    }
}
