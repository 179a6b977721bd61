//! Public API trait for the directory authenticator.

use async_trait::async_trait;

use crate::error::DirectoryAuthnError;
use crate::models::{Authenticated, Credential};

/// Public API trait for the directory authenticator.
///
/// The hosting session layer calls this once per login submission and
/// stores the returned [`Authenticated`] value against the session. The
/// launch layer later reads the stored [`crate::IdentityFacts`] back; the
/// authenticator keeps no state between calls.
#[async_trait]
pub trait DirectoryAuthenticatorClient: Send + Sync {
    /// Verify a credential and resolve the caller's identity facts.
    ///
    /// # Errors
    ///
    /// - `Denied` for malformed input, bad credentials, missing or duplicate
    ///   directory records, or an unauthorized user
    /// - `DirectoryUnavailable` if the directory could not be reached within
    ///   the retry budget
    /// - `Cancelled` if the enclosing request was cancelled
    /// - `Internal` for unexpected errors
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Authenticated, DirectoryAuthnError>;
}
