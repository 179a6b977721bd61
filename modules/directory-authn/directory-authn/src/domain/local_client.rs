//! Local (in-process) client for the directory authenticator.

use std::sync::Arc;

use async_trait::async_trait;
use directory_authn_sdk::{
    Authenticated, Credential, DirectoryAuthenticatorClient, DirectoryAuthnError,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct DirectoryAuthnLocalClient {
    svc: Arc<Service>,
}

impl DirectoryAuthnLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> DirectoryAuthnError {
    match &e {
        DomainError::Directory(_) | DomainError::Config(_) => {
            tracing::error!(operation = op, error = ?e, "directory_authn call failed");
        }
        _ => tracing::debug!(operation = op, error = %e, "directory_authn call denied"),
    }
    e.into()
}

#[async_trait]
impl DirectoryAuthenticatorClient for DirectoryAuthnLocalClient {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Authenticated, DirectoryAuthnError> {
        self.svc
            .authenticate(credential)
            .await
            .map_err(|e| log_and_convert("authenticate", e))
    }
}
