//! Directory authenticator service.
//!
//! Drives one login through `Validating`, `Binding`, `ResolvingIdentity`
//! and `ResolvingGroups` on a single directory connection. Every failure
//! ends in `Denied` and no partially resolved identity leaves this module.

use std::sync::Arc;

use directory_authn_sdk::{Authenticated, Credential, GroupId, IdentityFacts};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::directory::{DirectoryConnection, DirectoryConnector, connect_with_retry};
use super::error::DomainError;
use super::resolver::{AllowedGroups, AttributeResolver, GroupResolver};
use super::verifier::CredentialVerifier;
use crate::config::DirectoryAuthnConfig;

/// Connection attempts before the directory is reported unavailable.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Authentication progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Validating,
    Binding,
    ResolvingIdentity,
    ResolvingGroups,
    Authenticated,
    Denied,
}

impl AuthState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Denied)
    }
}

/// State of one in-flight authentication.
struct Attempt<'a> {
    username: &'a str,
    state: AuthState,
}

impl<'a> Attempt<'a> {
    fn new(username: &'a str) -> Self {
        Self {
            username,
            state: AuthState::Idle,
        }
    }

    fn advance(&mut self, next: AuthState) {
        debug!(
            username = %self.username.escape_debug(),
            from = ?self.state,
            to = ?next,
            "Authentication state transition"
        );
        self.state = next;
    }
}

/// Directory authenticator.
///
/// Holds only immutable configuration; concurrent logins each open their
/// own connection.
pub struct Service {
    connector: Arc<dyn DirectoryConnector>,
    verifier: CredentialVerifier,
    users: AttributeResolver,
    groups: GroupResolver,
    allowed: Option<AllowedGroups>,
    uid_attribute: String,
    gid_attribute: String,
}

impl Service {
    /// Build the service, validating every template in `cfg`.
    ///
    /// # Errors
    ///
    /// `Config` if the username pattern or a template is invalid.
    pub fn from_config(
        cfg: &DirectoryAuthnConfig,
        connector: Arc<dyn DirectoryConnector>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            connector,
            verifier: CredentialVerifier::from_config(cfg)?,
            users: AttributeResolver::from_config(cfg)?,
            groups: GroupResolver::from_config(cfg)?,
            allowed: AllowedGroups::from_config(cfg)?,
            uid_attribute: cfg.uid_number_attribute.clone(),
            gid_attribute: cfg.gid_number_attribute.clone(),
        })
    }

    /// Authenticate a credential and resolve its identity facts.
    ///
    /// # Errors
    ///
    /// - `Denied` with the reason for every rejected login
    /// - `Unavailable` once the connect retry budget is spent
    /// - `Directory` if the server rejects a search
    #[tracing::instrument(skip_all, fields(username = %credential.username().escape_debug()))]
    pub async fn authenticate(&self, credential: &Credential) -> Result<Authenticated, DomainError> {
        let mut attempt = Attempt::new(credential.username());

        match self.run(&mut attempt, credential).await {
            Ok(authenticated) => {
                attempt.advance(AuthState::Authenticated);
                info!(
                    uid = authenticated.facts.uid(),
                    groups = ?authenticated.facts.group_tuples(),
                    "User authenticated"
                );
                Ok(authenticated)
            }
            Err(e) => {
                let failed_in = attempt.state;
                attempt.advance(AuthState::Denied);
                log_denial(failed_in, &e);
                Err(e)
            }
        }
    }

    /// [`Self::authenticate`], abandoned when `cancel` fires.
    ///
    /// Dropping the in-flight authentication drops its connection, so a
    /// cancelled login leaves nothing open and records nothing.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token fires first, otherwise as
    /// [`Self::authenticate`].
    pub async fn authenticate_until(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Authenticated, DomainError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(
                    username = %credential.username().escape_debug(),
                    state = ?AuthState::Denied,
                    "Authentication cancelled"
                );
                Err(DomainError::Cancelled)
            }
            result = self.authenticate(credential) => result,
        }
    }

    async fn run(
        &self,
        attempt: &mut Attempt<'_>,
        credential: &Credential,
    ) -> Result<Authenticated, DomainError> {
        attempt.advance(AuthState::Validating);
        self.verifier.validate(credential)?;

        let mut conn = connect_with_retry(self.connector.as_ref(), CONNECT_ATTEMPTS)
            .await
            .map_err(|(e, attempts)| DomainError::Unavailable {
                attempts,
                reason: e.to_string(),
            })?;

        let result = self.resolve(attempt, conn.as_mut(), credential).await;
        conn.close().await;
        result
    }

    async fn resolve(
        &self,
        attempt: &mut Attempt<'_>,
        conn: &mut dyn DirectoryConnection,
        credential: &Credential,
    ) -> Result<Authenticated, DomainError> {
        attempt.advance(AuthState::Binding);
        let bound = self.verifier.bind(conn, credential).await?;

        attempt.advance(AuthState::ResolvingIdentity);
        let username = credential.username();
        let record = self.users.resolve(conn, username).await?;
        if let Some(allowed) = &self.allowed {
            allowed.check(conn, &bound.user_dn, username).await?;
        }
        let uid = record.required_number(&self.uid_attribute)?;
        let primary_gid = GroupId::new(record.required(&self.gid_attribute)?);

        attempt.advance(AuthState::ResolvingGroups);
        let groups = self
            .groups
            .resolve_groups(conn, &primary_gid, username)
            .await?;

        let facts = IdentityFacts::new(
            username,
            uid,
            groups.primary,
            groups.supplementary,
            record.attributes,
        );
        Ok(Authenticated {
            canonical_username: username.to_owned(),
            facts,
        })
    }
}

fn log_denial(state: AuthState, e: &DomainError) {
    match e {
        DomainError::Denied(reason) => {
            warn!(
                state = ?state,
                reason = reason.code(),
                data_integrity = reason.is_data_integrity(),
                "Authentication denied"
            );
        }
        DomainError::Unavailable { attempts, reason } => {
            warn!(state = ?state, attempts, reason = %reason, "Directory unavailable, login denied");
        }
        DomainError::Cancelled => {
            info!(state = ?state, "Authentication cancelled");
        }
        DomainError::Directory(reason) | DomainError::Config(reason) => {
            warn!(state = ?state, reason = %reason, "Directory error, login denied");
        }
    }
}
