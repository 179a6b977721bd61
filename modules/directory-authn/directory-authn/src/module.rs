//! Directory `AuthN` module wiring.

use std::sync::Arc;

use anyhow::Context;
use directory_authn_sdk::DirectoryAuthenticatorClient;
use tracing::{info, warn};

use crate::config::{DirectoryAuthnConfig, DirectoryBackend};
use crate::domain::directory::DirectoryConnector;
use crate::domain::{DirectoryAuthnLocalClient, Service};
use crate::infra::StaticDirectory;

/// Directory `AuthN` module.
///
/// Builds the directory connector selected by `backend` and the service
/// on top of it. Consumers use [`Self::client`]; the binary also reaches
/// the service directly for cancellable logins.
pub struct DirectoryAuthnModule {
    service: Arc<Service>,
}

impl DirectoryAuthnModule {
    /// # Errors
    ///
    /// Fails if a template or the username pattern is invalid, or if the
    /// selected backend is not compiled in.
    pub fn from_config(cfg: &DirectoryAuthnConfig) -> anyhow::Result<Self> {
        let connector = build_connector(cfg)?;
        let service = Service::from_config(cfg, connector)
            .context("invalid directory authenticator configuration")?;

        info!(
            backend = ?cfg.backend,
            bind_templates = cfg.bind_dn_templates.len(),
            allowed_groups = cfg.allowed_groups.len(),
            lookup_dn = cfg.lookup_dn.is_some(),
            "Directory authenticator initialized"
        );
        Ok(Self {
            service: Arc::new(service),
        })
    }

    /// Build the module over an explicit connector.
    ///
    /// # Errors
    ///
    /// Fails if a template or the username pattern is invalid.
    pub fn with_connector(
        cfg: &DirectoryAuthnConfig,
        connector: Arc<dyn DirectoryConnector>,
    ) -> anyhow::Result<Self> {
        let service = Service::from_config(cfg, connector)
            .context("invalid directory authenticator configuration")?;
        Ok(Self {
            service: Arc::new(service),
        })
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn DirectoryAuthenticatorClient> {
        Arc::new(DirectoryAuthnLocalClient::new(self.service()))
    }
}

fn build_connector(cfg: &DirectoryAuthnConfig) -> anyhow::Result<Arc<dyn DirectoryConnector>> {
    match cfg.backend {
        DirectoryBackend::Static => {
            warn!(
                entries = cfg.static_entries.len(),
                "Directory authenticator is using the in-memory `static` backend. \
                 Do NOT use this backend in production."
            );
            Ok(Arc::new(StaticDirectory::from_config(&cfg.static_entries)))
        }
        #[cfg(feature = "ldap")]
        DirectoryBackend::Ldap => {
            let connector = crate::infra::LdapConnector::from_config(&cfg.server);
            info!(url = %connector.url(), "Using LDAP directory");
            Ok(Arc::new(connector))
        }
        #[cfg(not(feature = "ldap"))]
        DirectoryBackend::Ldap => {
            anyhow::bail!("backend `ldap` requires the `ldap` feature")
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invalid_template_fails_at_load() {
        let cfg = DirectoryAuthnConfig {
            backend: DirectoryBackend::Static,
            bind_dn_templates: vec!["uid={user},ou=People".to_owned()],
            ..DirectoryAuthnConfig::default()
        };
        assert!(DirectoryAuthnModule::from_config(&cfg).is_err());
    }

    #[test]
    fn bad_username_pattern_fails_at_load() {
        let cfg = DirectoryAuthnConfig {
            backend: DirectoryBackend::Static,
            bind_dn_templates: vec!["uid={username},ou=People".to_owned()],
            valid_username_regex: "^[a-z".to_owned(),
            ..DirectoryAuthnConfig::default()
        };
        assert!(DirectoryAuthnModule::from_config(&cfg).is_err());
    }
}
