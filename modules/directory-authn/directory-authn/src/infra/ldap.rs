//! LDAP directory adapter built on `ldap3`.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::config::LdapServerConfig;
use crate::domain::directory::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest,
    SearchScope,
};

/// Opens one LDAP connection per authentication.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    url: String,
    connect_timeout: Duration,
}

impl LdapConnector {
    #[must_use]
    pub fn from_config(cfg: &LdapServerConfig) -> Self {
        Self {
            url: cfg.url(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        let url = self.url.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(url = %url, error = %e, "LDAP connection terminated with error");
            }
        });

        debug!(url = %self.url, "Connected to LDAP server");
        Ok(Box::new(LdapConnection { ldap }))
    }
}

struct LdapConnection {
    ldap: Ldap,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn bind(&mut self, dn: &str, password: &SecretString) -> Result<(), DirectoryError> {
        let result = self
            .ldap
            .simple_bind(dn, password.expose_secret())
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if result.rc == 0 {
            Ok(())
        } else {
            Err(DirectoryError::BindRejected(format!(
                "rc={} {}",
                result.rc, result.text
            )))
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let scope = match request.scope {
            SearchScope::Base => Scope::Base,
            SearchScope::Subtree => Scope::Subtree,
        };
        let SearchResult(entries, result) = self
            .ldap
            .search(
                &request.base,
                scope,
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        // noSuchObject on a base search means "no entry", not a failure.
        match result.rc {
            0 => {}
            32 => return Ok(Vec::new()),
            rc => {
                return Err(DirectoryError::Search(format!(
                    "rc={rc} {} (base {:?}, filter {:?})",
                    result.text, request.base, request.filter
                )));
            }
        }

        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_ref() && !entry.is_intermediate())
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs.into_iter().collect(),
                }
            })
            .collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
    }
}
