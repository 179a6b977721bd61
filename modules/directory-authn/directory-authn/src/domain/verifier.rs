//! Credential verification: input validation, optional DN lookup, and the
//! ordered bind-template loop.

use std::borrow::Cow;

use directory_authn_sdk::{Credential, DenyReason};
use regex::Regex;
use secrecy::SecretString;
use tracing::{debug, warn};

use super::directory::{DirectoryConnection, DirectoryError, SearchRequest, SearchScope};
use super::error::DomainError;
use super::query::{DnTemplate, FilterTemplate, escape_unescaped_commas};
use crate::config::{DirectoryAuthnConfig, LookupDnConfig};

/// Outcome of a successful bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundUser {
    /// Name rendered into the bind template (the DN lookup result, if configured).
    pub username: String,
    /// DN the bind succeeded with, before any filter escaping.
    pub user_dn: String,
    /// Index of the bind template that succeeded.
    pub template_index: usize,
}

/// Resolves the login name to the value rendered into bind templates.
#[derive(Debug, Clone)]
struct DnLookup {
    search_user: Option<String>,
    search_password: Option<SecretString>,
    base: String,
    login_attr: String,
    filter: FilterTemplate,
    dn_attribute: String,
}

impl DnLookup {
    fn from_config(
        cfg: &LookupDnConfig,
        base: &str,
        login_attr: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            search_user: cfg.search_user.clone(),
            search_password: cfg.search_password.clone(),
            base: base.to_owned(),
            login_attr: login_attr.to_owned(),
            filter: FilterTemplate::parse(&cfg.search_filter, &["login_attr", "login"])?,
            dn_attribute: cfg.user_dn_attribute.clone(),
        })
    }

    /// Whether the resolved name comes from a `cn` and has its commas escaped.
    fn resolves_cn(&self) -> bool {
        self.dn_attribute.eq_ignore_ascii_case("cn")
    }

    async fn resolve(
        &self,
        conn: &mut dyn DirectoryConnection,
        login: &str,
    ) -> Result<String, DomainError> {
        let (dn, password) = match (&self.search_user, &self.search_password) {
            (Some(user), Some(password)) => (user.as_str(), password.clone()),
            (Some(user), None) => (user.as_str(), SecretString::from(String::new())),
            (None, _) => ("", SecretString::from(String::new())),
        };
        conn.bind(dn, &password).await.map_err(|e| match e {
            DirectoryError::BindRejected(reason) => {
                DomainError::Directory(format!("lookup bind as {dn:?} rejected: {reason}"))
            }
            other => other.into(),
        })?;

        let request = SearchRequest {
            base: self.base.clone(),
            scope: SearchScope::Subtree,
            filter: self
                .filter
                .render(&[("login_attr", self.login_attr.as_str()), ("login", login)]),
            attributes: vec![self.dn_attribute.clone()],
        };
        let entries = conn.search(&request).await?;

        let [entry] = entries.as_slice() else {
            warn!(
                username = login,
                matches = entries.len(),
                "DN lookup did not yield exactly one entry"
            );
            return Err(DenyReason::UnresolvableUsername.into());
        };

        let Some(resolved) = entry.first(&self.dn_attribute) else {
            warn!(
                username = login,
                dn = %entry.dn,
                attribute = %self.dn_attribute,
                "DN lookup entry lacks attribute"
            );
            return Err(DenyReason::UnresolvableUsername.into());
        };
        Ok(resolved.to_owned())
    }
}

/// Credential verifier.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    username_pattern: Regex,
    bind_templates: Vec<DnTemplate>,
    escape_userdn: bool,
    lookup: Option<DnLookup>,
}

impl CredentialVerifier {
    /// Build the verifier, compiling the pattern and templates.
    ///
    /// Blank bind templates are skipped with a warning.
    ///
    /// # Errors
    ///
    /// `Config` if the pattern or any template is invalid, or if no usable
    /// bind template remains.
    pub fn from_config(cfg: &DirectoryAuthnConfig) -> Result<Self, DomainError> {
        let username_pattern = Regex::new(&cfg.valid_username_regex)?;

        let mut bind_templates = Vec::with_capacity(cfg.bind_dn_templates.len());
        for raw in &cfg.bind_dn_templates {
            if raw.trim().is_empty() {
                warn!("Ignoring blank bind_dn_templates entry");
                continue;
            }
            bind_templates.push(DnTemplate::parse(raw)?);
        }
        if bind_templates.is_empty() {
            return Err(DomainError::Config(
                "bind_dn_templates must contain at least one template".to_owned(),
            ));
        }

        let lookup = cfg
            .lookup_dn
            .as_ref()
            .map(|l| DnLookup::from_config(l, &cfg.user_search_base, &cfg.user_attribute))
            .transpose()?;

        Ok(Self {
            username_pattern,
            bind_templates,
            escape_userdn: cfg.escape_userdn,
            lookup,
        })
    }

    /// Reject malformed input. Never touches the directory.
    ///
    /// # Errors
    ///
    /// `InvalidUsername` or `BlankPassword`.
    pub fn validate(&self, credential: &Credential) -> Result<(), DenyReason> {
        let username = credential.username();
        if !self.username_pattern.is_match(username) {
            warn!(
                username = %username.escape_debug(),
                pattern = %self.username_pattern,
                "Illegal characters in username"
            );
            return Err(DenyReason::InvalidUsername);
        }

        if credential.password_is_blank() {
            warn!(username, "Login denied for blank password");
            return Err(DenyReason::BlankPassword);
        }

        Ok(())
    }

    /// Bind the connection as the user, trying templates in order.
    ///
    /// A rejected bind moves on to the next template; the first success wins.
    ///
    /// # Errors
    ///
    /// - `Denied(UnresolvableUsername)` if DN lookup fails
    /// - `Denied(InvalidCredentials)` if no template binds
    /// - `Unavailable` on transport failure
    pub async fn bind(
        &self,
        conn: &mut dyn DirectoryConnection,
        credential: &Credential,
    ) -> Result<BoundUser, DomainError> {
        let (name, from_cn) = match &self.lookup {
            Some(lookup) => (
                lookup.resolve(conn, credential.username()).await?,
                lookup.resolves_cn(),
            ),
            None => (credential.username().to_owned(), false),
        };
        let username = template_value(&name, false, from_cn);
        let bind_value = if self.escape_userdn {
            template_value(&name, true, from_cn)
        } else {
            username.clone()
        };

        for (template_index, template) in self.bind_templates.iter().enumerate() {
            let user_dn = template.render(&username);
            let bind_dn = template.render(&bind_value);

            debug!(username = %username, userdn = %bind_dn, "Attempting to bind");
            match conn.bind(&bind_dn, credential.password()).await {
                Ok(()) => {
                    debug!(
                        username = %username,
                        userdn = %bind_dn,
                        is_bound = true,
                        "Status of user bind"
                    );
                    return Ok(BoundUser {
                        username,
                        user_dn,
                        template_index,
                    });
                }
                Err(DirectoryError::BindRejected(reason)) => {
                    debug!(
                        username = %username,
                        userdn = %bind_dn,
                        is_bound = false,
                        reason = %reason,
                        "Status of user bind"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(username = %username, "Invalid password for user");
        Err(DenyReason::InvalidCredentials.into())
    }
}

/// Value substituted for `{username}` in a bind template.
///
/// Filter escaping covers the raw name only. Commas of a `cn`-derived name
/// are escaped afterwards, so their `\,` reaches the DN untouched.
fn template_value(name: &str, filter_escape: bool, from_cn: bool) -> String {
    let value = if filter_escape {
        ldap3::ldap_escape(name)
    } else {
        Cow::Borrowed(name)
    };
    if from_cn {
        escape_unescaped_commas(&value)
    } else {
        value.into_owned()
    }
}
