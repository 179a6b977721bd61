//! Configuration for the directory authenticator.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Deserialize;

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryAuthnConfig {
    /// Which directory implementation to talk to.
    pub backend: DirectoryBackend,

    /// Connection settings for the `ldap` backend.
    pub server: LdapServerConfig,

    /// Entries served by the `static` backend.
    pub static_entries: Vec<StaticEntryConfig>,

    /// Usernames must match this pattern before anything reaches the directory.
    pub valid_username_regex: String,

    /// Bind DN templates tried in order. Each must contain `{username}`.
    pub bind_dn_templates: Vec<String>,

    /// Escape filter metacharacters in the name substituted into bind DNs.
    pub escape_userdn: bool,

    /// Resolve the name rendered into bind templates via a directory search.
    pub lookup_dn: Option<LookupDnConfig>,

    /// Base for the user record search.
    pub user_search_base: String,

    /// Attribute the login name is matched against.
    pub user_attribute: String,

    /// User search filter; placeholders `{userattr}` and `{username}`.
    pub search_filter: String,

    /// Attributes fetched for user and group records.
    pub attributes: Vec<String>,

    /// Attribute holding the numeric user id.
    pub uid_number_attribute: String,

    /// Attribute holding the numeric primary group id.
    pub gid_number_attribute: String,

    /// Attribute holding a group's display name.
    pub group_name_attribute: String,

    /// Base for primary and supplementary group searches.
    pub group_search_base: String,

    /// Primary group filter; placeholder `{gid}`.
    pub primary_group_filter: String,

    /// Supplementary group filter; placeholder `{username}`.
    pub group_search_filter: String,

    /// Group DNs the user must belong to. Empty means no restriction.
    pub allowed_groups: Vec<String>,

    /// Membership filter for `allowed_groups`; placeholders `{userdn}` and `{username}`.
    pub allowed_group_filter: String,
}

impl Default for DirectoryAuthnConfig {
    fn default() -> Self {
        Self {
            backend: DirectoryBackend::Ldap,
            server: LdapServerConfig::default(),
            static_entries: Vec::new(),
            valid_username_regex: "^[a-z][.a-z0-9_-]*$".to_owned(),
            bind_dn_templates: Vec::new(),
            escape_userdn: true,
            lookup_dn: None,
            user_search_base: String::new(),
            user_attribute: "uid".to_owned(),
            search_filter: "(&({userattr}={username}))".to_owned(),
            attributes: vec![
                "uidNumber".to_owned(),
                "gidNumber".to_owned(),
                "cn".to_owned(),
                "mail".to_owned(),
            ],
            uid_number_attribute: "uidNumber".to_owned(),
            gid_number_attribute: "gidNumber".to_owned(),
            group_name_attribute: "cn".to_owned(),
            group_search_base: String::new(),
            primary_group_filter: "(&(objectclass=posixGroup)(gidNumber={gid}))".to_owned(),
            group_search_filter: "(&(objectclass=posixGroup)(memberUid={username}))".to_owned(),
            allowed_groups: Vec::new(),
            allowed_group_filter: "(|(member={userdn})(uniqueMember={userdn})(memberUid={username}))"
                .to_owned(),
        }
    }
}

/// Directory implementation.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryBackend {
    /// Real LDAP server.
    #[default]
    Ldap,
    /// In-memory entries from `static_entries`. For development and testing.
    Static,
}

/// LDAP server connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LdapServerConfig {
    pub address: String,

    /// Defaults to 636 with `use_ssl`, 389 otherwise.
    pub port: Option<u16>,

    pub use_ssl: bool,

    pub connect_timeout_secs: u64,
}

impl Default for LdapServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_owned(),
            port: None,
            use_ssl: false,
            connect_timeout_secs: 10,
        }
    }
}

impl LdapServerConfig {
    #[must_use]
    pub fn url(&self) -> String {
        let (scheme, default_port) = if self.use_ssl {
            ("ldaps", 636)
        } else {
            ("ldap", 389)
        };
        format!(
            "{scheme}://{}:{}",
            self.address,
            self.port.unwrap_or(default_port)
        )
    }
}

/// Bind DN lookup settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupDnConfig {
    /// DN to bind as for the lookup. Anonymous when absent.
    pub search_user: Option<String>,

    pub search_password: Option<SecretString>,

    /// Placeholders `{login_attr}` and `{login}`.
    pub search_filter: String,

    /// Attribute whose value replaces the login name.
    pub user_dn_attribute: String,
}

impl Default for LookupDnConfig {
    fn default() -> Self {
        Self {
            search_user: None,
            search_password: None,
            search_filter: "({login_attr}={login})".to_owned(),
            user_dn_attribute: "cn".to_owned(),
        }
    }
}

/// One entry of the `static` backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticEntryConfig {
    pub dn: String,

    /// Entries without a password cannot be bound.
    #[serde(default)]
    pub password: Option<SecretString>,

    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}
