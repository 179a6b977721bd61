//! Directory port.
//!
//! The authenticator talks to the directory only through these traits, so
//! the LDAP adapter and the in-memory directory are interchangeable.

use std::collections::BTreeMap;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::warn;

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the entry named by the base.
    Base,
    /// The base entry and everything below it.
    Subtree,
}

/// A single directory search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
}

/// A directory record with multi-valued attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes.insert(
            name.to_owned(),
            values.iter().map(|v| (*v).to_owned()).collect(),
        );
        self
    }

    /// All values of an attribute. Attribute names compare case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Errors raised by directory implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// The server could not be reached or the connection dropped.
    #[error("directory unreachable: {0}")]
    Unavailable(String),

    /// The server refused the bind.
    #[error("bind rejected: {0}")]
    BindRejected(String),

    /// The server answered a search with an error.
    #[error("search failed: {0}")]
    Search(String),
}

/// Opens directory connections. One connection per authentication.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// # Errors
    ///
    /// `Unavailable` if the server cannot be reached.
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}

/// An open directory connection.
///
/// Operations on one connection never interleave; each call completes
/// before the next is issued.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Simple bind. An empty DN binds anonymously.
    ///
    /// # Errors
    ///
    /// - `BindRejected` if the server refuses the credentials
    /// - `Unavailable` on transport failure
    async fn bind(&mut self, dn: &str, password: &SecretString) -> Result<(), DirectoryError>;

    /// # Errors
    ///
    /// - `Search` if the server rejects the search
    /// - `Unavailable` on transport failure
    async fn search(&mut self, request: &SearchRequest)
    -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Unbind and release the connection.
    async fn close(&mut self);
}

/// Connect, retrying transport failures until `attempts` is used up.
///
/// Returns the last error and the number of attempts made on failure.
///
/// # Errors
///
/// The last connect error once every attempt has failed.
pub async fn connect_with_retry(
    connector: &dyn DirectoryConnector,
    attempts: u32,
) -> Result<Box<dyn DirectoryConnection>, (DirectoryError, u32)> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match connector.connect().await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < attempts => {
                warn!(attempt, max_attempts = attempts, error = %e, "Error connecting to directory, retrying");
            }
            Err(e) => {
                warn!(attempt, max_attempts = attempts, error = %e, "Error connecting to directory, giving up");
                return Err((e, attempt));
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = DirectoryEntry::new("uid=alice,ou=People,dc=example,dc=org")
            .with_attr("uidNumber", &["1001"])
            .with_attr("mail", &["alice@example.org", "a@example.org"]);

        assert_eq!(entry.first("uidnumber"), Some("1001"));
        assert_eq!(entry.values("MAIL").map(<[String]>::len), Some(2));
        assert_eq!(entry.first("gidNumber"), None);
    }
}
