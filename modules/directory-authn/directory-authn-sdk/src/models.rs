//! Domain models for the directory authenticator.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Username/password pair submitted at login.
///
/// Lives for the duration of one `authenticate` call. The password is a
/// `SecretString`, so `Debug` redacts it.
#[derive(Debug, Clone)]
pub struct Credential {
    username: String,
    password: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Whether the password is empty or whitespace only.
    #[must_use]
    pub fn password_is_blank(&self) -> bool {
        self.password.expose_secret().trim().is_empty()
    }
}

/// Directory group identifier.
///
/// Directories hand group ids back as strings; they are kept opaque and
/// only parsed when a numeric id is needed (e.g. the pod's `fsGroup`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, if the id is a plain non-negative integer.
    #[must_use]
    pub fn numeric(&self) -> Option<u32> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One (group name, group id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub name: String,
    pub gid: GroupId,
}

impl GroupMembership {
    #[must_use]
    pub fn new(name: impl Into<String>, gid: impl Into<GroupId>) -> Self {
        Self {
            name: name.into(),
            gid: gid.into(),
        }
    }
}

impl fmt::Display for GroupMembership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.gid)
    }
}

/// Identity attributes resolved for one authenticated session.
///
/// `groups` always starts with the primary group and holds each group id
/// at most once. The value is owned by the session that authenticated and
/// is the only input the placement engine reads for group-based decisions.
/// Deserialized values go through [`IdentityFacts::new`] as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredIdentityFacts")]
pub struct IdentityFacts {
    canonical_username: String,
    uid: u32,
    primary_group: GroupMembership,
    groups: Vec<GroupMembership>,
    raw_attributes: BTreeMap<String, Vec<String>>,
}

/// Wire shape of [`IdentityFacts`], normalized on conversion.
#[derive(Deserialize)]
struct StoredIdentityFacts {
    canonical_username: String,
    uid: u32,
    primary_group: GroupMembership,
    #[serde(default)]
    groups: Vec<GroupMembership>,
    #[serde(default)]
    raw_attributes: BTreeMap<String, Vec<String>>,
}

impl From<StoredIdentityFacts> for IdentityFacts {
    fn from(stored: StoredIdentityFacts) -> Self {
        Self::new(
            stored.canonical_username,
            stored.uid,
            stored.primary_group,
            stored.groups,
            stored.raw_attributes,
        )
    }
}

impl IdentityFacts {
    /// Assemble identity facts.
    ///
    /// The primary group is placed first; supplementary groups keep their
    /// order and any whose id is already present are dropped.
    #[must_use]
    pub fn new(
        canonical_username: impl Into<String>,
        uid: u32,
        primary_group: GroupMembership,
        supplementary: impl IntoIterator<Item = GroupMembership>,
        raw_attributes: BTreeMap<String, Vec<String>>,
    ) -> Self {
        let mut groups = vec![primary_group.clone()];
        for group in supplementary {
            if groups.iter().all(|g| g.gid != group.gid) {
                groups.push(group);
            }
        }

        Self {
            canonical_username: canonical_username.into(),
            uid,
            primary_group,
            groups,
            raw_attributes,
        }
    }

    #[must_use]
    pub fn canonical_username(&self) -> &str {
        &self.canonical_username
    }

    #[must_use]
    pub fn uid(&self) -> u32 {
        self.uid
    }

    #[must_use]
    pub fn primary_group(&self) -> &GroupMembership {
        &self.primary_group
    }

    #[must_use]
    pub fn primary_group_id(&self) -> &GroupId {
        &self.primary_group.gid
    }

    #[must_use]
    pub fn primary_group_name(&self) -> &str {
        &self.primary_group.name
    }

    /// All groups, primary first.
    #[must_use]
    pub fn groups(&self) -> &[GroupMembership] {
        &self.groups
    }

    /// Group names in membership order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    /// `name:gid` tuples in membership order.
    #[must_use]
    pub fn group_tuples(&self) -> Vec<String> {
        self.groups.iter().map(ToString::to_string).collect()
    }

    /// Numeric ids of every group that has one.
    #[must_use]
    pub fn numeric_group_ids(&self) -> Vec<u32> {
        self.groups.iter().filter_map(|g| g.gid.numeric()).collect()
    }

    #[must_use]
    pub fn raw_attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.raw_attributes
    }
}

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated {
    /// Name the session is stored under.
    pub canonical_username: String,
    /// Identity facts to thread into the launch step.
    pub facts: IdentityFacts,
}
