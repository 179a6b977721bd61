//! User attribute and group membership lookups on a bound connection.

use std::collections::BTreeMap;

use directory_authn_sdk::{DenyReason, GroupId, GroupMembership};
use tracing::{debug, warn};

use super::directory::{DirectoryConnection, DirectoryEntry, SearchRequest, SearchScope};
use super::error::DomainError;
use super::query::FilterTemplate;
use crate::config::DirectoryAuthnConfig;

/// The user's directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub dn: String,
    /// Every requested attribute with its full value sequence.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl UserRecord {
    /// First value of `attribute`, required to be present.
    ///
    /// # Errors
    ///
    /// `MissingAttribute` if absent.
    pub fn required(&self, attribute: &str) -> Result<&str, DenyReason> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(attribute))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
            .ok_or_else(|| DenyReason::MissingAttribute {
                dn: self.dn.clone(),
                attribute: attribute.to_owned(),
            })
    }

    /// First value of `attribute` parsed as a non-negative integer.
    ///
    /// # Errors
    ///
    /// `MissingAttribute` if absent, `MalformedAttribute` if not numeric.
    pub fn required_number(&self, attribute: &str) -> Result<u32, DenyReason> {
        let raw = self.required(attribute)?;
        raw.trim()
            .parse()
            .map_err(|_| DenyReason::MalformedAttribute {
                dn: self.dn.clone(),
                attribute: attribute.to_owned(),
                value: raw.to_owned(),
            })
    }
}

/// Looks up the user record.
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    base: String,
    user_attribute: String,
    filter: FilterTemplate,
    attributes: Vec<String>,
}

impl AttributeResolver {
    /// # Errors
    ///
    /// `Config` if the search filter template is invalid.
    pub fn from_config(cfg: &DirectoryAuthnConfig) -> Result<Self, DomainError> {
        Ok(Self {
            base: cfg.user_search_base.clone(),
            user_attribute: cfg.user_attribute.clone(),
            filter: FilterTemplate::parse(&cfg.search_filter, &["userattr", "username"])?,
            attributes: with_required(
                &cfg.attributes,
                [&cfg.uid_number_attribute, &cfg.gid_number_attribute],
            ),
        })
    }

    /// Find exactly one user record.
    ///
    /// # Errors
    ///
    /// - `Denied(UserNotFound)` for zero results
    /// - `Denied(UserAmbiguous)` for more than one
    /// - directory errors
    pub async fn resolve(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<UserRecord, DomainError> {
        debug!(
            user_search_base = %self.base,
            userattr = %self.user_attribute,
            username,
            "Looking for user"
        );
        let request = SearchRequest {
            base: self.base.clone(),
            scope: SearchScope::Subtree,
            filter: self.filter.render(&[
                ("userattr", self.user_attribute.as_str()),
                ("username", username),
            ]),
            attributes: self.attributes.clone(),
        };
        let mut entries = conn.search(&request).await?;

        match entries.len() {
            0 => {
                warn!(userattr = %self.user_attribute, username, "User not found in directory");
                Err(DenyReason::UserNotFound.into())
            }
            1 => {
                let entry = entries.remove(0);
                Ok(UserRecord {
                    dn: entry.dn,
                    attributes: entry.attributes,
                })
            }
            count => {
                warn!(userattr = %self.user_attribute, username, count, "Duplicate users found in directory");
                Err(DenyReason::UserAmbiguous { count }.into())
            }
        }
    }
}

/// Primary group plus supplementary groups, in directory order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFacts {
    pub primary: GroupMembership,
    pub supplementary: Vec<GroupMembership>,
}

impl GroupFacts {
    /// Primary first, then supplementary groups with duplicate ids removed.
    #[must_use]
    pub fn ordered(&self) -> Vec<GroupMembership> {
        let mut groups = vec![self.primary.clone()];
        for group in &self.supplementary {
            if groups.iter().all(|g| g.gid != group.gid) {
                groups.push(group.clone());
            }
        }
        groups
    }
}

/// Looks up the primary group name and supplementary memberships.
#[derive(Debug, Clone)]
pub struct GroupResolver {
    base: String,
    primary_filter: FilterTemplate,
    membership_filter: FilterTemplate,
    name_attribute: String,
    gid_attribute: String,
    attributes: Vec<String>,
}

impl GroupResolver {
    /// # Errors
    ///
    /// `Config` if a filter template is invalid.
    pub fn from_config(cfg: &DirectoryAuthnConfig) -> Result<Self, DomainError> {
        let attributes = with_required(
            &cfg.attributes,
            [&cfg.group_name_attribute, &cfg.gid_number_attribute],
        );

        Ok(Self {
            base: cfg.group_search_base.clone(),
            primary_filter: FilterTemplate::parse(&cfg.primary_group_filter, &["gid"])?,
            membership_filter: FilterTemplate::parse(&cfg.group_search_filter, &["username"])?,
            name_attribute: cfg.group_name_attribute.clone(),
            gid_attribute: cfg.gid_number_attribute.clone(),
            attributes,
        })
    }

    /// Resolve the primary group name and every supplementary group.
    ///
    /// # Errors
    ///
    /// - `Denied(PrimaryGroupNotFound)` / `Denied(PrimaryGroupAmbiguous)`
    /// - `Denied(MissingAttribute)` for a group entry without name or id
    /// - directory errors
    pub async fn resolve_groups(
        &self,
        conn: &mut dyn DirectoryConnection,
        primary_gid: &GroupId,
        username: &str,
    ) -> Result<GroupFacts, DomainError> {
        let request = SearchRequest {
            base: self.base.clone(),
            scope: SearchScope::Subtree,
            filter: self.primary_filter.render(&[("gid", primary_gid.as_str())]),
            attributes: self.attributes.clone(),
        };
        let entries = conn.search(&request).await?;
        let primary_entry = match entries.as_slice() {
            [] => {
                warn!(gid = %primary_gid, "Could not find group for primary gid");
                return Err(DenyReason::PrimaryGroupNotFound {
                    gid: primary_gid.to_string(),
                }
                .into());
            }
            [entry] => entry,
            _ => {
                warn!(gid = %primary_gid, count = entries.len(), "Too many groups match primary gid");
                return Err(DenyReason::PrimaryGroupAmbiguous {
                    gid: primary_gid.to_string(),
                    count: entries.len(),
                }
                .into());
            }
        };
        let primary = GroupMembership {
            name: required_attr(primary_entry, &self.name_attribute)?.to_owned(),
            gid: primary_gid.clone(),
        };

        debug!(group_search_base = %self.base, username, "Looking for supplementary groups");
        let request = SearchRequest {
            base: self.base.clone(),
            scope: SearchScope::Subtree,
            filter: self.membership_filter.render(&[("username", username)]),
            attributes: self.attributes.clone(),
        };
        let supplementary = conn
            .search(&request)
            .await?
            .iter()
            .map(|entry| {
                Ok(GroupMembership {
                    name: required_attr(entry, &self.name_attribute)?.to_owned(),
                    gid: GroupId::new(required_attr(entry, &self.gid_attribute)?),
                })
            })
            .collect::<Result<Vec<_>, DenyReason>>()?;

        debug!(
            username,
            primary = %primary,
            supplementary = supplementary.len(),
            "Resolved group memberships"
        );
        Ok(GroupFacts {
            primary,
            supplementary,
        })
    }
}

/// Requested attributes plus any `needed` ones not already listed.
fn with_required<'n>(
    requested: &[String],
    needed: impl IntoIterator<Item = &'n String>,
) -> Vec<String> {
    let mut attributes = requested.to_vec();
    for name in needed {
        if !attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            attributes.push(name.clone());
        }
    }
    attributes
}

fn required_attr<'e>(entry: &'e DirectoryEntry, attribute: &str) -> Result<&'e str, DenyReason> {
    entry
        .first(attribute)
        .ok_or_else(|| DenyReason::MissingAttribute {
            dn: entry.dn.clone(),
            attribute: attribute.to_owned(),
        })
}

/// Checks membership in at least one of the allowed group DNs.
#[derive(Debug, Clone)]
pub struct AllowedGroups {
    group_dns: Vec<String>,
    filter: FilterTemplate,
}

impl AllowedGroups {
    /// `None` when no restriction is configured.
    ///
    /// # Errors
    ///
    /// `Config` if the membership filter template is invalid.
    pub fn from_config(cfg: &DirectoryAuthnConfig) -> Result<Option<Self>, DomainError> {
        if cfg.allowed_groups.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            group_dns: cfg.allowed_groups.clone(),
            filter: FilterTemplate::parse(&cfg.allowed_group_filter, &["userdn", "username"])?,
        }))
    }

    /// # Errors
    ///
    /// `Denied(NotAuthorized)` if no allowed group lists the user.
    pub async fn check(
        &self,
        conn: &mut dyn DirectoryConnection,
        user_dn: &str,
        username: &str,
    ) -> Result<(), DomainError> {
        let filter = self
            .filter
            .render(&[("userdn", user_dn), ("username", username)]);
        for group in &self.group_dns {
            let request = SearchRequest {
                base: group.clone(),
                scope: SearchScope::Base,
                filter: filter.clone(),
                attributes: vec![
                    "member".to_owned(),
                    "uniqueMember".to_owned(),
                    "memberUid".to_owned(),
                ],
            };
            if !conn.search(&request).await?.is_empty() {
                debug!(username, group = %group, "User is member of allowed group");
                return Ok(());
            }
        }

        warn!(username, "User not in any of the allowed groups");
        Err(DenyReason::NotAuthorized.into())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::directory::DirectoryConnector;
    use crate::infra::memory::StaticDirectory;

    fn config() -> DirectoryAuthnConfig {
        DirectoryAuthnConfig {
            bind_dn_templates: vec!["uid={username},ou=People,dc=example,dc=org".to_owned()],
            user_search_base: "ou=People,dc=example,dc=org".to_owned(),
            group_search_base: "ou=Group,dc=example,dc=org".to_owned(),
            ..DirectoryAuthnConfig::default()
        }
    }

    fn user(uid: &str) -> DirectoryEntry {
        DirectoryEntry::new(format!("uid={uid},ou=People,dc=example,dc=org"))
            .with_attr("uid", &[uid])
            .with_attr("uidNumber", &["1001"])
            .with_attr("gidNumber", &["2000"])
            .with_attr("mail", &["alice@example.org", "alice@lab.example.org"])
    }

    fn group(cn: &str, gid: &str, members: &[&str]) -> DirectoryEntry {
        DirectoryEntry::new(format!("cn={cn},ou=Group,dc=example,dc=org"))
            .with_attr("objectClass", &["posixGroup"])
            .with_attr("cn", &[cn])
            .with_attr("gidNumber", &[gid])
            .with_attr("memberUid", members)
    }

    async fn resolve_user(directory: &StaticDirectory) -> Result<UserRecord, DomainError> {
        let resolver = AttributeResolver::from_config(&config()).unwrap();
        let mut conn = directory.connect().await.unwrap();
        resolver.resolve(conn.as_mut(), "alice").await
    }

    async fn resolve_groups(directory: &StaticDirectory) -> Result<GroupFacts, DomainError> {
        let resolver = GroupResolver::from_config(&config()).unwrap();
        let mut conn = directory.connect().await.unwrap();
        resolver
            .resolve_groups(conn.as_mut(), &GroupId::new("2000"), "alice")
            .await
    }

    #[tokio::test]
    async fn user_record_keeps_multi_valued_attributes() {
        let directory = StaticDirectory::from_entries(vec![user("alice")]);
        let record = resolve_user(&directory).await.unwrap();

        assert_eq!(record.required_number("uidNumber").unwrap(), 1001);
        assert_eq!(record.attributes.get("mail").map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn id_attributes_are_fetched_even_when_not_listed() {
        let mut cfg = config();
        cfg.attributes = vec!["cn".to_owned(), "mail".to_owned()];
        let resolver = AttributeResolver::from_config(&cfg).unwrap();
        let directory = StaticDirectory::from_entries(vec![user("alice")]);
        let mut conn = directory.connect().await.unwrap();

        let record = resolver.resolve(conn.as_mut(), "alice").await.unwrap();

        assert_eq!(record.required_number(&cfg.uid_number_attribute).unwrap(), 1001);
        assert_eq!(record.required(&cfg.gid_number_attribute).unwrap(), "2000");
        assert_eq!(record.attributes.get("mail").map(Vec::len), Some(2));
        assert!(!record.attributes.contains_key("uid"));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let directory = StaticDirectory::from_entries(vec![user("bob")]);
        let err = resolve_user(&directory).await.unwrap_err();
        assert!(matches!(err, DomainError::Denied(DenyReason::UserNotFound)));
    }

    #[tokio::test]
    async fn duplicate_user_is_ambiguous() {
        let duplicate = DirectoryEntry::new("uid=alice,ou=Contractors,ou=People,dc=example,dc=org")
            .with_attr("uid", &["alice"]);
        let directory = StaticDirectory::from_entries(vec![user("alice"), duplicate]);
        let err = resolve_user(&directory).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Denied(DenyReason::UserAmbiguous { count: 2 })
        ));
    }

    #[test]
    fn non_numeric_uid_is_malformed() {
        let record = UserRecord {
            dn: "uid=alice".to_owned(),
            attributes: BTreeMap::from([("uidNumber".to_owned(), vec!["abc".to_owned()])]),
        };
        assert!(matches!(
            record.required_number("uidNumber"),
            Err(DenyReason::MalformedAttribute { .. })
        ));
        assert!(matches!(
            record.required("gidNumber"),
            Err(DenyReason::MissingAttribute { .. })
        ));
    }

    #[tokio::test]
    async fn no_supplementary_groups_yields_only_primary() {
        let directory = StaticDirectory::from_entries(vec![group("staff", "2000", &[])]);
        let facts = resolve_groups(&directory).await.unwrap();

        assert_eq!(facts.ordered(), vec![GroupMembership::new("staff", "2000")]);
        assert!(facts.supplementary.is_empty());
    }

    #[tokio::test]
    async fn duplicate_primary_group_is_ambiguous() {
        let directory = StaticDirectory::from_entries(vec![
            group("staff", "2000", &[]),
            group("staff-legacy", "2000", &[]),
        ]);
        let err = resolve_groups(&directory).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Denied(DenyReason::PrimaryGroupAmbiguous { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn missing_primary_group_is_not_found() {
        let directory = StaticDirectory::from_entries(vec![group("lsst", "3000", &["alice"])]);
        let err = resolve_groups(&directory).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Denied(DenyReason::PrimaryGroupNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn supplementary_groups_keep_directory_order() {
        let directory = StaticDirectory::from_entries(vec![
            group("staff", "2000", &[]),
            group("ocio", "3100", &["alice"]),
            group("lsst", "3000", &["alice", "bob"]),
            group("other", "3200", &["bob"]),
        ]);
        let facts = resolve_groups(&directory).await.unwrap();

        assert_eq!(
            facts.ordered(),
            vec![
                GroupMembership::new("staff", "2000"),
                GroupMembership::new("ocio", "3100"),
                GroupMembership::new("lsst", "3000"),
            ]
        );
    }

    #[tokio::test]
    async fn allowed_groups_gate_membership() {
        let mut cfg = config();
        cfg.allowed_groups = vec![
            "cn=admins,ou=Group,dc=example,dc=org".to_owned(),
            "cn=lsst,ou=Group,dc=example,dc=org".to_owned(),
        ];
        let allowed = AllowedGroups::from_config(&cfg).unwrap().unwrap();
        let directory = StaticDirectory::from_entries(vec![
            group("admins", "4000", &["root"]),
            group("lsst", "3000", &["alice"]),
        ]);
        let mut conn = directory.connect().await.unwrap();

        let user_dn = "uid=alice,ou=People,dc=example,dc=org";
        assert!(allowed.check(conn.as_mut(), user_dn, "alice").await.is_ok());
        let err = allowed
            .check(conn.as_mut(), "uid=bob,ou=People,dc=example,dc=org", "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Denied(DenyReason::NotAuthorized)));
    }

    #[test]
    fn no_allowed_groups_means_no_restriction() {
        assert!(AllowedGroups::from_config(&config()).unwrap().is_none());
    }
}
