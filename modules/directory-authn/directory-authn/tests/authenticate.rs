#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end authentication through the public client against the
//! in-memory directory.

use std::sync::Arc;

use directory_authn::config::{DirectoryAuthnConfig, DirectoryBackend, StaticEntryConfig};
use directory_authn::domain::directory::DirectoryEntry;
use directory_authn::infra::StaticDirectory;
use directory_authn::DirectoryAuthnModule;
use directory_authn_sdk::{
    Credential, DenyReason, DirectoryAuthnError, ErrorKind, GroupMembership,
};
use secrecy::SecretString;

const PEOPLE: &str = "ou=People,dc=example,dc=org";
const GROUPS: &str = "ou=Group,dc=example,dc=org";

fn config() -> DirectoryAuthnConfig {
    DirectoryAuthnConfig {
        backend: DirectoryBackend::Static,
        bind_dn_templates: vec![format!("uid={{username}},{PEOPLE}")],
        user_search_base: PEOPLE.to_owned(),
        group_search_base: GROUPS.to_owned(),
        ..DirectoryAuthnConfig::default()
    }
}

fn entry(dn: String, attrs: &[(&str, &[&str])], password: Option<&str>) -> StaticEntryConfig {
    StaticEntryConfig {
        dn,
        password: password.map(|p| SecretString::from(p.to_owned())),
        attributes: attrs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.iter().map(|s| (*s).to_owned()).collect()))
            .collect(),
    }
}

fn example_directory() -> Vec<StaticEntryConfig> {
    vec![
        entry(
            format!("uid=alice,{PEOPLE}"),
            &[
                ("uid", &["alice"]),
                ("uidNumber", &["1001"]),
                ("gidNumber", &["2000"]),
            ],
            Some("correct-pw"),
        ),
        entry(
            format!("cn=staff,{GROUPS}"),
            &[
                ("objectClass", &["posixGroup"]),
                ("cn", &["staff"]),
                ("gidNumber", &["2000"]),
            ],
            None,
        ),
        entry(
            format!("cn=lsst,{GROUPS}"),
            &[
                ("objectClass", &["posixGroup"]),
                ("cn", &["lsst"]),
                ("gidNumber", &["3000"]),
                ("memberUid", &["alice"]),
            ],
            None,
        ),
    ]
}

#[tokio::test]
async fn alice_resolves_primary_then_supplementary_groups() {
    let mut cfg = config();
    cfg.static_entries = example_directory();
    let client = DirectoryAuthnModule::from_config(&cfg).unwrap().client();

    let authenticated = client
        .authenticate(&Credential::new("alice", "correct-pw".to_owned()))
        .await
        .unwrap();

    assert_eq!(authenticated.canonical_username, "alice");
    assert_eq!(authenticated.facts.uid(), 1001);
    assert_eq!(authenticated.facts.primary_group_name(), "staff");
    assert_eq!(
        authenticated.facts.groups(),
        &[
            GroupMembership::new("staff", "2000"),
            GroupMembership::new("lsst", "3000"),
        ]
    );
    assert_eq!(authenticated.facts.group_tuples(), vec!["staff:2000", "lsst:3000"]);
}

#[tokio::test]
async fn wrong_password_is_a_generic_denial() {
    let mut cfg = config();
    cfg.static_entries = example_directory();
    let client = DirectoryAuthnModule::from_config(&cfg).unwrap().client();

    let err = client
        .authenticate(&Credential::new("alice", "nope".to_owned()))
        .await
        .unwrap_err();

    assert_eq!(err.deny_reason(), Some(&DenyReason::InvalidCredentials));
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(err.user_message(), "authentication failed");
}

#[tokio::test]
async fn malformed_input_makes_no_directory_calls() {
    let directory = StaticDirectory::from_config(&example_directory());
    let module = DirectoryAuthnModule::with_connector(&config(), Arc::new(directory.clone()))
        .unwrap();
    let client = module.client();

    for (username, password) in [
        ("alice)(uid=*", "correct-pw"),
        ("ALICE", "correct-pw"),
        ("alice", ""),
        ("alice", " \t "),
    ] {
        let err = client
            .authenticate(&Credential::new(username, password.to_owned()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{username:?}");
    }
    assert_eq!(directory.network_calls(), 0);
}

#[tokio::test]
async fn unreachable_directory_asks_user_to_log_in_again() {
    let directory = StaticDirectory::from_config(&example_directory());
    directory.fail_next_connects(10);
    let module = DirectoryAuthnModule::with_connector(&config(), Arc::new(directory.clone()))
        .unwrap();

    let err = module
        .client()
        .authenticate(&Credential::new("alice", "correct-pw".to_owned()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DirectoryAuthnError::DirectoryUnavailable { attempts: 3, .. }
    ));
    assert_eq!(err.user_message(), "Please log-out and log-back in to proceed.");
    assert_eq!(directory.network_calls(), 0);
}

#[tokio::test]
async fn pre_cancelled_login_is_denied_without_directory_calls() {
    let directory = StaticDirectory::from_config(&example_directory());
    let module = DirectoryAuthnModule::with_connector(&config(), Arc::new(directory.clone()))
        .unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();

    let err = module
        .service()
        .authenticate_until(&Credential::new("alice", "correct-pw".to_owned()), &cancel)
        .await
        .unwrap_err();

    assert_eq!(DirectoryAuthnError::from(err).kind(), ErrorKind::Cancelled);
    assert_eq!(directory.open_connections(), 0);
}

#[tokio::test]
async fn duplicate_user_entries_are_a_hard_error() {
    let mut entries = example_directory();
    entries.push(entry(
        format!("uid=alice,ou=Contractors,{PEOPLE}"),
        &[("uid", &["alice"]), ("uidNumber", &["1901"])],
        None,
    ));
    let directory = StaticDirectory::from_config(&entries);
    let module = DirectoryAuthnModule::with_connector(&config(), Arc::new(directory)).unwrap();

    let err = module
        .client()
        .authenticate(&Credential::new("alice", "correct-pw".to_owned()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ambiguous);
}

#[test]
fn directory_entry_builder_is_public() {
    let entry = DirectoryEntry::new("cn=x").with_attr("cn", &["x"]);
    assert_eq!(entry.first("CN"), Some("x"));
}
