#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Login then launch through the platform hooks, configured from a YAML
//! file with the in-memory directory.

use std::collections::BTreeMap;
use std::path::Path;

use directory_authn::DirectoryAuthnModule;
use lab_spawner::App;
use lab_spawner::config::AppConfig;
use lab_spawner::hooks::LoginOutcome;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use workload_placement::WorkloadPlacementModule;
use workload_placement::domain::environment::LaunchEnvironment;
use workload_placement_sdk::LaunchTarget;

const CONFIG: &str = r"
logging:
  level: debug
directory:
  backend: static
  bind_dn_templates:
    - uid={username},ou=People,dc=example,dc=org
  user_search_base: ou=People,dc=example,dc=org
  group_search_base: ou=Group,dc=example,dc=org
  static_entries:
    - dn: uid=alice,ou=People,dc=example,dc=org
      password: correct-pw
      attributes:
        uid: [alice]
        uidNumber: ['1001']
        gidNumber: ['2000']
    - dn: cn=staff,ou=Group,dc=example,dc=org
      attributes:
        objectClass: [posixGroup]
        cn: [staff]
        gidNumber: ['2000']
    - dn: cn=lsst,ou=Group,dc=example,dc=org
      attributes:
        objectClass: [posixGroup]
        cn: [lsst]
        gidNumber: ['3000']
        memberUid: [alice]
placement:
  default_image: team/custom:v2
  placement:
    node_defaults:
      spawn_on:
        pool: general
    node_selectors:
      - filter:
          groups: [lsst]
          images: [lab]
        spawn_on:
          pool: lsst
";

fn app(dir: &Path) -> App {
    let config_path = dir.join("lab-spawner.yaml");
    std::fs::write(&config_path, CONFIG).unwrap();
    let images_dir = dir.join("images.d");
    std::fs::create_dir(&images_dir).unwrap();
    std::fs::write(
        images_dir.join("recommended.yaml"),
        "title: Recommended\nimages:\n  - image: slaclab/lab:w_2024_01\n    description: Weekly\n",
    )
    .unwrap();

    let mut cfg = AppConfig::load(Some(&config_path)).unwrap();
    cfg.placement.images_dir = images_dir;

    let authn = DirectoryAuthnModule::from_config(&cfg.directory).unwrap();
    let placement =
        WorkloadPlacementModule::with_environment(&cfg.placement, LaunchEnvironment::default())
            .unwrap();
    App::new(&authn, &placement)
}

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_owned())
}

#[tokio::test]
async fn login_returns_canonical_username() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let outcome = app
        .login
        .login("alice", password("correct-pw"), &CancellationToken::new())
        .await;

    assert_eq!(outcome.username(), Some("alice"));
}

#[tokio::test]
async fn denied_login_has_no_username_and_a_generic_message() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    for (username, pw) in [("alice", "wrong"), ("mallory", "correct-pw"), ("Alice", "x")] {
        let outcome = app
            .login
            .login(username, password(pw), &CancellationToken::new())
            .await;
        assert_eq!(
            outcome,
            LoginOutcome::Denied {
                message: "authentication failed"
            }
        );
    }
}

#[tokio::test]
async fn session_from_login_drives_placement() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let LoginOutcome::Accepted(session) = app
        .login
        .login("alice", password("correct-pw"), &CancellationToken::new())
        .await
    else {
        panic!("login denied");
    };

    let form = BTreeMap::from([(
        "kernel_image".to_owned(),
        vec!["slaclab/lab:w_2024_01".to_owned()],
    )]);
    let mut target = LaunchTarget::default();
    let spec = app.spawn.pre_spawn(&session, &form, &mut target).unwrap();

    assert_eq!(spec.name(), "lab-alice-w.2024.01");
    assert_eq!(target.node_selector.get("pool").map(String::as_str), Some("lsst"));
    assert_eq!(
        target.environment.get("EXTERNAL_GROUPS").map(String::as_str),
        Some("staff:2000,lsst:3000")
    );
}

#[tokio::test]
async fn default_image_lands_on_node_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let LoginOutcome::Accepted(session) = app
        .login
        .login("alice", password("correct-pw"), &CancellationToken::new())
        .await
    else {
        panic!("login denied");
    };

    let mut target = LaunchTarget::default();
    let spec = app
        .spawn
        .pre_spawn(&session, &BTreeMap::new(), &mut target)
        .unwrap();

    assert_eq!(spec.image(), "team/custom:v2");
    assert_eq!(
        spec.node_selector(),
        &BTreeMap::from([("pool".to_owned(), "general".to_owned())])
    );
}

#[tokio::test]
async fn cancelled_login_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = app.login.login("alice", password("correct-pw"), &cancel).await;
    assert_eq!(outcome.username(), None);
}

#[test]
fn options_form_lists_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    assert!(
        app.spawn
            .options_form()
            .contains("value=\"slaclab/lab:w_2024_01\">Weekly<br>")
    );
}
