#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Launch path through the public hook with placement and catalog files
//! on disk.

use std::collections::BTreeMap;
use std::path::Path;

use directory_authn_sdk::{GroupMembership, IdentityFacts};
use workload_placement::WorkloadPlacementModule;
use workload_placement::config::WorkloadPlacementConfig;
use workload_placement::domain::environment::LaunchEnvironment;
use workload_placement_sdk::{LaunchTarget, PlacementError, UserOptions};

const PLACEMENT: &str = r"
node_defaults:
  spawn_on:
    pool: general
  spec:
    cpu: 2.0
    memory: 4G
    volumes:
      - name: home
        nfs:
          server: nfs.example.org
          path: /home
    volume_mounts:
      - name: home
        mountPath: /home
node_selectors:
  - filter:
      gnames: [lsst]
    spawn_on:
      pool: lsst
    spec:
      memory: 16G
      env:
        DATASET: lsst
  - filter:
      groups: [ocio]
    spawn_on:
      pool: ocio
";

const IMAGES: &str = r"
title: Recommended
updated: '2024-01-12'
images:
  - image: slaclab/lab:w_2024_01
    description: Weekly 2024_01
  - image: team/custom:v2
    description: Team image
";

fn setup(dir: &Path) -> WorkloadPlacementConfig {
    let placement_file = dir.join("node-selectors.yaml");
    std::fs::write(&placement_file, PLACEMENT).unwrap();
    let images_dir = dir.join("images.d");
    std::fs::create_dir(&images_dir).unwrap();
    std::fs::write(images_dir.join("10-recommended.yaml"), IMAGES).unwrap();

    WorkloadPlacementConfig {
        placement_file,
        images_dir,
        default_image: Some("slaclab/lab:latest".to_owned()),
        ..WorkloadPlacementConfig::default()
    }
}

fn environment() -> LaunchEnvironment {
    LaunchEnvironment::from_lookup(|name| match name {
        "OAUTH_CALLBACK_URL" => Some("https://lab.example.org/hub/oauth_callback".to_owned()),
        "HUB_SERVICE_HOST" => Some("10.0.0.7".to_owned()),
        "HUB_SERVICE_PORT_API" => Some("8081".to_owned()),
        "LAB_IDLE_TIMEOUT" => Some("3600".to_owned()),
        _ => None,
    })
    .unwrap()
}

fn facts(groups: &[(&str, &str)]) -> IdentityFacts {
    IdentityFacts::new(
        "alice",
        1001,
        GroupMembership::new("staff", "2000"),
        groups
            .iter()
            .map(|(name, gid)| GroupMembership::new(*name, *gid)),
        BTreeMap::new(),
    )
}

fn options(image: &str) -> UserOptions {
    UserOptions {
        kernel_image: Some(image.to_owned()),
    }
}

#[test]
fn pre_launch_populates_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let module = WorkloadPlacementModule::with_environment(&setup(dir.path()), environment()).unwrap();
    let hook = module.launch_hook();

    let mut target = LaunchTarget {
        environment: BTreeMap::from([("JUPYTERHUB_API_TOKEN".to_owned(), "secret".to_owned())]),
        ..LaunchTarget::default()
    };
    let spec = hook
        .pre_launch(
            &facts(&[("lsst", "3000")]),
            &options("slaclab/lab:w_2024_01"),
            &mut target,
        )
        .unwrap();

    assert_eq!(target.name.as_deref(), Some("lab-alice-w.2024.01"));
    assert_eq!(target.image.as_deref(), Some("slaclab/lab:w_2024_01"));
    assert_eq!(target.image_pull_policy.as_deref(), Some("Always"));
    assert_eq!(target.uid, Some(1001));
    assert_eq!(target.gid, Some(2000));
    assert_eq!(target.supplemental_gids, vec![2000, 3000]);
    assert_eq!(
        target.node_selector,
        BTreeMap::from([("pool".to_owned(), "lsst".to_owned())])
    );
    assert_eq!(target.mem_limit.as_deref(), Some("16G"));
    assert_eq!(target.volumes.len(), 1);
    assert_eq!(target.volume_mounts.len(), 1);
    assert_eq!(target.default_url.as_deref(), Some("/lab"));
    assert_eq!(target.start_timeout_secs, Some(600));

    let env = &target.environment;
    assert_eq!(env.get("JUPYTERHUB_API_TOKEN").map(String::as_str), Some("secret"));
    assert_eq!(env.get("DATASET").map(String::as_str), Some("lsst"));
    assert_eq!(env.get("JUPYTERLAB_IDLE_TIMEOUT").map(String::as_str), Some("3600"));
    assert_eq!(
        env.get("EXTERNAL_URL").map(String::as_str),
        Some("https://lab.example.org")
    );
    assert_eq!(
        env.get("JUPYTERHUB_API_URL").map(String::as_str),
        Some("http://10.0.0.7:8081/hub/api")
    );
    assert_eq!(env.get("EXTERNAL_UID").map(String::as_str), Some("1001"));
    assert_eq!(
        env.get("EXTERNAL_GROUPS").map(String::as_str),
        Some("staff:2000,lsst:3000")
    );
    assert_eq!(env, spec.env());
}

#[test]
fn unmatched_image_uses_node_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let module = WorkloadPlacementModule::with_environment(&setup(dir.path()), environment()).unwrap();

    let spec = module
        .client()
        .build_workload(&facts(&[]), &options("team/custom:v2"))
        .unwrap();

    assert_eq!(
        spec.node_selector(),
        &BTreeMap::from([("pool".to_owned(), "general".to_owned())])
    );
    assert_eq!(spec.name(), "custom-alice-v2");
    assert_eq!(spec.parts().mem_limit, "4G");
}

#[test]
fn first_listed_rule_wins_for_members_of_both_groups() {
    let dir = tempfile::tempdir().unwrap();
    let module = WorkloadPlacementModule::with_environment(&setup(dir.path()), environment()).unwrap();

    let spec = module
        .client()
        .select_policy(&facts(&[("ocio", "4000"), ("lsst", "3000")]), "slaclab/lab")
        .unwrap();

    assert_eq!(spec.matched_rule, Some(0));
    assert_eq!(spec.node_selector.get("pool").map(String::as_str), Some("lsst"));
}

#[test]
fn options_form_lists_catalog_images() {
    let dir = tempfile::tempdir().unwrap();
    let module = WorkloadPlacementModule::with_environment(&setup(dir.path()), environment()).unwrap();

    let form = module.client().options_form();
    assert!(form.starts_with("<h3>Recommended</h3><br/>\n"));
    assert!(form.contains("value=\"team/custom:v2\">Team image<br>\n"));
}

#[test]
fn non_numeric_primary_group_is_a_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let module = WorkloadPlacementModule::with_environment(&setup(dir.path()), environment()).unwrap();
    let facts = IdentityFacts::new(
        "alice",
        1001,
        GroupMembership::new("staff", "S-1-5-21"),
        Vec::new(),
        BTreeMap::new(),
    );

    let mut target = LaunchTarget::default();
    let err = module
        .launch_hook()
        .pre_launch(&facts, &UserOptions::default(), &mut target)
        .unwrap_err();

    assert!(matches!(err, PlacementError::NonNumericGroupId { .. }));
    assert_eq!(target, LaunchTarget::default());
}

#[test]
fn malformed_rule_fails_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = setup(dir.path());
    std::fs::write(
        &cfg.placement_file,
        "node_selectors:\n  - filter:\n      department: [physics]\n",
    )
    .unwrap();

    assert!(WorkloadPlacementModule::with_environment(&cfg, environment()).is_err());
}
