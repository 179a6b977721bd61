//! Workload spec builder.

use std::collections::BTreeMap;

use directory_authn_sdk::IdentityFacts;
use workload_placement_sdk::{ResourceSpec, WorkloadParts, WorkloadSpec};

use super::environment::LaunchEnvironment;
use super::error::DomainError;
use super::image::{ImageRef, escape_username};

/// Variables carrying the session identity into the workload. They are
/// set last and cannot be overridden.
pub const RESERVED_ENV: [&str; 2] = ["EXTERNAL_UID", "EXTERNAL_GROUPS"];

/// Static launch settings from the module configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSettings {
    pub default_url: String,
    pub image_pull_policy: String,
    pub start_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

/// Assembles finished workload specs from identity facts and a selected
/// resource spec.
#[derive(Debug, Clone)]
pub struct WorkloadBuilder {
    settings: WorkloadSettings,
    environment: LaunchEnvironment,
}

impl WorkloadBuilder {
    #[must_use]
    pub fn new(settings: WorkloadSettings, environment: LaunchEnvironment) -> Self {
        Self {
            settings,
            environment,
        }
    }

    #[must_use]
    pub fn environment(&self) -> &LaunchEnvironment {
        &self.environment
    }

    /// Build the workload for `facts` running `image` under `policy`.
    ///
    /// Environment precedence, lowest first: computed launch variables,
    /// the policy's `env`, `platform_env`, then the reserved identity
    /// variables.
    ///
    /// # Errors
    ///
    /// `NonNumericGroupId` if the primary group id cannot be used as the
    /// filesystem group.
    pub fn build(
        &self,
        facts: &IdentityFacts,
        image: &ImageRef,
        policy: ResourceSpec,
        platform_env: &BTreeMap<String, String>,
    ) -> Result<WorkloadSpec, DomainError> {
        let primary = facts.primary_group_id();
        let fs_gid = primary
            .numeric()
            .ok_or_else(|| DomainError::NonNumericGroupId {
                gid: primary.as_str().to_owned(),
            })?;
        let username = facts.canonical_username();

        let mut env = self.environment.computed_env();
        env.extend(policy.env);
        env.extend(
            platform_env
                .iter()
                .filter(|(name, _)| !RESERVED_ENV.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        env.insert("EXTERNAL_UID".to_owned(), facts.uid().to_string());
        env.insert("EXTERNAL_GROUPS".to_owned(), facts.group_tuples().join(","));

        let parts = WorkloadParts {
            name: image.pod_name(username),
            image: image.reference().to_owned(),
            image_pull_policy: self.settings.image_pull_policy.clone(),
            run_as_uid: facts.uid(),
            fs_gid,
            supplemental_gids: facts.numeric_group_ids(),
            node_selector: policy.node_selector,
            cpu_limit: policy.cpu_limit.unwrap_or(self.environment.cpu_limit),
            cpu_guarantee: self.environment.cpu_guarantee,
            mem_limit: policy
                .memory_limit
                .unwrap_or_else(|| self.environment.mem_limit.clone()),
            mem_guarantee: self.environment.mem_guarantee.clone(),
            volumes: policy.volumes,
            volume_mounts: policy.volume_mounts,
            env,
            labels: labels(username),
            default_url: self.settings.default_url.clone(),
            start_timeout_secs: self.settings.start_timeout_secs,
            http_timeout_secs: self.settings.http_timeout_secs,
            extra_resource_limits: policy.extra_resource_limits,
            extra_pod_config: policy.extra_pod_config,
            extra_container_config: policy.extra_container_config,
        };
        Ok(parts.into())
    }
}

fn labels(username: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("heritage".to_owned(), "jupyterhub".to_owned()),
        ("component".to_owned(), "singleuser-server".to_owned()),
        ("app".to_owned(), "jupyterhub".to_owned()),
        (
            "hub.jupyter.org/username".to_owned(),
            escape_username(username),
        ),
    ])
}
