//! Models for the workload placement module.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered placement rules with the defaults they override.
///
/// ```yaml
/// node_defaults:
///   spawn_on: { pool: general }
///   spec: { cpu: 1.0, memory: 2G }
/// node_selectors:
///   - filter: { groups: [lsst] }
///     spawn_on: { pool: lsst }
///     spec: { memory: 8G }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementDocument {
    pub node_defaults: NodeDefaults,
    /// Evaluated in declaration order; the first match wins.
    pub node_selectors: Vec<PlacementRule>,
}

/// Placement used when no rule matches, and the base every match overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeDefaults {
    pub spawn_on: BTreeMap<String, String>,
    pub spec: ResourceOverrides,
}

/// One placement rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementRule {
    pub filter: RuleFilter,
    /// Replaces the default node selector when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_on: Option<BTreeMap<String, String>>,
    pub spec: ResourceOverrides,
}

/// Rule filter. Every present attribute must intersect the request;
/// values within one attribute are alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleFilter {
    /// Group names. Also accepted as `gnames`.
    #[serde(alias = "gnames", skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeSet<String>>,

    /// Image names, short (`custom`) or full (`team/custom:v2`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<BTreeSet<String>>,

    /// Numeric user ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<BTreeSet<u32>>,
}

impl RuleFilter {
    /// A filter without attributes matches every request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_none() && self.images.is_none() && self.uid.is_none()
    }
}

/// Resource fields a rule or the defaults may set. Absent fields leave
/// the accumulated value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceOverrides {
    /// CPU limit in cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,

    /// Memory limit, e.g. `8G`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<Value>>,

    /// Extra environment; merged key by key. Non-string values are
    /// rendered as their YAML/JSON text.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_resource_limits: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_pod_config: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_container_config: Option<Map<String, Value>>,
}

impl ResourceOverrides {
    /// `env` with every value rendered as a string.
    #[must_use]
    pub fn rendered_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

/// Outcome of policy selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceSpec {
    pub node_selector: BTreeMap<String, String>,
    /// `None` leaves the launch default in place.
    pub cpu_limit: Option<f64>,
    /// `None` leaves the launch default in place.
    pub memory_limit: Option<String>,
    pub volumes: Vec<Value>,
    pub volume_mounts: Vec<Value>,
    pub env: BTreeMap<String, String>,
    pub extra_resource_limits: Map<String, Value>,
    pub extra_pod_config: Map<String, Value>,
    pub extra_container_config: Map<String, Value>,
    /// Index of the rule that matched, `None` for the defaults.
    pub matched_rule: Option<usize>,
}

/// Fields of a [`WorkloadSpec`], used to assemble one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadParts {
    pub name: String,
    pub image: String,
    pub image_pull_policy: String,
    pub run_as_uid: u32,
    pub fs_gid: u32,
    pub supplemental_gids: Vec<u32>,
    pub node_selector: BTreeMap<String, String>,
    pub cpu_limit: f64,
    pub cpu_guarantee: f64,
    pub mem_limit: String,
    pub mem_guarantee: String,
    pub volumes: Vec<Value>,
    pub volume_mounts: Vec<Value>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub default_url: String,
    pub start_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub extra_resource_limits: Map<String, Value>,
    pub extra_pod_config: Map<String, Value>,
    pub extra_container_config: Map<String, Value>,
}

/// Finished workload specification handed to the orchestration platform.
///
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkloadSpec(WorkloadParts);

impl From<WorkloadParts> for WorkloadSpec {
    fn from(parts: WorkloadParts) -> Self {
        Self(parts)
    }
}

impl WorkloadSpec {
    #[must_use]
    pub fn parts(&self) -> &WorkloadParts {
        &self.0
    }

    #[must_use]
    pub fn into_parts(self) -> WorkloadParts {
        self.0
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn image(&self) -> &str {
        &self.0.image
    }

    #[must_use]
    pub fn run_as_uid(&self) -> u32 {
        self.0.run_as_uid
    }

    #[must_use]
    pub fn fs_gid(&self) -> u32 {
        self.0.fs_gid
    }

    #[must_use]
    pub fn node_selector(&self) -> &BTreeMap<String, String> {
        &self.0.node_selector
    }

    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.0.env
    }

    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.0.labels
    }
}

/// Launch configuration owned by the hosting platform, filled in by
/// [`crate::LaunchHook::pre_launch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaunchTarget {
    pub name: Option<String>,
    pub image: Option<String>,
    pub image_pull_policy: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub supplemental_gids: Vec<u32>,
    /// Entries present before the hook runs are platform overrides.
    pub environment: BTreeMap<String, String>,
    pub node_selector: BTreeMap<String, String>,
    pub cpu_limit: Option<f64>,
    pub cpu_guarantee: Option<f64>,
    pub mem_limit: Option<String>,
    pub mem_guarantee: Option<String>,
    pub volumes: Vec<Value>,
    pub volume_mounts: Vec<Value>,
    pub labels: BTreeMap<String, String>,
    pub default_url: Option<String>,
    pub start_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub extra_resource_limits: Map<String, Value>,
    pub extra_pod_config: Map<String, Value>,
    pub extra_container_config: Map<String, Value>,
}

impl LaunchTarget {
    /// Overwrite every field with the values of `spec`.
    pub fn apply(&mut self, spec: &WorkloadSpec) {
        let parts = spec.parts().clone();
        self.name = Some(parts.name);
        self.image = Some(parts.image);
        self.image_pull_policy = Some(parts.image_pull_policy);
        self.uid = Some(parts.run_as_uid);
        self.gid = Some(parts.fs_gid);
        self.supplemental_gids = parts.supplemental_gids;
        self.environment = parts.env;
        self.node_selector = parts.node_selector;
        self.cpu_limit = Some(parts.cpu_limit);
        self.cpu_guarantee = Some(parts.cpu_guarantee);
        self.mem_limit = Some(parts.mem_limit);
        self.mem_guarantee = Some(parts.mem_guarantee);
        self.volumes = parts.volumes;
        self.volume_mounts = parts.volume_mounts;
        self.labels = parts.labels;
        self.default_url = Some(parts.default_url);
        self.start_timeout_secs = Some(parts.start_timeout_secs);
        self.http_timeout_secs = Some(parts.http_timeout_secs);
        self.extra_resource_limits = parts.extra_resource_limits;
        self.extra_pod_config = parts.extra_pod_config;
        self.extra_container_config = parts.extra_container_config;
    }
}

/// Options the user picked on the launch form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOptions {
    pub kernel_image: Option<String>,
}

/// One catalog file: an optional heading and its images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    pub title: Option<String>,
    pub updated: Option<String>,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub image: String,
    #[serde(default)]
    pub description: String,
}

/// Images users may choose from, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageCatalog {
    sections: Vec<ImageSection>,
}

impl ImageCatalog {
    #[must_use]
    pub fn new(sections: Vec<ImageSection>) -> Self {
        Self { sections }
    }

    #[must_use]
    pub fn sections(&self) -> &[ImageSection] {
        &self.sections
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageEntry> {
        self.sections.iter().flat_map(|s| s.images.iter())
    }

    #[must_use]
    pub fn contains(&self, image: &str) -> bool {
        self.images().any(|entry| entry.image == image)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images().next().is_none()
    }
}
