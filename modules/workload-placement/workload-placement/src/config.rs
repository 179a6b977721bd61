//! Configuration for the workload placement module.

use std::path::PathBuf;

use serde::Deserialize;
use workload_placement_sdk::PlacementDocument;

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadPlacementConfig {
    /// YAML placement document with `node_defaults` and `node_selectors`.
    pub placement_file: PathBuf,

    /// Inline placement document; takes precedence over `placement_file`.
    pub placement: Option<PlacementDocument>,

    /// Directory of `*.yaml` image catalog files.
    pub images_dir: PathBuf,

    /// Image launched when the user picks none. Falls back to `LAB_IMAGE`.
    pub default_image: Option<String>,

    pub default_url: String,

    pub image_pull_policy: String,

    pub start_timeout_secs: u64,

    pub http_timeout_secs: u64,
}

impl Default for WorkloadPlacementConfig {
    fn default() -> Self {
        Self {
            placement_file: PathBuf::from("/opt/jupyterhub/config/node-selectors.yaml"),
            placement: None,
            images_dir: PathBuf::from("/opt/jupyterhub/config/images.d"),
            default_image: None,
            default_url: "/lab".to_owned(),
            image_pull_policy: "Always".to_owned(),
            start_timeout_secs: 600,
            http_timeout_secs: 600,
        }
    }
}
