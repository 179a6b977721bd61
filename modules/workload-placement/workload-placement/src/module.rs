//! Workload placement module wiring.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use workload_placement_sdk::{LaunchHook, WorkloadPlacementClient};

use crate::config::WorkloadPlacementConfig;
use crate::domain::catalog::load_catalog;
use crate::domain::document::load_document;
use crate::domain::environment::LaunchEnvironment;
use crate::domain::workload::{WorkloadBuilder, WorkloadSettings};
use crate::domain::{Service, WorkloadPlacementLocalClient};

/// Workload placement module.
///
/// Loads the placement document and the image catalog once; the service
/// is shared read-only by every launch.
pub struct WorkloadPlacementModule {
    service: Arc<Service>,
}

impl WorkloadPlacementModule {
    /// Build the module, reading launch defaults from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Fails on a malformed launch environment, an unreadable or invalid
    /// placement document, or an invalid default image.
    pub fn from_config(cfg: &WorkloadPlacementConfig) -> anyhow::Result<Self> {
        let environment = LaunchEnvironment::from_process_env()
            .context("invalid launch environment")?;
        Self::with_environment(cfg, environment)
    }

    /// Build the module over explicit launch defaults.
    ///
    /// # Errors
    ///
    /// As [`Self::from_config`], minus the environment parsing.
    pub fn with_environment(
        cfg: &WorkloadPlacementConfig,
        environment: LaunchEnvironment,
    ) -> anyhow::Result<Self> {
        let document = match &cfg.placement {
            Some(inline) => inline.clone(),
            None => load_document(&cfg.placement_file).with_context(|| {
                format!(
                    "failed to load placement document {}",
                    cfg.placement_file.display()
                )
            })?,
        };
        let catalog = load_catalog(&cfg.images_dir).context("failed to load image catalog")?;
        let default_image = cfg
            .default_image
            .clone()
            .or_else(|| environment.default_image.clone());

        let settings = WorkloadSettings {
            default_url: cfg.default_url.clone(),
            image_pull_policy: cfg.image_pull_policy.clone(),
            start_timeout_secs: cfg.start_timeout_secs,
            http_timeout_secs: cfg.http_timeout_secs,
        };
        let rules = document.node_selectors.len();
        let images = catalog.images().count();
        let service = Service::new(
            document,
            catalog,
            default_image,
            WorkloadBuilder::new(settings, environment),
        )
        .context("invalid workload placement configuration")?;

        info!(rules, images, "Workload placement initialized");
        Ok(Self {
            service: Arc::new(service),
        })
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn WorkloadPlacementClient> {
        Arc::new(WorkloadPlacementLocalClient::new(self.service()))
    }

    #[must_use]
    pub fn launch_hook(&self) -> Arc<dyn LaunchHook> {
        Arc::new(WorkloadPlacementLocalClient::new(self.service()))
    }
}
