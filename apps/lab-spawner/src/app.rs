//! Module wiring for the binary.

use anyhow::Context;
use directory_authn::DirectoryAuthnModule;
use workload_placement::WorkloadPlacementModule;

use crate::config::AppConfig;
use crate::hooks::{LoginHook, SpawnHook};

/// Both platform callbacks, built from one configuration.
pub struct App {
    pub login: LoginHook,
    pub spawn: SpawnHook,
}

impl App {
    /// # Errors
    ///
    /// Fails if either module rejects its configuration.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let authn = DirectoryAuthnModule::from_config(&cfg.directory)
            .context("failed to initialize directory authenticator")?;
        let placement = WorkloadPlacementModule::from_config(&cfg.placement)
            .context("failed to initialize workload placement")?;
        Ok(Self::new(&authn, &placement))
    }

    #[must_use]
    pub fn new(authn: &DirectoryAuthnModule, placement: &WorkloadPlacementModule) -> Self {
        Self {
            login: LoginHook::new(authn.service()),
            spawn: SpawnHook::new(placement.client(), placement.launch_hook()),
        }
    }
}
