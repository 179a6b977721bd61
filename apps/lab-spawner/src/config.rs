//! Application configuration: one YAML file plus `LAB_SPAWNER_*`
//! environment overrides.

use std::path::Path;

use anyhow::{Context, bail};
use directory_authn::config::DirectoryAuthnConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use workload_placement::config::WorkloadPlacementConfig;

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `LAB_SPAWNER_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "LAB_SPAWNER_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub directory: DirectoryAuthnConfig,
    pub placement: WorkloadPlacementConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Load the configuration from `path` (if any) and the environment.
    ///
    /// # Errors
    ///
    /// Fails if `path` does not exist or the merged configuration does not
    /// deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file {} not found", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use directory_authn::config::DirectoryBackend;

    use super::*;

    #[test]
    fn yaml_file_populates_every_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab-spawner.yaml");
        std::fs::write(
            &path,
            r"
logging:
  level: debug
  format: json
directory:
  backend: static
  bind_dn_templates:
    - uid={username},ou=People,dc=example,dc=org
placement:
  default_image: slaclab/lab:latest
",
        )
        .unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.directory.backend, DirectoryBackend::Static);
        assert_eq!(cfg.directory.bind_dn_templates.len(), 1);
        assert_eq!(cfg.placement.default_image.as_deref(), Some("slaclab/lab:latest"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/lab-spawner.yaml"))).is_err());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab-spawner.yaml");
        std::fs::write(&path, "spawner:\n  debug: true\n").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
