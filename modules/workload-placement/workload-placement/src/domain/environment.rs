//! Launch environment defaults read from the hub's process environment.

use std::collections::BTreeMap;

use super::error::DomainError;

pub const DEFAULT_MEM_LIMIT: &str = "2G";
pub const DEFAULT_CPU_LIMIT: f64 = 1.0;
pub const DEFAULT_MEM_GUARANTEE: &str = "64K";
pub const DEFAULT_CPU_GUARANTEE: f64 = 0.02;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 43_200;

const OAUTH_CALLBACK_SUFFIX: &str = "/hub/oauth_callback";

/// Environment-derived launch defaults. Unset and empty variables both
/// take the default.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchEnvironment {
    pub mem_limit: String,
    pub cpu_limit: f64,
    pub mem_guarantee: String,
    pub cpu_guarantee: f64,
    /// `0` disables the idle timeout.
    pub idle_timeout_secs: u64,
    pub default_image: Option<String>,
    /// Externally reachable base URL of the hub.
    pub external_url: Option<String>,
    /// Hub API URL through the in-cluster service.
    pub hub_api_url: Option<String>,
    pub google_oauth_client_id: Option<String>,
}

impl Default for LaunchEnvironment {
    fn default() -> Self {
        Self {
            mem_limit: DEFAULT_MEM_LIMIT.to_owned(),
            cpu_limit: DEFAULT_CPU_LIMIT,
            mem_guarantee: DEFAULT_MEM_GUARANTEE.to_owned(),
            cpu_guarantee: DEFAULT_CPU_GUARANTEE,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            default_image: None,
            external_url: None,
            hub_api_url: None,
            google_oauth_client_id: None,
        }
    }
}

impl LaunchEnvironment {
    /// Read the launch defaults through `lookup`.
    ///
    /// # Errors
    ///
    /// `InvalidEnvironment` if a numeric variable does not parse or is
    /// negative.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let external_url = get("OAUTH_CALLBACK_URL").and_then(|callback| {
            callback
                .strip_suffix(OAUTH_CALLBACK_SUFFIX)
                .map(str::to_owned)
        });
        let hub_api_url = match (get("HUB_SERVICE_HOST"), get("HUB_SERVICE_PORT_API")) {
            (Some(host), Some(port)) => Some(format!("http://{host}:{port}/hub/api")),
            _ => None,
        };

        Ok(Self {
            mem_limit: get("LAB_MEM_LIMIT").unwrap_or(defaults.mem_limit),
            cpu_limit: parse_cores("LAB_CPU_LIMIT", get("LAB_CPU_LIMIT"), defaults.cpu_limit)?,
            mem_guarantee: get("LAB_MEM_GUARANTEE").unwrap_or(defaults.mem_guarantee),
            cpu_guarantee: parse_cores(
                "LAB_CPU_GUARANTEE",
                get("LAB_CPU_GUARANTEE"),
                defaults.cpu_guarantee,
            )?,
            idle_timeout_secs: parse_secs(
                "LAB_IDLE_TIMEOUT",
                get("LAB_IDLE_TIMEOUT"),
                defaults.idle_timeout_secs,
            )?,
            default_image: get("LAB_IMAGE"),
            external_url,
            hub_api_url,
            google_oauth_client_id: get("JUPYTERLAB_GOOGLE_OAUTH_CLIENTID"),
        })
    }

    /// Read the launch defaults from the process environment.
    ///
    /// # Errors
    ///
    /// As [`Self::from_lookup`].
    pub fn from_process_env() -> Result<Self, DomainError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Variables computed from the launch environment. Lowest precedence
    /// in the final workload environment.
    #[must_use]
    pub fn computed_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if self.idle_timeout_secs > 0 {
            env.insert(
                "JUPYTERLAB_IDLE_TIMEOUT".to_owned(),
                self.idle_timeout_secs.to_string(),
            );
        }
        if let Some(url) = &self.external_url {
            env.insert("EXTERNAL_URL".to_owned(), url.clone());
        }
        if let Some(url) = &self.hub_api_url {
            env.insert("JUPYTERHUB_API_URL".to_owned(), url.clone());
        }
        if let Some(client_id) = &self.google_oauth_client_id {
            env.insert(
                "JUPYTERLAB_GOOGLE_OAUTH_CLIENTID".to_owned(),
                client_id.clone(),
            );
        }
        env
    }
}

fn parse_cores(variable: &str, raw: Option<String>, default: f64) -> Result<f64, DomainError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(cores) if cores.is_finite() && cores >= 0.0 => Ok(cores),
        Ok(_) => Err(invalid(variable, raw, "must be a non-negative number of cores")),
        Err(e) => Err(invalid(variable, raw, e.to_string())),
    }
}

fn parse_secs(variable: &str, raw: Option<String>, default: u64) -> Result<u64, DomainError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) => Ok(secs),
        Err(e) => Err(invalid(variable, raw, e.to_string())),
    }
}

fn invalid(variable: &str, value: String, reason: impl Into<String>) -> DomainError {
    DomainError::InvalidEnvironment {
        variable: variable.to_owned(),
        value,
        reason: reason.into(),
    }
}
