use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::IpAddr;
use std::path::Path;

mod error;
pub mod watcher;

use crate::gate::{constraint, realm};
pub use error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub server: ServerConfig,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub realm: HashMap<String, realm::Config>, // hashmap of realm name <-> users
    #[serde(default)]
    pub application: HashMap<String, ApplicationConfig>, // hashmap of application name <-> descriptor
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    #[serde(default)]
    pub metrics_path: Option<String>,
}

impl ServerConfig {
    fn default_port() -> u16 {
        8000
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "GlobalConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "GlobalConfig::default_authentication_timeout")]
    pub authentication_timeout: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            max_concurrent_requests: GlobalConfig::default_max_concurrent_requests(),
            authentication_timeout: GlobalConfig::default_authentication_timeout(),
        }
    }
}

impl GlobalConfig {
    fn default_max_concurrent_requests() -> usize {
        4
    }

    fn default_authentication_timeout() -> u64 {
        10
    }
}

/// Deployment descriptor of an application mounted under `context_path`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub context_path: String,
    #[serde(default)]
    pub constraint: Vec<constraint::Config>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

fn normalize_context_path(name: &str, context_path: &str) -> Result<String, Error> {
    let trimmed = context_path.trim_end_matches('/');
    if !trimmed.is_empty() && !trimmed.starts_with('/') {
        return Err(Error::Application(format!(
            "context_path of application '{name}' must start with '/': '{context_path}'"
        )));
    }
    Ok(trimmed.to_string())
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let mut config: Configuration = toml::from_str(slice)?;

        let mut context_paths = HashSet::new();
        for (name, application) in &mut config.application {
            application.context_path = normalize_context_path(name, &application.context_path)?;
            if !context_paths.insert(application.context_path.clone()) {
                return Err(Error::Application(format!(
                    "context_path '{}' is used by more than one application",
                    application.context_path
                )));
            }
        }

        if let Some(metrics_path) = &config.server.metrics_path {
            if !metrics_path.starts_with('/') {
                return Err(Error::Application(format!(
                    "metrics_path must start with '/': '{metrics_path}'"
                )));
            }
        }

        Ok(config)
    }
}
