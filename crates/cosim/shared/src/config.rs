//! Configuration for co-simulation clients and hosts, loadable from TOML.
//!
//! Every section has defaults, so a config file only needs the values it changes:
//!
//! ```toml
//! [client]
//! address = { address = "10.0.0.4", port = 9011 }
//! request_timeout_ms = 2000
//!
//! [host]
//! service_name = "remoteSkeletonAccess"
//! register_address = { address = "10.0.0.1", port = 9009 }
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    protocol::DEFAULT_MAX_FRAME_SIZE,
    service::{ServiceAddress, SERVICE_LANGUAGE},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Connection settings for RPC proxies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub address: ServiceAddress,
    pub connect_timeout_ms: u64,
    /// Per-request timeout; `None` blocks until the remote side answers.
    pub request_timeout_ms: Option<u64>,
    pub max_frame_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: ServiceAddress::localhost(9011),
            connect_timeout_ms: 5_000,
            request_timeout_ms: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn for_address(address: ServiceAddress) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Settings for a hosted service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub listen: ServiceAddress,
    /// Discovery registry to publish the service to, if any.
    pub register_address: Option<ServiceAddress>,
    pub service_name: String,
    pub language: String,
    pub max_frame_bytes: usize,
    pub shutdown_timeout_ms: u64,
    pub worker_threads: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: ServiceAddress::localhost(0),
            register_address: None,
            service_name: "cosimService".into(),
            language: SERVICE_LANGUAGE.into(),
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            shutdown_timeout_ms: 1_000,
            worker_threads: 2,
        }
    }
}

impl HostConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    pub enabled: bool,
    /// Oldest samples are dropped beyond this many.
    pub max_samples: usize,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_samples: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoSimConfig {
    pub client: ClientConfig,
    pub host: HostConfig,
    pub profiling: ProfilingConfig,
}

impl CoSimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CoSimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.max_frame_bytes == 0 || self.host.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid("max_frame_bytes must be positive".into()));
        }
        if self.host.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be positive".into()));
        }
        if self.host.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoSimConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoSimConfig::default());
        assert_eq!(config.client.request_timeout(), None);
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = CoSimConfig::from_toml_str(
            r#"
            [client]
            address = { address = "10.0.0.4", port = 9011 }
            request_timeout_ms = 2000

            [host]
            service_name = "remoteSkeletonAccess"
            register_address = { address = "10.0.0.1", port = 9009 }
            "#,
        )
        .unwrap();

        assert_eq!(config.client.address, ServiceAddress::new("10.0.0.4", 9011));
        assert_eq!(config.client.request_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.client.connect_timeout_ms, 5_000);
        assert_eq!(config.host.service_name, "remoteSkeletonAccess");
        assert_eq!(
            config.host.register_address,
            Some(ServiceAddress::new("10.0.0.1", 9009))
        );
        assert_eq!(config.host.language, SERVICE_LANGUAGE);
    }

    #[test]
    fn rejects_zero_worker_threads() {
        let err = CoSimConfig::from_toml_str("[host]\nworker_threads = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[profiling]\nenabled = false").unwrap();

        let config = CoSimConfig::load(file.path()).unwrap();
        assert!(!config.profiling.enabled);
        assert_eq!(config.profiling.max_samples, 10_000);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CoSimConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
