//! Configuration loading and validation for vip-manager

use crate::types::{CommandPaths, ManagerConfig, ProbeConfig, VipConfig, max_prefix_len};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in search paths")]
    FileNotFound,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub vip: VipSettings,

    pub node: NodeSettings,

    pub consul: ConsulSettings,

    #[serde(default)]
    pub manager: ManagerSettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.vip.validate()?;
        self.node.validate()?;
        self.consul.validate()?;
        self.manager.validate()?;
        self.probe.validate()?;
        Ok(())
    }
}

/// Virtual IP settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_prefix_len"))]
pub struct VipSettings {
    pub address: IpAddr,

    pub prefix_len: u8,

    // IFNAMSIZ is 16 including the terminator
    #[validate(length(min = 1, max = 15))]
    pub interface: String,
}

/// Identity of this node
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeSettings {
    #[validate(length(min = 1))]
    pub name: String,
}

/// Consul connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsulSettings {
    #[serde(default = "default_endpoint")]
    #[validate(custom = "validate_endpoint")]
    pub endpoint: String,

    #[validate(length(min = 1))]
    pub key: String,

    #[serde(default = "default_wait_time", with = "humantime_serde")]
    #[validate(custom = "validate_wait_time")]
    pub wait_time: Duration,

    #[serde(default)]
    pub token: Option<String>,
}

/// Coordinator timing settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ManagerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_recheck_interval")]
    pub recheck_interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_retry_delay")]
    pub retry_delay: Duration,

    #[validate(range(min = 1, max = 1000))]
    pub state_channel_size: usize,
}

/// Duplicate address probe settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeSettings {
    /// Run `arping -D` before claiming. A stale holder that lost the store
    /// blocks the claim for as long as it keeps the address.
    pub enabled: bool,

    #[validate(range(min = 1, max = 10))]
    pub count: u32,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub timeout: Duration,
}

/// External command locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub ip: PathBuf,
    pub arping: PathBuf,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,

    #[serde(default)]
    pub format: LogFormat,
}

// Default implementations

fn default_endpoint() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_wait_time() -> Duration {
    leader::consul::DEFAULT_WAIT_TIME
}

impl Default for ManagerSettings {
    fn default() -> Self {
        let defaults = ManagerConfig::default();
        Self {
            recheck_interval: defaults.recheck_interval,
            retry_delay: defaults.retry_delay,
            state_channel_size: defaults.state_channel_size,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        let defaults = ProbeConfig::default();
        Self {
            enabled: defaults.enabled,
            count: defaults.count,
            timeout: defaults.timeout,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        let defaults = CommandPaths::default();
        Self {
            ip: defaults.ip,
            arping: defaults.arping,
        }
    }
}

// Custom validators

fn validate_prefix_len(vip: &VipSettings) -> Result<(), ValidationError> {
    if vip.prefix_len > max_prefix_len(vip.address) {
        return Err(ValidationError::new("prefix_len_out_of_range"));
    }
    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    leader::parse_endpoint(endpoint)
        .map(|_| ())
        .map_err(|_| ValidationError::new("endpoint_invalid"))
}

fn validate_duration(
    value: &Duration,
    min: Duration,
    max: Duration,
    code: &'static str,
) -> Result<(), ValidationError> {
    if *value < min || *value > max {
        return Err(ValidationError::new(code));
    }
    Ok(())
}

fn validate_wait_time(wait: &Duration) -> Result<(), ValidationError> {
    validate_duration(wait, Duration::from_millis(100), Duration::from_secs(600), "wait_time_out_of_range")
}

fn validate_recheck_interval(interval: &Duration) -> Result<(), ValidationError> {
    validate_duration(
        interval,
        Duration::from_millis(100),
        Duration::from_secs(3600),
        "recheck_interval_out_of_range",
    )
}

fn validate_retry_delay(delay: &Duration) -> Result<(), ValidationError> {
    validate_duration(delay, Duration::from_millis(10), Duration::from_secs(60), "retry_delay_out_of_range")
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    validate_duration(timeout, Duration::from_millis(100), Duration::from_secs(30), "probe_timeout_out_of_range")
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `path`, or from the default search paths
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            tracing::info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(path);
        }

        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => Err(ConfigError::FileNotFound),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/vip-manager/vip-manager.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./vip-manager.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/vip-manager/vip-manager.yaml"))
    }

    /// Address, interface and identity to manage
    pub fn to_vip_config(&self) -> VipConfig {
        VipConfig {
            address: self.vip.address,
            prefix_len: self.vip.prefix_len,
            interface: self.vip.interface.clone(),
            node_name: self.node.name.clone(),
            key: self.consul.key.clone(),
        }
    }

    pub fn to_manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            recheck_interval: self.manager.recheck_interval,
            retry_delay: self.manager.retry_delay,
            state_channel_size: self.manager.state_channel_size,
        }
    }

    pub fn to_probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            enabled: self.probe.enabled,
            count: self.probe.count,
            timeout: self.probe.timeout,
        }
    }

    pub fn to_command_paths(&self) -> CommandPaths {
        CommandPaths {
            ip: self.commands.ip.clone(),
            arping: self.commands.arping.clone(),
        }
    }

    /// Log level, defaulting to info
    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }
}
