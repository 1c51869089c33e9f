//! Runtime types for the VIP manager.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Interval of the forced re-verification tick
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(10);

pub use leader::DEFAULT_RETRY_DELAY;

/// Longest prefix for the address family of `address`
pub fn max_prefix_len(address: IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Address this node claims while it is leader.
///
/// Built once at startup and shared read-only for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipConfig {
    /// Virtual IP address
    pub address: IpAddr,

    /// Prefix length of the virtual IP's network
    pub prefix_len: u8,

    /// Network interface carrying the virtual IP
    pub interface: String,

    /// Identifier of this node as written in the leader marker
    pub node_name: String,

    /// Coordination store key holding the leader marker
    pub key: String,
}

impl VipConfig {
    /// Address in `address/prefix` form, as listed by `ip addr show`
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_len)
    }

    /// Maximum prefix length for the address family
    pub fn max_prefix_len(&self) -> u8 {
        max_prefix_len(self.address)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix_len > self.max_prefix_len() {
            return Err(format!(
                "Prefix length {} is out of range for {}",
                self.prefix_len, self.address
            ));
        }

        if self.interface.is_empty() {
            return Err("Interface name is required".to_string());
        }

        if self.node_name.is_empty() {
            return Err("Node name is required".to_string());
        }

        if self.key.is_empty() {
            return Err("Leader key is required".to_string());
        }

        Ok(())
    }
}

/// Timing for the coordinator and watcher
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Forced re-verification interval
    pub recheck_interval: Duration,

    /// Fixed delay between coordination store retries
    pub retry_delay: Duration,

    /// Buffer of the leadership channel
    pub state_channel_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            state_channel_size: 1,
        }
    }
}

/// Duplicate address probe settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Probe before claiming the address.
    ///
    /// Off by default: a former leader that lost the store but still holds
    /// the address answers the probe and would keep the new leader from
    /// claiming it.
    pub enabled: bool,

    /// Number of probes to send
    pub count: u32,

    /// Overall probe deadline
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 2,
            timeout: Duration::from_secs(3),
        }
    }
}

/// External commands used to inspect and change addresses
#[derive(Debug, Clone)]
pub struct CommandPaths {
    /// iproute2 `ip` binary
    pub ip: PathBuf,

    /// iputils `arping` binary
    pub arping: PathBuf,
}

impl Default for CommandPaths {
    fn default() -> Self {
        Self {
            ip: PathBuf::from("ip"),
            arping: PathBuf::from("arping"),
        }
    }
}
