//! Inspection and mutation of the virtual IP on the local host.
//!
//! The production backend shells out to iproute2 for queries and changes
//! and to iputils `arping` for duplicate address detection.

use crate::types::{CommandPaths, ProbeConfig, VipConfig};
use async_trait::async_trait;
use common::{Error, Result};
use std::net::IpAddr;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// iproute2 exit status for "object exists" / "cannot assign" style errors
const IP_EXIT_STATE_CONFLICT: i32 = 2;

/// arping -D exit status when another host answered for the address
const ARPING_EXIT_DUPLICATE: i32 = 1;

/// Allowance for arping to exit after its own deadline
const PROBE_GRACE: Duration = Duration::from_millis(500);

/// Result of a successful address change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The change was made
    Applied,
    /// Nothing to do, the address was already in the requested state
    AlreadyInState,
}

/// Local address operations for one interface/address pair.
///
/// Changes are not safe to issue concurrently for the same pair; callers
/// must serialize them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AddressBackend: Send + Sync {
    /// Whether the interface currently carries the address
    async fn query(&self) -> Result<bool>;

    /// Add the address to the interface
    async fn configure(&self) -> Result<ChangeOutcome>;

    /// Remove the address from the interface
    async fn deconfigure(&self) -> Result<ChangeOutcome>;

    /// Whether another host already answers for the address.
    ///
    /// Inconclusive probes report `false`.
    async fn probe_duplicate(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Delete => "delete",
        }
    }

    /// Whether the address is present once the action has taken effect
    fn target_present(self) -> bool {
        matches!(self, Action::Add)
    }
}

/// Address backend driving iproute2 and arping
pub struct IpRoute2 {
    vip: Arc<VipConfig>,
    commands: CommandPaths,
    probe: ProbeConfig,
}

impl IpRoute2 {
    /// Create a new backend
    ///
    /// # Arguments
    /// * `vip` - Address and interface to manage
    /// * `commands` - Locations of `ip` and `arping`
    /// * `probe` - Duplicate address probe settings
    pub fn new(vip: Arc<VipConfig>, commands: CommandPaths, probe: ProbeConfig) -> Self {
        Self {
            vip,
            commands,
            probe,
        }
    }

    async fn run_ip(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.commands.ip)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                Error::address(format!(
                    "Failed to run {} {}: {}",
                    self.commands.ip.display(),
                    args.join(" "),
                    e
                ))
            })
    }

    async fn change(&self, action: Action) -> Result<ChangeOutcome> {
        let cidr = self.vip.cidr();
        let output = self
            .run_ip(&["addr", action.verb(), &cidr, "dev", &self.vip.interface])
            .await?;

        if output.status.success() {
            return Ok(ChangeOutcome::Applied);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if output.status.code() == Some(IP_EXIT_STATE_CONFLICT) {
            // Exit 2 also covers a missing device, so confirm by reading back.
            let present = self.query().await?;
            if present == action.target_present() {
                debug!(
                    action = action.verb(),
                    cidr = %cidr,
                    interface = %self.vip.interface,
                    "Address already in requested state"
                );
                return Ok(ChangeOutcome::AlreadyInState);
            }
        }

        Err(Error::address(format!(
            "ip addr {} {} dev {} failed ({}): {}",
            action.verb(),
            cidr,
            self.vip.interface,
            output.status,
            stderr
        )))
    }
}

#[async_trait]
impl AddressBackend for IpRoute2 {
    async fn query(&self) -> Result<bool> {
        let output = self.run_ip(&["addr", "show", &self.vip.interface]).await?;
        if !output.status.success() {
            return Err(Error::address(format!(
                "ip addr show {} failed ({}): {}",
                self.vip.interface,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(address_listed(
            &String::from_utf8_lossy(&output.stdout),
            &self.vip.cidr(),
        ))
    }

    async fn configure(&self) -> Result<ChangeOutcome> {
        info!(cidr = %self.vip.cidr(), interface = %self.vip.interface, "Configuring address");
        self.change(Action::Add).await
    }

    async fn deconfigure(&self) -> Result<ChangeOutcome> {
        info!(cidr = %self.vip.cidr(), interface = %self.vip.interface, "Removing address");
        self.change(Action::Delete).await
    }

    async fn probe_duplicate(&self) -> bool {
        if !self.probe.enabled {
            return false;
        }

        let IpAddr::V4(address) = self.vip.address else {
            debug!("Duplicate probe skipped for IPv6 address");
            return false;
        };

        let count = self.probe.count.to_string();
        let deadline = self.probe.timeout.as_secs().max(1).to_string();
        let address = address.to_string();
        let mut command = Command::new(&self.commands.arping);
        command
            .args(["-D", "-c", &count, "-q", "-w", &deadline])
            .args(["-I", &self.vip.interface, &address])
            .kill_on_drop(true);

        match timeout(self.probe.timeout + PROBE_GRACE, command.status()).await {
            Ok(Ok(status)) if status.code() == Some(ARPING_EXIT_DUPLICATE) => {
                warn!(address = %address, interface = %self.vip.interface, "Another host answers for the address");
                true
            }
            Ok(Ok(status)) => {
                debug!(address = %address, status = %status, "No duplicate address detected");
                false
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to run duplicate address probe, assuming no duplicate");
                false
            }
            Err(_) => {
                warn!(address = %address, "Duplicate address probe timed out, assuming no duplicate");
                false
            }
        }
    }
}

/// Whether an `ip addr show` listing carries exactly `cidr`.
pub fn address_listed(listing: &str, cidr: &str) -> bool {
    listing.lines().any(|line| {
        let mut fields = line.split_whitespace();
        matches!(fields.next(), Some("inet") | Some("inet6")) && fields.next() == Some(cidr)
    })
}
