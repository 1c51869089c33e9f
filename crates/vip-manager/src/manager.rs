//! Top-level wiring: watcher -> coordinator -> reconciler.

use crate::address::{AddressBackend, IpRoute2};
use crate::config::Config;
use crate::coordinator::StateCoordinator;
use crate::reconciler::ReconcileStats;
use crate::types::{ManagerConfig, VipConfig};
use common::{Error, Result};
use leader::{ConsulStore, LeaderStore, LeadershipWatcher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// VIP manager for one address
pub struct VipManager {
    vip: Arc<VipConfig>,
    settings: ManagerConfig,
    store: Arc<dyn LeaderStore>,
    backend: Arc<dyn AddressBackend>,
}

impl VipManager {
    /// Build a manager backed by Consul and iproute2
    pub fn new(config: &Config) -> Result<Self> {
        let vip = Arc::new(config.to_vip_config());
        vip.validate().map_err(Error::config)?;

        let store = ConsulStore::new(
            &config.consul.endpoint,
            config.consul.wait_time,
            config.consul.token.clone(),
        )?;
        let backend = IpRoute2::new(vip.clone(), config.to_command_paths(), config.to_probe_config());

        Ok(Self::with_parts(
            vip,
            config.to_manager_config(),
            Arc::new(store),
            Arc::new(backend),
        ))
    }

    /// Build a manager from explicit parts
    pub fn with_parts(
        vip: Arc<VipConfig>,
        settings: ManagerConfig,
        store: Arc<dyn LeaderStore>,
        backend: Arc<dyn AddressBackend>,
    ) -> Self {
        Self {
            vip,
            settings,
            store,
            backend,
        }
    }

    /// Run until cancelled. Returns once the address has been released.
    pub async fn run(self, cancel: CancellationToken) -> ReconcileStats {
        info!(
            cidr = %self.vip.cidr(),
            interface = %self.vip.interface,
            node = %self.vip.node_name,
            key = %self.vip.key,
            store = self.store.name(),
            "Starting VIP manager"
        );

        if !interface_exists(&self.vip.interface) {
            warn!(interface = %self.vip.interface, "Interface does not exist yet, will keep retrying");
        }

        let (states_tx, states_rx) = mpsc::channel(self.settings.state_channel_size);

        let watcher = LeadershipWatcher::new(
            self.store.clone(),
            self.vip.key.clone(),
            self.vip.node_name.clone(),
        )
        .with_retry_delay(self.settings.retry_delay);
        let watcher_handle = tokio::spawn(watcher.run(cancel.clone(), states_tx));

        let coordinator = StateCoordinator::new(self.settings.recheck_interval);
        let stats = coordinator
            .sync_states(states_rx, self.backend.clone(), cancel)
            .await;

        match watcher_handle.await {
            Ok(Err(e)) if e.is_cancelled() => debug!("Leadership watcher cancelled"),
            Ok(Err(e)) => warn!(error = %e, "Leadership watcher stopped"),
            Ok(Ok(())) => {}
            Err(e) => error!(error = %e, "Leadership watcher task failed"),
        }

        info!(cidr = %self.vip.cidr(), "VIP manager stopped");
        stats
    }
}

fn interface_exists(name: &str) -> bool {
    nix::net::if_::if_nametoindex(name).is_ok()
}
