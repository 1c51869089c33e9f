//! Leadership change watcher.
//!
//! Long-polls the leader marker and turns each observed change into an
//! "am I leader" boolean on the output channel.

use crate::store::{LeaderStore, QueryOptions};
use common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay before retrying after a store fault or a missing marker
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Watches the leader marker for one node
pub struct LeadershipWatcher {
    store: Arc<dyn LeaderStore>,
    key: String,
    node_name: String,
    retry_delay: Duration,
}

impl LeadershipWatcher {
    /// Create a new watcher
    ///
    /// # Arguments
    /// * `store` - Coordination store backend
    /// * `key` - Key holding the leader marker
    /// * `node_name` - Identifier of this node
    pub fn new(store: Arc<dyn LeaderStore>, key: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            node_name: node_name.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the fixed retry delay
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Run until cancelled, sending a boolean whenever leadership flips.
    ///
    /// Store faults and a missing marker are retried forever after the retry
    /// delay without advancing the wait index. A marker rewrite that leaves
    /// the leadership answer unchanged is not re-sent. Returns
    /// `Error::Cancelled` once `cancel` fires, or `Error::Other` if the
    /// receiver has gone away.
    pub async fn run(self, cancel: CancellationToken, out: mpsc::Sender<bool>) -> Result<()> {
        info!(
            store = self.store.name(),
            key = %self.key,
            node = %self.node_name,
            "Leadership watcher started"
        );

        let mut options = QueryOptions {
            require_consistent: true,
            wait_index: 0,
        };
        let mut last_version: Option<u64> = None;
        let mut last_sent: Option<bool> = None;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.store.get(&self.key, &options) => result,
            };

            let marker = match result {
                Ok(Some(marker)) => marker,
                Ok(None) => {
                    warn!(key = %self.key, "Cannot get leader marker, will try again");
                    if self.backoff(&cancel).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(store = self.store.name(), error = %e, "Coordination store error");
                    if self.backoff(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            match last_version {
                // Wait window elapsed without a change.
                Some(version) if marker.version == version => continue,
                Some(version) if marker.version < version => {
                    debug!(
                        last_index = version,
                        index = marker.version,
                        "Leader marker index went backwards, resetting"
                    );
                }
                _ => {}
            }

            last_version = Some(marker.version);
            // Index 0 means "do not block"; never fall back to it once a marker was seen.
            options.wait_index = next_wait_index(marker.version);

            let is_leader = marker.names(&self.node_name);
            if last_sent == Some(is_leader) {
                debug!(leader = %marker.value, index = marker.version, "Leader marker rewritten, leadership unchanged");
                continue;
            }
            debug!(leader = %marker.value, index = marker.version, is_leader, "Leadership changed");

            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = out.send(is_leader) => {
                    if sent.is_err() {
                        warn!("Leadership receiver closed, stopping watcher");
                        return Err(Error::other("leadership channel closed"));
                    }
                    last_sent = Some(is_leader);
                }
            }
        }

        info!("Leadership watcher stopped");
        Err(Error::Cancelled)
    }

    /// Sleep for the retry delay. Returns true if cancelled meanwhile.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = sleep(self.retry_delay) => false,
        }
    }
}

/// Wait index for the next blocking read after observing `version`
fn next_wait_index(version: u64) -> u64 {
    version.max(1)
}
