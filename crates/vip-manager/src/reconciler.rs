//! Convergence loop for the virtual IP.
//!
//! Compares the live address state with the desired state and issues
//! configure/deconfigure calls until they agree, then sleeps until the
//! coordinator wakes it. Only one loop may run per interface/address pair.

use crate::address::{AddressBackend, ChangeOutcome};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters collected over a reconciler's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Loop iterations
    pub passes: u64,

    /// Configure attempts
    pub configures: u64,

    /// Deconfigure attempts, including the final release
    pub deconfigures: u64,

    /// Failed queries and changes, and claims deferred by the duplicate probe
    pub failures: u64,
}

/// Single sequential reconciliation loop
pub struct Reconciler {
    backend: Arc<dyn AddressBackend>,
    desired: watch::Receiver<bool>,
    cancel: CancellationToken,
    stats: ReconcileStats,
}

impl Reconciler {
    pub(crate) fn new(
        backend: Arc<dyn AddressBackend>,
        desired: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            desired,
            cancel,
            stats: ReconcileStats::default(),
        }
    }

    /// Run until cancelled, then release the address once.
    pub async fn run(mut self) -> ReconcileStats {
        info!("Reconciler started");

        loop {
            // No new claims once shutdown has begun.
            if self.cancel.is_cancelled() {
                break;
            }
            self.stats.passes += 1;

            // Actual state is never carried over from a previous pass.
            let actual = match self.backend.query().await {
                Ok(actual) => Some(actual),
                Err(e) => {
                    warn!(error = %e, "Failed to query address state");
                    self.stats.failures += 1;
                    None
                }
            };
            let desired = *self.desired.borrow_and_update();

            if let Some(actual) = actual {
                debug!(actual, desired, "Address state");

                if actual != desired {
                    let changed = if desired {
                        self.claim().await
                    } else {
                        self.release().await
                    };
                    if changed {
                        continue;
                    }
                }
            }

            if self.wait().await {
                break;
            }
        }

        info!("Reconciler cancelled, releasing address");
        self.release().await;

        info!(
            passes = self.stats.passes,
            configures = self.stats.configures,
            deconfigures = self.stats.deconfigures,
            failures = self.stats.failures,
            "Reconciler stopped"
        );
        self.stats
    }

    /// Block until the coordinator wakes us. Returns true on cancellation.
    async fn wait(&mut self) -> bool {
        tokio::select! {
            changed = self.desired.changed() => {
                if changed.is_err() {
                    // Coordinator is gone; nothing can wake us again.
                    return true;
                }
            }
            _ = self.cancel.cancelled() => {}
        }
        self.cancel.is_cancelled()
    }

    /// Add the address unless another host already answers for it.
    async fn claim(&mut self) -> bool {
        if self.backend.probe_duplicate().await {
            warn!("Address is in use by another host, deferring claim");
            self.stats.failures += 1;
            return false;
        }

        self.stats.configures += 1;
        match self.backend.configure().await {
            Ok(outcome) => {
                log_outcome("configure", outcome);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to configure address, retrying on next wake");
                self.stats.failures += 1;
                false
            }
        }
    }

    async fn release(&mut self) -> bool {
        self.stats.deconfigures += 1;
        match self.backend.deconfigure().await {
            Ok(outcome) => {
                log_outcome("deconfigure", outcome);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove address, retrying on next wake");
                self.stats.failures += 1;
                false
            }
        }
    }
}

fn log_outcome(action: &str, outcome: ChangeOutcome) {
    match outcome {
        ChangeOutcome::Applied => info!(action, "Address change applied"),
        ChangeOutcome::AlreadyInState => info!(action, "Address already in requested state"),
    }
}
