//! Shared desired state and wake-up scheduling.
//!
//! The desired "hold the VIP" flag lives in a latest-value-wins cell: a new
//! write overwrites any value the reconciler has not looked at yet, and every
//! write wakes the reconciler. Leadership updates wake it only when the flag
//! flips; the periodic recheck wakes it unconditionally so that external
//! changes to the interface get repaired.

use crate::address::AddressBackend;
use crate::reconciler::{ReconcileStats, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shortest accepted recheck interval
pub const MIN_RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of the desired state
pub struct StateCoordinator {
    desired: watch::Sender<bool>,
    recheck_interval: Duration,
}

impl StateCoordinator {
    /// Create a coordinator. The node starts as "not leader".
    ///
    /// Intervals below `MIN_RECHECK_INTERVAL` are raised to it.
    pub fn new(recheck_interval: Duration) -> Self {
        if recheck_interval < MIN_RECHECK_INTERVAL {
            warn!(
                requested_ms = recheck_interval.as_millis(),
                "Recheck interval too short, using {}ms",
                MIN_RECHECK_INTERVAL.as_millis()
            );
        }
        let recheck_interval = recheck_interval.max(MIN_RECHECK_INTERVAL);
        let (desired, _) = watch::channel(false);
        Self {
            desired,
            recheck_interval,
        }
    }

    /// Current desired state
    pub fn desired(&self) -> bool {
        *self.desired.borrow()
    }

    /// Observe desired state changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.desired.subscribe()
    }

    /// Record a leadership update. Wakes the reconciler and returns true only
    /// if the desired state changed.
    pub fn publish(&self, leader: bool) -> bool {
        self.desired.send_if_modified(|current| {
            if *current == leader {
                return false;
            }
            *current = leader;
            true
        })
    }

    /// Wake the reconciler without changing the desired state
    pub fn recheck(&self) {
        self.desired.send_modify(|_| {});
    }

    /// Drive the reconciler from a leadership stream until cancelled.
    ///
    /// Spawns the one reconciler for this coordinator, feeds it leadership
    /// updates and periodic rechecks, and on cancellation drops the desired
    /// state to "not leader", wakes it a last time and waits for it to finish
    /// its final release.
    pub async fn sync_states(
        self,
        mut states: mpsc::Receiver<bool>,
        backend: Arc<dyn AddressBackend>,
        cancel: CancellationToken,
    ) -> ReconcileStats {
        let reconciler = Reconciler::new(backend, self.desired.subscribe(), cancel.clone());
        let mut reconciler_handle = tokio::spawn(reconciler.run());

        let mut recheck_timer = interval(self.recheck_interval);
        recheck_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        recheck_timer.tick().await; // Skip first immediate tick

        info!(
            recheck_interval_ms = self.recheck_interval.as_millis(),
            "State coordinator started"
        );

        let mut states_open = true;
        loop {
            tokio::select! {
                state = states.recv(), if states_open => match state {
                    Some(leader) => {
                        if self.publish(leader) {
                            info!(leader, "Desired state changed");
                        }
                    }
                    None => {
                        warn!("Leadership stream closed, continuing with periodic rechecks only");
                        states_open = false;
                    }
                },

                _ = recheck_timer.tick() => {
                    debug!("Periodic recheck");
                    self.recheck();
                }

                result = &mut reconciler_handle => {
                    return match result {
                        Ok(stats) if cancel.is_cancelled() => stats,
                        Ok(stats) => {
                            error!("Reconciler exited before cancellation");
                            stats
                        }
                        Err(e) => {
                            error!(error = %e, "Reconciler task failed");
                            ReconcileStats::default()
                        }
                    };
                }

                _ = cancel.cancelled() => break,
            }
        }

        info!("State coordinator cancelled, waiting for reconciler");
        self.desired.send_modify(|desired| *desired = false);

        match reconciler_handle.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Reconciler task failed");
                ReconcileStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{ChangeOutcome, MockAddressBackend};

    #[test]
    fn test_initial_state_is_not_leader() {
        let coordinator = StateCoordinator::new(Duration::from_secs(10));
        assert!(!coordinator.desired());
    }

    #[test]
    fn test_publish_only_reports_changes() {
        let coordinator = StateCoordinator::new(Duration::from_secs(10));

        assert!(!coordinator.publish(false));
        assert!(coordinator.publish(true));
        assert!(!coordinator.publish(true));
        assert!(coordinator.desired());
        assert!(coordinator.publish(false));
    }

    #[tokio::test]
    async fn test_recheck_wakes_without_change() {
        let coordinator = StateCoordinator::new(Duration::from_secs(10));
        let mut rx = coordinator.subscribe();

        coordinator.recheck();
        tokio::time::timeout(Duration::from_millis(100), rx.changed())
            .await
            .expect("Recheck should wake subscribers")
            .unwrap();
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_same_value_does_not_wake() {
        let coordinator = StateCoordinator::new(Duration::from_secs(10));
        let mut rx = coordinator.subscribe();

        coordinator.publish(false);
        let woke = tokio::time::timeout(Duration::from_millis(50), rx.changed()).await;
        assert!(woke.is_err());
    }

    #[tokio::test]
    async fn test_latest_value_wins() {
        let coordinator = StateCoordinator::new(Duration::from_secs(10));
        let mut rx = coordinator.subscribe();

        for leader in [true, false, true, false, true] {
            coordinator.publish(leader);
        }

        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        // Intermediate values are not queued
        let again = tokio::time::timeout(Duration::from_millis(50), rx.changed()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_zero_recheck_interval_is_clamped() {
        let coordinator = StateCoordinator::new(Duration::ZERO);
        assert_eq!(coordinator.recheck_interval, MIN_RECHECK_INTERVAL);

        let mut backend = MockAddressBackend::new();
        backend.expect_query().returning(|| Ok(false));
        backend
            .expect_deconfigure()
            .times(1)
            .returning(|| Ok(ChangeOutcome::AlreadyInState));

        let (_states, states_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let run = tokio::spawn(coordinator.sync_states(states_rx, Arc::new(backend), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("Coordinator did not stop")
            .expect("Coordinator panicked");
        assert!(stats.passes > 1, "Recheck ticks keep waking the reconciler");
        assert_eq!(stats.deconfigures, 1);
    }
}
