//! In-process leader store.
//!
//! Behaves like a single-key coordination store with blocking reads. Useful
//! for tests and for running the manager without a Consul agent.

use crate::store::{LeaderMarker, LeaderStore, QueryOptions};
use async_trait::async_trait;
use common::{Error, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// Default wait window for blocking reads
const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
struct Record {
    version: u64,
    value: Option<String>,
}

/// In-memory leader store holding a single marker
pub struct MemoryStore {
    record: watch::Sender<Record>,
    wait_time: Duration,
    pending_failures: AtomicUsize,
    reads: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store (no marker yet)
    pub fn new() -> Self {
        let (record, _) = watch::channel(Record::default());
        Self {
            record,
            wait_time: DEFAULT_WAIT_TIME,
            pending_failures: AtomicUsize::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Set the wait window after which a blocking read returns unchanged
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Write a new leader value, bumping the version
    pub fn set(&self, value: impl Into<String>) {
        let value = value.into();
        self.record.send_modify(|record| {
            record.version += 1;
            record.value = Some(value);
        });
    }

    /// Delete the marker, bumping the version
    pub fn clear(&self) {
        self.record.send_modify(|record| {
            record.version += 1;
            record.value = None;
        });
    }

    /// Make the next `count` reads fail with a store error
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Current record version
    pub fn version(&self) -> u64 {
        self.record.borrow().version
    }

    /// Number of reads served (including failed ones)
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<LeaderMarker> {
        let record = self.record.borrow();
        record
            .value
            .as_ref()
            .map(|value| LeaderMarker::new(value.clone(), record.version))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaderStore for MemoryStore {
    async fn get(&self, _key: &str, options: &QueryOptions) -> Result<Option<LeaderMarker>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::store("injected failure"));
        }

        if options.wait_index > 0 {
            let wait_index = options.wait_index;
            let mut rx = self.record.subscribe();
            // Elapsed window answers with the unchanged record, like Consul.
            let _ = timeout(self.wait_time, async move {
                let _ = rx.wait_for(|record| record.version > wait_index).await;
            })
            .await;
        }

        Ok(self.current())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
