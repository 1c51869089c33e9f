//! Shared helpers for vip-manager integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use common::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use vip_manager::{AddressBackend, ChangeOutcome};

/// In-memory stand-in for the interface, recording every call
#[derive(Default)]
pub struct FakeBackend {
    present: AtomicBool,
    queries: AtomicUsize,
    configures: AtomicUsize,
    deconfigures: AtomicUsize,
    failing_configures: AtomicUsize,
    duplicate: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    /// Change the interface behind the manager's back
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Make the next `count` configure calls fail
    pub fn fail_configures(&self, count: usize) {
        self.failing_configures.store(count, Ordering::SeqCst);
    }

    /// Pretend another host answers for the address
    pub fn set_duplicate(&self, duplicate: bool) {
        self.duplicate.store(duplicate, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }

    pub fn deconfigures(&self) -> usize {
        self.deconfigures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressBackend for FakeBackend {
    async fn query(&self) -> Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.is_present())
    }

    async fn configure(&self) -> Result<ChangeOutcome> {
        self.configures.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .failing_configures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::address("RTNETLINK answers: Network is down"));
        }

        if self.present.swap(true, Ordering::SeqCst) {
            Ok(ChangeOutcome::AlreadyInState)
        } else {
            Ok(ChangeOutcome::Applied)
        }
    }

    async fn deconfigure(&self) -> Result<ChangeOutcome> {
        self.deconfigures.fetch_add(1, Ordering::SeqCst);

        if self.present.swap(false, Ordering::SeqCst) {
            Ok(ChangeOutcome::Applied)
        } else {
            Ok(ChangeOutcome::AlreadyInState)
        }
    }

    async fn probe_duplicate(&self) -> bool {
        self.duplicate.load(Ordering::SeqCst)
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn eventually(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
