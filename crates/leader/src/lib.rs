//! Leadership observation for vip-manager.
//!
//! This crate follows an externally maintained leader marker in a
//! coordination store and reports whether the local node is the leader:
//! - `LeaderStore` trait: the seam for coordination store backends
//! - `ConsulStore`: Consul KV with consistent blocking queries
//! - `MemoryStore`: in-process store for tests and dry runs
//! - `LeadershipWatcher`: long-poll loop producing a boolean stream
//!
//! Leader election itself happens elsewhere; this crate only observes it.
//!
//! # Example
//!
//! ```no_run
//! use leader::{ConsulStore, LeadershipWatcher};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ConsulStore::new("http://127.0.0.1:8500", Duration::from_secs(1), None)?;
//! let watcher = LeadershipWatcher::new(Arc::new(store), "service/pg/leader", "node1");
//!
//! let (tx, mut rx) = mpsc::channel(1);
//! let cancel = CancellationToken::new();
//! tokio::spawn(watcher.run(cancel.clone(), tx));
//!
//! while let Some(is_leader) = rx.recv().await {
//!     println!("leader: {}", is_leader);
//! }
//! # Ok(())
//! # }
//! ```

pub mod consul;
pub mod memory;
pub mod store;
pub mod watcher;

pub use consul::{ConsulStore, parse_endpoint};
pub use memory::MemoryStore;
pub use store::{LeaderMarker, LeaderStore, QueryOptions};
pub use watcher::{DEFAULT_RETRY_DELAY, LeadershipWatcher};
