//! vip-manager - keeps a floating virtual IP on the current leader node
//!
//! Leadership is decided elsewhere and recorded as a marker in a coordination
//! store. This crate follows that marker and converges the local interface
//! toward "carry the VIP" or "don't carry the VIP".
//!
//! # Components
//!
//! - **LeadershipWatcher** (`leader` crate): long-polls the marker and emits
//!   an "am I leader" boolean for every change
//! - **StateCoordinator**: owns the desired state, merges leadership updates
//!   with a periodic recheck into wake-ups
//! - **Reconciler**: compares live interface state with the desired state and
//!   adds or removes the address until they agree
//!
//! On shutdown the reconciler always makes one last attempt to release the
//! address before the manager returns.

pub mod address;
pub mod config;
pub mod coordinator;
pub mod manager;
pub mod reconciler;
pub mod types;

pub use address::{AddressBackend, ChangeOutcome, IpRoute2};
pub use config::{Config, ConfigError, LogFormat};
pub use coordinator::StateCoordinator;
pub use manager::VipManager;
pub use reconciler::{ReconcileStats, Reconciler};
pub use types::{CommandPaths, ManagerConfig, ProbeConfig, VipConfig};
