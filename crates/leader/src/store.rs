//! Coordination store abstraction.

use async_trait::async_trait;
use common::Result;

/// Record naming the currently elected leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderMarker {
    /// Identifier of the leader node
    pub value: String,

    /// Monotonically increasing modification index
    pub version: u64,
}

impl LeaderMarker {
    pub fn new(value: impl Into<String>, version: u64) -> Self {
        Self {
            value: value.into(),
            version,
        }
    }

    /// Whether this marker names `node_name` as leader.
    pub fn names(&self, node_name: &str) -> bool {
        self.value == node_name
    }
}

/// Options for a single store read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Require a strongly consistent read
    pub require_consistent: bool,

    /// Block until the record version advances past this index (0 = no blocking)
    pub wait_index: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            require_consistent: true,
            wait_index: 0,
        }
    }
}

/// Coordination store backend.
///
/// Implementations must support server-side blocking: when `wait_index` is
/// non-zero, `get` returns once the record's version moves past it or the
/// backend's wait window elapses, whichever comes first.
#[async_trait]
pub trait LeaderStore: Send + Sync {
    /// Read a record. `Ok(None)` means the record does not exist.
    async fn get(&self, key: &str, options: &QueryOptions) -> Result<Option<LeaderMarker>>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}
