use serde::{Deserialize, Serialize};

/// Default maximum number of requests sent in one wire-level batch.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 100;

/// Default maximum number of batches in flight at the same time.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Batch dispatch settings of an [`crate::EthJsonRpcClient`].
///
/// Most JSON-RPC nodes cap both the size of a batch and the number of
/// concurrent connections, so both knobs should be tuned to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of requests per wire-level batch.
    /// `0` sends the whole request list as a single batch.
    #[serde(alias = "max-chunk-size", default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Maximum number of batches processed concurrently.
    #[serde(alias = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

impl BatchConfig {
    pub fn new(max_chunk_size: usize, worker_count: usize) -> Self {
        Self {
            max_chunk_size,
            worker_count,
        }
    }

    /// Returns a copy with a worker count of at least 1.
    pub fn validated(self) -> Self {
        if self.worker_count == 0 {
            log::warn!("worker_count is 0, using 1");
        }
        Self {
            max_chunk_size: self.max_chunk_size,
            worker_count: self.worker_count.max(1),
        }
    }
}
