use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest pool a `create()` will accept, in bytes.
pub const MIN_POOL_SIZE: u64 = 8 * 1024 * 1024;

/// Layout version stamped into every pool file. `open()` and `check()`
/// refuse images written under a different layout.
pub const LAYOUT: &str = "pmobj-0.1.0";

/// Default permission bits for a freshly created pool file (owner read/write).
pub const DEFAULT_MODE: u32 = 0o600;

/// Opaque reference to one persistent object, array or byte region.
///
/// Handles are allocated by the storage engine and stay stable across
/// close/reopen of the owning pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl Handle {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle_{}", self.0)
    }
}

/// Transaction stage as tracked by the storage engine.
///
/// Stage transitions:
/// ```text
/// None ──tx_begin──> Work ──tx_commit──> OnCommit ──tx_end──> None
///                      │
///                      └──tx_abort──> OnAbort ──tx_end──> None
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxStage {
    #[default]
    None,
    Work,
    OnCommit,
    OnAbort,
}

impl TxStage {
    /// Check whether operations may still mutate under this transaction.
    pub fn is_work(&self) -> bool {
        matches!(self, TxStage::Work)
    }

    /// Check whether the transaction reached a terminal stage awaiting `tx_end`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStage::OnCommit | TxStage::OnAbort)
    }
}

impl std::fmt::Display for TxStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStage::None => write!(f, "NONE"),
            TxStage::Work => write!(f, "WORK"),
            TxStage::OnCommit => write!(f, "ONCOMMIT"),
            TxStage::OnAbort => write!(f, "ONABORT"),
        }
    }
}

/// Tri-state result of a pool consistency check.
///
/// Advisory only: callers decide whether to `create()` or `open()` based on
/// it, the pool itself never acts on the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// No pool exists at the configured path.
    Missing,
    /// A file exists but does not decode as a consistent pool image.
    Inconsistent,
    /// The pool exists and is consistent.
    Consistent,
}

impl CheckStatus {
    /// The raw engine signal: -1 missing, 0 inconsistent, 1 consistent.
    pub fn as_i32(self) -> i32 {
        match self {
            CheckStatus::Missing => -1,
            CheckStatus::Inconsistent => 0,
            CheckStatus::Consistent => 1,
        }
    }
}

/// Configuration for one pool: backing path, layout string, capacity and
/// file creation mode.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub path: PathBuf,
    pub layout: String,
    pub size: u64,
    pub mode: u32,
}

impl PoolConfig {
    pub fn new<P: AsRef<Path>>(path: P, size: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            layout: LAYOUT.to_string(),
            size,
            mode: DEFAULT_MODE,
        }
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}
