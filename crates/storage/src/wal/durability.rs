//! Durability mode for WAL operations.
//!
//! Defines when appended entries are fsynced to disk.

/// Durability mode for WAL writes.
///
/// Controls when data is fsynced to disk and the trade-off between
/// performance and durability.
///
/// | Mode | Loss window on crash |
/// |------|----------------------|
/// | Strict | none |
/// | Batched | up to `batch_size` writes or `interval_ms` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every append (slow, maximum durability).
    Strict,

    /// fsync every N appends OR every T milliseconds.
    Batched {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum writes between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Check if this mode requires immediate fsync on every append.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Strict => "Sync fsync (safest, slowest)",
            DurabilityMode::Batched { .. } => "Batched fsync (balanced speed/safety)",
        }
    }

    /// Batched mode with recommended defaults.
    ///
    /// Returns `Batched { interval_ms: 100, batch_size: 1000 }`.
    pub fn standard_default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::standard_default()
    }
}
