//! Configuration Module - Heap Tuning Parameters
//!
//! Holds the handful of tunables that would otherwise be baked in as
//! compile-time constants (arena size, root table capacity).

use crate::error::{GcError, Result};

/// Configuration for the bump-allocated heap and its collector.
///
/// # Examples
///
/// ```rust
/// use vgc::HeapConfig;
///
/// let config = HeapConfig::default();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Total size of the bump arena, in bytes.
    ///
    /// Defaults to 256 MiB. Must be a non-zero multiple of the allocation
    /// alignment.
    pub arena_size: usize,

    /// Maximum number of simultaneously registered GC roots.
    ///
    /// Defaults to 256 slots.
    pub max_roots: usize,

    /// Alignment (in bytes) every allocation is rounded up to.
    pub align: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            arena_size: 256 * 1024 * 1024,
            max_roots: 256,
            align: 8,
        }
    }
}

impl HeapConfig {
    /// Validate that the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.arena_size == 0 {
            return Err(GcError::Configuration("arena_size must be non-zero".into()));
        }
        if self.max_roots == 0 {
            return Err(GcError::Configuration("max_roots must be non-zero".into()));
        }
        if self.align == 0 || !self.align.is_power_of_two() {
            return Err(GcError::Configuration(
                "align must be a non-zero power of two".into(),
            ));
        }
        if self.arena_size % self.align != 0 {
            return Err(GcError::Configuration(
                "arena_size must be a multiple of align".into(),
            ));
        }
        Ok(())
    }
}
