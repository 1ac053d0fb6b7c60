use crate::error::CbufError;
use crate::geometry::Geometry;

/// Configuration for a [`crate::Ring`].
///
/// Callers provide *requested* sizes, not pre-rounded ones — [`Geometry`]
/// does the power-of-two rounding.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Requested block size in bytes (rounded up to a power of two).
    pub block_size: u32,
    /// Requested number of blocks (rounded up to a power of two).
    pub block_count: u32,
    /// Enable metrics collection (slight overhead, same tradeoff as the
    /// teacher's `enable_metrics`).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    #[must_use]
    pub const fn new(block_size: u32, block_count: u32, enable_metrics: bool) -> Self {
        Self {
            block_size,
            block_count,
            enable_metrics,
        }
    }

    /// Resolves the requested sizes into a concrete [`Geometry`].
    pub fn geometry(&self) -> Result<Geometry, CbufError> {
        Geometry::new(self.block_size, self.block_count).map_err(CbufError::from)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 64,
            block_count: 1 << 16, // 64K blocks
            enable_metrics: false,
        }
    }
}

/// Low-latency configuration: small blocks, small ring, fits in L1/L2.
pub const LOW_LATENCY_CONFIG: Config = Config::new(64, 1 << 12, false);

/// High-throughput configuration: larger blocks, deep ring.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(4096, 1 << 14, false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves() {
        let g = Config::default().geometry().unwrap();
        assert_eq!(g.block_size, 64);
        assert_eq!(g.block_count, 1 << 16);
    }

    #[test]
    fn presets_resolve() {
        LOW_LATENCY_CONFIG.geometry().unwrap();
        HIGH_THROUGHPUT_CONFIG.geometry().unwrap();
    }
}
