//! Device resource limits.
//!
//! Backends refuse allocations that would exceed these limits, so a
//! pipeline that outgrows its device fails with an allocation error instead
//! of exhausting host or device memory.

/// Reserved fraction of detected memory.
const MEMORY_SAFETY_MARGIN: f64 = 0.4; // Use max 60% of memory

/// Default assumptions when device info unavailable.
const DEFAULT_MEMORY_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2 GB
const DEFAULT_MAX_SURFACE_DIM: u32 = 16384;
const DEFAULT_MAX_BUFFER_BYTES: u64 = 256 * 1024 * 1024; // 256 MB

/// Device resource limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuLimits {
    /// Maximum surface dimension (width or height).
    pub max_tile_dim: u32,
    /// Maximum single surface size in bytes.
    pub max_buffer_bytes: u64,
    /// Total memory in bytes (detected or estimated).
    pub total_memory: u64,
    /// Memory surfaces may occupy, in bytes (after safety margin).
    pub available_memory: u64,
    /// Whether values were auto-detected vs defaults.
    pub detected: bool,
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self {
            max_tile_dim: DEFAULT_MAX_SURFACE_DIM,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            total_memory: DEFAULT_MEMORY_BYTES,
            available_memory: (DEFAULT_MEMORY_BYTES as f64 * (1.0 - MEMORY_SAFETY_MARGIN)) as u64,
            detected: false,
        }
    }
}

impl GpuLimits {
    /// Limits for host memory, from `sys-info` (falls back to defaults).
    pub fn detect_host() -> Self {
        match sys_info::mem_info() {
            Ok(m) => {
                let total = m.total * 1024; // KB to bytes
                let available = ((m.avail * 1024) as f64 * (1.0 - MEMORY_SAFETY_MARGIN)) as u64;
                Self {
                    max_tile_dim: DEFAULT_MAX_SURFACE_DIM,
                    max_buffer_bytes: u64::MAX,
                    total_memory: total,
                    available_memory: available,
                    detected: true,
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Limits with an explicit memory budget in bytes (no safety margin).
    pub fn with_memory(bytes: u64) -> Self {
        Self {
            max_tile_dim: DEFAULT_MAX_SURFACE_DIM,
            max_buffer_bytes: bytes,
            total_memory: bytes,
            available_memory: bytes,
            detected: false,
        }
    }

    /// Limits with an explicit memory budget in megabytes.
    pub fn with_memory_mb(mb: u64) -> Self {
        Self::with_memory(mb.saturating_mul(1024 * 1024))
    }

    /// Whether a surface of this size fits the dimension limit.
    pub fn fits_dimensions(&self, width: u32, height: u32) -> bool {
        width <= self.max_tile_dim && height <= self.max_tile_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_applies_margin() {
        let limits = GpuLimits::default();
        assert!(limits.available_memory < limits.total_memory);
        assert!(!limits.detected);
    }

    #[test]
    fn test_with_memory_mb() {
        let limits = GpuLimits::with_memory_mb(4);
        assert_eq!(limits.available_memory, 4 * 1024 * 1024);
        assert!(limits.fits_dimensions(1920, 1080));
        assert!(!limits.fits_dimensions(20000, 10));
    }
}
