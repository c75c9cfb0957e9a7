//! Compute backends.
//!
//! A backend owns surface memory and executes [`KernelOp`]s. Pipelines hold
//! one `Box<dyn GpuBackend>` each, chosen at creation time.
//!
//! # Architecture
//!
//! ```text
//! dyn GpuBackend
//!     +-- CpuBackend (rayon parallelization)
//!     +-- CUDA / DX11 (external, report BackendNotAvailable)
//! ```

mod cpu_backend;
mod detect;
mod gpu_primitives;
mod limits;

pub use cpu_backend::{CpuBackend, CpuSurface};
pub use detect::{describe_backends, detect_backends, select_best_backend, BackendInfo};
pub use gpu_primitives::{AsAny, GpuBackend, KernelOp, SurfaceHandle};
pub use limits::GpuLimits;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::{ComputeError, ComputeResult};

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Auto-select best available (CUDA > DX11 > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// NVIDIA CUDA backend.
    Cuda,
    /// DirectX 11 compute backend.
    Dx11,
}

impl BackendKind {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => CpuBackend::is_available(),
            Self::Cuda | Self::Dx11 => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Dx11 => "dx11",
        }
    }

    /// Resolves `Auto` to a concrete backend.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => select_best_backend(),
            other => other,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> ComputeResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "dx11" | "d3d11" | "directx" => Ok(Self::Dx11),
            other => Err(ComputeError::BackendNotAvailable(format!("unknown backend '{other}'"))),
        }
    }
}

/// Creates a backend instance.
///
/// `limits` overrides the detected device limits.
pub fn create_backend(kind: BackendKind, limits: Option<GpuLimits>) -> ComputeResult<Box<dyn GpuBackend>> {
    match kind {
        BackendKind::Auto => create_backend(select_best_backend(), limits),
        BackendKind::Cpu => {
            let backend = match limits {
                Some(limits) => CpuBackend::with_limits(limits),
                None => CpuBackend::new(),
            };
            debug!(backend = "cpu", "backend context created");
            Ok(Box::new(backend))
        }
        BackendKind::Cuda => Err(ComputeError::BackendNotAvailable(
            "CUDA kernels are provided by an external backend".to_string(),
        )),
        BackendKind::Dx11 => Err(ComputeError::BackendNotAvailable(
            "DirectX 11 kernels are provided by an external backend".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_cpu() {
        assert_eq!(BackendKind::Auto.resolve(), BackendKind::Cpu);
        assert_eq!(BackendKind::Cuda.resolve(), BackendKind::Cuda);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("CPU".parse::<BackendKind>().unwrap(), BackendKind::Cpu);
        assert_eq!("d3d11".parse::<BackendKind>().unwrap(), BackendKind::Dx11);
        assert!("metal".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_unavailable_backends_error() {
        assert!(matches!(
            create_backend(BackendKind::Cuda, None),
            Err(ComputeError::BackendNotAvailable(_))
        ));
        assert!(create_backend(BackendKind::Dx11, None).is_err());
    }
}
