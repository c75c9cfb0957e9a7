//! Pixel-format kernels and compute backends for the vpipe frame pipeline.
//!
//! Kernels are stateless functions over borrowed [`vpipe_core::ImageView`]s.
//! Backends own surface memory and map a logical [`KernelOp`] onto their
//! native execution model.
//!
//! # Architecture
//!
//! ```text
//! LayerGraph (vpipe-graph)
//!     └── dyn GpuBackend
//!             ├── CpuBackend (rayon over host memory)
//!             └── (CUDA / DX11, external)
//!                     └── kernels::* (yuv, channel, composite, operate, resize)
//! ```
//!
//! # Example
//!
//! ```rust
//! use vpipe_compute::{create_backend, BackendKind, KernelOp};
//! use vpipe_core::{PixelFormat, SurfaceDesc, YuvLayout};
//!
//! let backend = create_backend(BackendKind::Cpu, None)?;
//! let raw_desc = YuvLayout::Uyvy.raw_desc(4, 2)?;
//! let mut raw = backend.allocate_surface(raw_desc)?;
//! backend.upload(raw.as_mut(), &[128u8; 16])?;
//!
//! let mut rgba = backend.allocate_surface(SurfaceDesc::new(4, 2, PixelFormat::U8C4)?)?;
//! backend.launch(&KernelOp::YuvToRgba(YuvLayout::Uyvy), &[raw.as_ref()], rgba.as_mut())?;
//! assert_eq!(backend.download(rgba.as_ref())?.len(), 32);
//! # Ok::<(), vpipe_compute::ComputeError>(())
//! ```

pub mod backend;
pub mod color;
pub mod kernels;

pub use backend::{
    create_backend, describe_backends, detect_backends, select_best_backend, AsAny, BackendInfo,
    BackendKind, CpuBackend, CpuSurface, GpuBackend, GpuLimits, KernelOp, SurfaceHandle,
};
pub use kernels::{OperateParams, ResizeFilter};

use thiserror::Error;
use vpipe_core::YuvLayout;

/// Compute backend and kernel errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Surface allocation failed: requested {requested} bytes, {available} available")]
    AllocationFailed { requested: u64, available: u64 },

    #[error("Invalid surface handle: {0}")]
    InvalidHandle(String),

    #[error("Format mismatch: expected {expected}, got {actual}")]
    FormatMismatch { expected: String, actual: String },

    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("No kernel for YUV layout '{0}'")]
    UnsupportedLayout(YuvLayout),

    #[error("Kernel launch failed: {0}")]
    LaunchFailed(String),

    #[error(transparent)]
    Core(#[from] vpipe_core::Error),
}

impl ComputeError {
    /// Creates a [`ComputeError::FormatMismatch`] error.
    pub fn format_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::FormatMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a [`ComputeError::DimensionMismatch`] error.
    pub fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }

    /// Out-of-memory style failures (retrying may succeed once memory frees up).
    pub fn is_allocation(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Failures caused by mismatched shapes or formats rather than the device.
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch { .. } | Self::DimensionMismatch { .. } | Self::Core(_)
        )
    }
}

pub type ComputeResult<T> = Result<T, ComputeError>;
