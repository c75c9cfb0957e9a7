//! Surface and kernel-launch abstraction shared by all backends.

use vpipe_core::{ChannelMap, SurfaceDesc, YuvLayout};

use super::{BackendKind, GpuLimits};
use crate::kernels::{OperateParams, ResizeFilter};
use crate::ComputeResult;

/// Handle to a surface in backend memory.
pub trait SurfaceHandle: Send + Sync + AsAny {
    /// Shape and format fixed at allocation.
    fn desc(&self) -> &SurfaceDesc;

    /// Width.
    fn width(&self) -> u32 { self.desc().width }

    /// Height.
    fn height(&self) -> u32 { self.desc().height }

    /// Size in bytes of backend memory used.
    fn size_bytes(&self) -> u64 {
        self.desc().byte_len() as u64
    }
}

/// Helper trait for downcasting.
pub trait AsAny: 'static {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Logical kernel id plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelOp {
    /// Raw YUV frame to RGBA.
    YuvToRgba(YuvLayout),
    /// RGBA to raw YUV frame.
    RgbaToYuv(YuvLayout),
    /// Four-channel permutation.
    RemapChannels(ChannelMap),
    /// Overlay (second input) onto source (first input).
    Blend { left: i32, top: i32, opacity: f32 },
    /// Flip and gamma.
    Operate(OperateParams),
    /// Three to four channels.
    PackedToPlanar4,
    /// Four to three channels.
    Planar4ToPacked,
    /// 8-bit to float.
    ToFloat,
    /// Resample to the output size.
    Resize(ResizeFilter),
    /// Same-shape copy.
    Copy,
}

impl KernelOp {
    /// Number of input surfaces the op reads.
    pub fn arity(&self) -> usize {
        match self {
            Self::Blend { .. } => 2,
            _ => 1,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::YuvToRgba(_) => "yuv_to_rgba",
            Self::RgbaToYuv(_) => "rgba_to_yuv",
            Self::RemapChannels(_) => "remap_channels",
            Self::Blend { .. } => "blend",
            Self::Operate(_) => "operate",
            Self::PackedToPlanar4 => "packed_to_planar4",
            Self::Planar4ToPacked => "planar4_to_packed",
            Self::ToFloat => "to_float",
            Self::Resize(_) => "resize",
            Self::Copy => "copy",
        }
    }
}

/// A compute device: surface allocator plus kernel launcher.
///
/// Surfaces are exclusively owned by the caller that allocated them and
/// must be returned to the same backend.
pub trait GpuBackend: Send + Sync {
    /// Backend type.
    fn kind(&self) -> BackendKind;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Device limits.
    fn limits(&self) -> &GpuLimits;

    /// Allocates a zero-filled surface.
    fn allocate_surface(&self, desc: SurfaceDesc) -> ComputeResult<Box<dyn SurfaceHandle>>;

    /// Returns a surface's memory to the backend.
    fn free_surface(&self, surface: Box<dyn SurfaceHandle>);

    /// Copies tightly packed host bytes into a surface.
    fn upload(&self, surface: &mut dyn SurfaceHandle, bytes: &[u8]) -> ComputeResult<()>;

    /// Copies a surface back to tightly packed host bytes.
    fn download(&self, surface: &dyn SurfaceHandle) -> ComputeResult<Vec<u8>>;

    /// Runs `op` reading `inputs` and writing `output`.
    ///
    /// Completes (or fails) before returning.
    fn launch(&self, op: &KernelOp, inputs: &[&dyn SurfaceHandle], output: &mut dyn SurfaceHandle) -> ComputeResult<()>;

    /// Bytes currently held by live surfaces.
    fn allocated_bytes(&self) -> u64;
}
