//! CPU backend using rayon for parallelization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};
use vpipe_core::{Error as CoreError, ImageView, ImageViewMut, PixelFormat, SurfaceDesc};

use super::gpu_primitives::{AsAny, GpuBackend, KernelOp, SurfaceHandle};
use super::{BackendKind, GpuLimits};
use crate::kernels;
use crate::{ComputeError, ComputeResult};

/// Host storage of a surface.
#[derive(Debug)]
enum CpuStorage {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

/// CPU surface - data stored in RAM.
///
/// Gives its bytes back to the owning backend's ledger when dropped.
#[derive(Debug)]
pub struct CpuSurface {
    desc: SurfaceDesc,
    storage: CpuStorage,
    ledger: Arc<AtomicU64>,
}

impl CpuSurface {
    /// Raw bytes including row padding.
    pub fn bytes(&self) -> &[u8] {
        match &self.storage {
            CpuStorage::U8(v) => v.as_slice(),
            CpuStorage::F32(v) => bytemuck::cast_slice(v.as_slice()),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            CpuStorage::U8(v) => v.as_mut_slice(),
            CpuStorage::F32(v) => bytemuck::cast_slice_mut(v.as_mut_slice()),
        }
    }

    fn channels(&self) -> usize {
        self.desc.format.channels() as usize
    }

    fn view_u8(&self) -> ComputeResult<ImageView<'_, u8>> {
        match &self.storage {
            CpuStorage::U8(v) => Ok(ImageView::new(
                v.as_slice(),
                self.desc.width,
                self.desc.height,
                self.channels(),
                self.desc.stride_elements(),
            )?),
            CpuStorage::F32(_) => Err(ComputeError::format_mismatch("8-bit surface", self.desc.format)),
        }
    }

    fn view_u8_mut(&mut self) -> ComputeResult<ImageViewMut<'_, u8>> {
        let (w, h, c, s) = (self.desc.width, self.desc.height, self.channels(), self.desc.stride_elements());
        match &mut self.storage {
            CpuStorage::U8(v) => Ok(ImageViewMut::new(v.as_mut_slice(), w, h, c, s)?),
            CpuStorage::F32(_) => Err(ComputeError::format_mismatch("8-bit surface", self.desc.format)),
        }
    }

    fn view_f32(&self) -> ComputeResult<ImageView<'_, f32>> {
        match &self.storage {
            CpuStorage::F32(v) => Ok(ImageView::new(
                v.as_slice(),
                self.desc.width,
                self.desc.height,
                self.channels(),
                self.desc.stride_elements(),
            )?),
            CpuStorage::U8(_) => Err(ComputeError::format_mismatch("float surface", self.desc.format)),
        }
    }

    fn view_f32_mut(&mut self) -> ComputeResult<ImageViewMut<'_, f32>> {
        let (w, h, c, s) = (self.desc.width, self.desc.height, self.channels(), self.desc.stride_elements());
        match &mut self.storage {
            CpuStorage::F32(v) => Ok(ImageViewMut::new(v.as_mut_slice(), w, h, c, s)?),
            CpuStorage::U8(_) => Err(ComputeError::format_mismatch("float surface", self.desc.format)),
        }
    }
}

impl Drop for CpuSurface {
    fn drop(&mut self) {
        self.ledger.fetch_sub(self.desc.byte_len() as u64, Ordering::SeqCst);
    }
}

impl AsAny for CpuSurface {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl SurfaceHandle for CpuSurface {
    fn desc(&self) -> &SurfaceDesc {
        &self.desc
    }
}

fn downcast(handle: &dyn SurfaceHandle) -> ComputeResult<&CpuSurface> {
    handle
        .as_any()
        .downcast_ref::<CpuSurface>()
        .ok_or_else(|| ComputeError::InvalidHandle("not a CPU surface".into()))
}

fn downcast_mut(handle: &mut dyn SurfaceHandle) -> ComputeResult<&mut CpuSurface> {
    handle
        .as_any_mut()
        .downcast_mut::<CpuSurface>()
        .ok_or_else(|| ComputeError::InvalidHandle("not a CPU surface".into()))
}

/// Runs the 8-bit or float variant of a same-type kernel.
fn same_type<F8, F32>(src: &CpuSurface, out: &mut CpuSurface, on_u8: F8, on_f32: F32) -> ComputeResult<()>
where
    F8: FnOnce(&ImageView<'_, u8>, &mut ImageViewMut<'_, u8>) -> ComputeResult<()>,
    F32: FnOnce(&ImageView<'_, f32>, &mut ImageViewMut<'_, f32>) -> ComputeResult<()>,
{
    if src.desc.format.is_float() {
        on_f32(&src.view_f32()?, &mut out.view_f32_mut()?)
    } else {
        on_u8(&src.view_u8()?, &mut out.view_u8_mut()?)
    }
}

/// Host-memory backend.
///
/// Allocation is bounded by [`GpuLimits::available_memory`]; requests that
/// would exceed it fail with [`ComputeError::AllocationFailed`].
#[derive(Debug)]
pub struct CpuBackend {
    limits: GpuLimits,
    allocated: Arc<AtomicU64>,
}

impl CpuBackend {
    /// Creates a backend bounded by detected host memory.
    pub fn new() -> Self {
        Self::with_limits(GpuLimits::detect_host())
    }

    /// Creates a backend with explicit limits.
    pub fn with_limits(limits: GpuLimits) -> Self {
        debug!(
            available_mb = limits.available_memory / (1024 * 1024),
            detected = limits.detected,
            "CPU backend created"
        );
        Self {
            limits,
            allocated: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Always available.
    pub fn is_available() -> bool {
        true
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn name(&self) -> &'static str {
        "CPU"
    }

    fn limits(&self) -> &GpuLimits {
        &self.limits
    }

    fn allocate_surface(&self, desc: SurfaceDesc) -> ComputeResult<Box<dyn SurfaceHandle>> {
        let bytes = desc.byte_len() as u64;
        let limit = self.limits.available_memory;
        if !self.limits.fits_dimensions(desc.width, desc.height) || bytes > self.limits.max_buffer_bytes {
            return Err(ComputeError::AllocationFailed {
                requested: bytes,
                available: self.limits.max_buffer_bytes.min(limit),
            });
        }
        self.allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                cur.checked_add(bytes).filter(|total| *total <= limit)
            })
            .map_err(|cur| ComputeError::AllocationFailed {
                requested: bytes,
                available: limit.saturating_sub(cur),
            })?;

        let storage = match desc.format {
            PixelFormat::F32C4 => CpuStorage::F32(vec![0.0; desc.element_len()]),
            _ => CpuStorage::U8(vec![0; desc.element_len()]),
        };
        trace!(surface = %desc, bytes, "allocated");
        Ok(Box::new(CpuSurface {
            desc,
            storage,
            ledger: Arc::clone(&self.allocated),
        }))
    }

    fn free_surface(&self, surface: Box<dyn SurfaceHandle>) {
        trace!(surface = %surface.desc(), "freed");
        drop(surface);
    }

    fn upload(&self, surface: &mut dyn SurfaceHandle, bytes: &[u8]) -> ComputeResult<()> {
        let surface = downcast_mut(surface)?;
        let desc = surface.desc;
        let dst = surface.bytes_mut();

        if bytes.len() == desc.byte_len() {
            dst.copy_from_slice(bytes);
        } else if bytes.len() == desc.packed_len() {
            let row = desc.row_bytes();
            for (src_row, dst_row) in bytes.chunks_exact(row).zip(dst.chunks_mut(desc.stride)) {
                dst_row[..row].copy_from_slice(src_row);
            }
        } else {
            return Err(CoreError::buffer_size_mismatch(desc.packed_len(), bytes.len()).into());
        }
        Ok(())
    }

    fn download(&self, surface: &dyn SurfaceHandle) -> ComputeResult<Vec<u8>> {
        let surface = downcast(surface)?;
        let desc = surface.desc;
        let src = surface.bytes();
        if desc.is_packed() {
            return Ok(src.to_vec());
        }
        let row = desc.row_bytes();
        let mut out = Vec::with_capacity(desc.packed_len());
        for src_row in src.chunks(desc.stride).take(desc.height as usize) {
            out.extend_from_slice(&src_row[..row]);
        }
        Ok(out)
    }

    fn launch(&self, op: &KernelOp, inputs: &[&dyn SurfaceHandle], output: &mut dyn SurfaceHandle) -> ComputeResult<()> {
        if inputs.len() != op.arity() {
            return Err(ComputeError::LaunchFailed(format!(
                "{} expects {} input(s), got {}",
                op.name(),
                op.arity(),
                inputs.len()
            )));
        }
        let src = downcast(inputs[0])?;
        let out = downcast_mut(output)?;
        trace!(op = op.name(), input = %src.desc, output = %out.desc, "cpu launch");

        match *op {
            KernelOp::YuvToRgba(layout) => {
                let kernel = kernels::yuv_to_rgba_kernel(layout).ok_or(ComputeError::UnsupportedLayout(layout))?;
                kernel(&src.view_u8()?, &mut out.view_u8_mut()?)
            }
            KernelOp::RgbaToYuv(layout) => {
                let kernel = kernels::rgba_to_yuv_kernel(layout).ok_or(ComputeError::UnsupportedLayout(layout))?;
                kernel(&src.view_u8()?, &mut out.view_u8_mut()?)
            }
            KernelOp::RemapChannels(map) => same_type(
                src,
                out,
                |s, d| kernels::remap_channels(s, d, map),
                |s, d| kernels::remap_channels(s, d, map),
            ),
            KernelOp::Blend { left, top, opacity } => {
                let overlay = downcast(inputs[1])?;
                if src.desc.format != overlay.desc.format {
                    return Err(ComputeError::format_mismatch(src.desc.format, overlay.desc.format));
                }
                if src.desc.format.is_float() {
                    kernels::blend(&src.view_f32()?, &overlay.view_f32()?, &mut out.view_f32_mut()?, left, top, opacity)
                } else {
                    kernels::blend(&src.view_u8()?, &overlay.view_u8()?, &mut out.view_u8_mut()?, left, top, opacity)
                }
            }
            KernelOp::Operate(params) => same_type(
                src,
                out,
                |s, d| kernels::operate(s, d, params),
                |s, d| kernels::operate(s, d, params),
            ),
            KernelOp::PackedToPlanar4 => kernels::packed_to_planar4(&src.view_u8()?, &mut out.view_u8_mut()?),
            KernelOp::Planar4ToPacked => kernels::planar4_to_packed(&src.view_u8()?, &mut out.view_u8_mut()?),
            KernelOp::ToFloat => kernels::to_float(&src.view_u8()?, &mut out.view_f32_mut()?),
            KernelOp::Resize(filter) => same_type(
                src,
                out,
                |s, d| kernels::resize(s, d, filter),
                |s, d| kernels::resize(s, d, filter),
            ),
            KernelOp::Copy => same_type(src, out, kernels::copy::<u8>, kernels::copy::<f32>),
        }
    }

    fn allocated_bytes(&self) -> u64 {
        self.allocated.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_accounted() {
        let backend = CpuBackend::with_limits(GpuLimits::with_memory(1024));
        let desc = SurfaceDesc::new(8, 8, PixelFormat::U8C4).unwrap();
        let a = backend.allocate_surface(desc).unwrap();
        assert_eq!(backend.allocated_bytes(), 256);
        let b = backend.allocate_surface(desc).unwrap();
        assert_eq!(backend.allocated_bytes(), 512);
        backend.free_surface(a);
        assert_eq!(backend.allocated_bytes(), 256);
        drop(b);
        assert_eq!(backend.allocated_bytes(), 0);
    }

    #[test]
    fn test_allocation_over_limit_fails() {
        let backend = CpuBackend::with_limits(GpuLimits::with_memory(300));
        let desc = SurfaceDesc::new(8, 8, PixelFormat::U8C4).unwrap();
        let _a = backend.allocate_surface(desc).unwrap();
        assert!(matches!(backend.allocate_surface(desc), Err(e) if e.is_allocation()));
        assert_eq!(backend.allocated_bytes(), 256);
    }

    #[test]
    fn test_padded_upload_download() {
        let backend = CpuBackend::with_limits(GpuLimits::with_memory(1 << 20));
        let desc = SurfaceDesc::with_stride(2, 2, 4, PixelFormat::U8C1).unwrap();
        let mut surface = backend.allocate_surface(desc).unwrap();
        backend.upload(surface.as_mut(), &[1, 2, 3, 4]).unwrap();
        let cpu = surface.as_any().downcast_ref::<CpuSurface>().unwrap();
        assert_eq!(cpu.bytes(), &[1, 2, 0, 0, 3, 4, 0, 0]);
        assert_eq!(backend.download(surface.as_ref()).unwrap(), vec![1, 2, 3, 4]);
        assert!(backend.upload(surface.as_mut(), &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_float_surface_bytes() {
        let backend = CpuBackend::with_limits(GpuLimits::with_memory(1 << 20));
        let desc = SurfaceDesc::new(1, 1, PixelFormat::F32C4).unwrap();
        let mut surface = backend.allocate_surface(desc).unwrap();
        let px: [f32; 4] = [0.0, 0.25, 0.5, 1.0];
        backend.upload(surface.as_mut(), bytemuck::cast_slice(&px)).unwrap();
        let bytes = backend.download(surface.as_ref()).unwrap();
        let back: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(back, px);
    }

    #[test]
    fn test_launch_arity() {
        let backend = CpuBackend::with_limits(GpuLimits::with_memory(1 << 20));
        let desc = SurfaceDesc::new(2, 2, PixelFormat::U8C4).unwrap();
        let a = backend.allocate_surface(desc).unwrap();
        let mut out = backend.allocate_surface(desc).unwrap();
        let op = KernelOp::Blend { left: 0, top: 0, opacity: 0.5 };
        assert!(backend.launch(&op, &[a.as_ref()], out.as_mut()).is_err());
    }
}
