//! Capture-format normalisation pipeline.
//!
//! Fixed chain built on a registry pipeline:
//!
//! ```text
//! input -> yuv2rgba -> rgb2rgba -> map channel -> out map channel -> resize -> output
//! ```
//!
//! [`VideoFormatPipeline::set_video_format`] enables only the stages the
//! capture type needs; the rest are bypassed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};
use vpipe_compute::{BackendKind, ResizeFilter};
use vpipe_core::{ChannelMap, PixelFormat, SurfaceDesc, YuvLayout};

use crate::error::{GraphError, GraphResult};
use crate::layer::{LayerId, LayerParams, LayerType, ResizeParams, YuvParams};
use crate::pipeline::{Pipeline, PipelineId};
use crate::registry::PipelineRegistry;
use crate::sink::FrameSink;

/// Capture pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoType {
    Nv12,
    Yuy2,
    Yvyu,
    Uyvy,
    I420,
    /// YUY2 split into planes.
    Yuy2Planar,
    /// Byte order A, R, G, B.
    Argb32,
    Rgba32,
    Rgb24,
}

impl VideoType {
    /// All capture types.
    pub const ALL: [VideoType; 9] = [
        Self::Nv12,
        Self::Yuy2,
        Self::Yvyu,
        Self::Uyvy,
        Self::I420,
        Self::Yuy2Planar,
        Self::Argb32,
        Self::Rgba32,
        Self::Rgb24,
    ];

    /// YUV layout of the capture, `Other` for RGB captures.
    pub fn yuv_layout(&self) -> YuvLayout {
        match self {
            Self::Nv12 => YuvLayout::Nv12,
            Self::Yuy2 => YuvLayout::Yuy2,
            Self::Yvyu => YuvLayout::Yvyu,
            Self::Uyvy => YuvLayout::Uyvy,
            Self::I420 => YuvLayout::I420,
            Self::Yuy2Planar => YuvLayout::Yuy2Planar,
            Self::Argb32 | Self::Rgba32 | Self::Rgb24 => YuvLayout::Other,
        }
    }

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nv12 => "nv12",
            Self::Yuy2 => "yuy2",
            Self::Yvyu => "yvyu",
            Self::Uyvy => "uyvy",
            Self::I420 => "i420",
            Self::Yuy2Planar => "yuy2p",
            Self::Argb32 => "argb32",
            Self::Rgba32 => "rgba32",
            Self::Rgb24 => "rgb24",
        }
    }

    /// Raw input shape for a `width`x`height` capture.
    pub fn raw_desc(&self, width: u32, height: u32) -> GraphResult<SurfaceDesc> {
        let desc = match self {
            Self::Argb32 | Self::Rgba32 => SurfaceDesc::new(width, height, PixelFormat::U8C4)?,
            Self::Rgb24 => SurfaceDesc::new(width, height, PixelFormat::U8C3)?,
            yuv => yuv.yuv_layout().raw_desc(width, height)?,
        };
        Ok(desc)
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoType {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .or(match lower.as_str() {
                "argb" => Some(Self::Argb32),
                "rgba" => Some(Self::Rgba32),
                "rgb" => Some(Self::Rgb24),
                "yuy2planar" => Some(Self::Yuy2Planar),
                _ => None,
            })
            .ok_or_else(|| vpipe_core::Error::unsupported_format(format!("video type '{s}'")).into())
    }
}

/// Converts raw captures to RGBA (or a reordered variant) at a chosen size.
///
/// Holds its pipeline for its whole lifetime and releases it on drop. If the
/// slot is released behind its back, every call fails with
/// [`GraphError::PipelineClosed`] and drop leaves the slot's new owner alone.
pub struct VideoFormatPipeline<'r> {
    registry: &'r PipelineRegistry,
    pipeline: Arc<Pipeline>,
    claim: u64,
    input: LayerId,
    yuv2rgba: LayerId,
    rgb2rgba: LayerId,
    map_channel: LayerId,
    out_map: LayerId,
    resize: LayerId,
    output: LayerId,
    video_type: Option<VideoType>,
    size: (u32, u32),
    output_size: Option<(u32, u32)>,
}

impl<'r> VideoFormatPipeline<'r> {
    /// Acquires a pipeline from `registry` and builds the chain.
    pub fn new(registry: &'r PipelineRegistry, backend: BackendKind) -> GraphResult<Self> {
        let (pipeline, claim) = registry.claim(backend)?;
        match Self::build(registry, Arc::clone(&pipeline), claim) {
            Ok(video) => Ok(video),
            Err(e) => {
                if let Err(release) = registry.release_claim(&pipeline, claim) {
                    warn!(pipeline = pipeline.id().index(), error = %release, "release after failed build");
                }
                Err(e)
            }
        }
    }

    fn build(registry: &'r PipelineRegistry, pipeline: Arc<Pipeline>, claim: u64) -> GraphResult<Self> {
        let p = pipeline.as_ref();

        let input = p.add_layer("input", LayerType::Input)?;
        let yuv2rgba = p.add_layer("yuv2rgba", LayerType::YuvToRgba)?;
        let rgb2rgba = p.add_layer("rgb2rgba", LayerType::RgbToRgba)?;
        let map_channel = p.add_layer("map channel", LayerType::MapChannel)?;
        let out_map = p.add_layer("out map channel", LayerType::MapChannel)?;
        let resize = p.add_layer("resize", LayerType::Resize)?;
        let output = p.add_layer("output", LayerType::Output)?;

        p.connect(yuv2rgba, "input")?;
        p.connect(rgb2rgba, "yuv2rgba")?;
        p.connect(map_channel, "rgb2rgba")?;
        p.connect(out_map, "map channel")?;
        p.connect(resize, "out map channel")?;
        p.connect(output, "resize")?;

        p.update_parameter(out_map, LayerParams::ChannelMap(ChannelMap::bgra()))?;
        for stage in [yuv2rgba, rgb2rgba, map_channel, resize] {
            p.set_enabled(stage, false)?;
        }

        Ok(Self {
            registry,
            pipeline,
            claim,
            input,
            yuv2rgba,
            rgb2rgba,
            map_channel,
            out_map,
            resize,
            output,
            video_type: None,
            size: (0, 0),
            output_size: None,
        })
    }

    /// Registry id of the underlying pipeline.
    pub fn id(&self) -> PipelineId {
        self.pipeline.id()
    }

    /// Underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Whether this handle still owns its registry slot.
    pub fn is_owned(&self) -> bool {
        self.pipeline.is_in_use() && self.pipeline.claim() == self.claim
    }

    fn owned(&self) -> GraphResult<&Pipeline> {
        if self.is_owned() {
            Ok(&self.pipeline)
        } else {
            Err(GraphError::PipelineClosed(self.id().index()))
        }
    }

    /// Capture type set by [`set_video_format`](Self::set_video_format).
    pub fn video_type(&self) -> Option<VideoType> {
        self.video_type
    }

    /// Layer id of the output stage.
    pub fn output_layer(&self) -> LayerId {
        self.output
    }

    /// Selects the capture type and size.
    pub fn set_video_format(&mut self, video_type: VideoType, width: u32, height: u32) -> GraphResult<()> {
        let raw = video_type.raw_desc(width, height)?;
        let layout = video_type.yuv_layout();
        let p = self.owned()?;

        let is_yuv = layout != YuvLayout::Other;
        if is_yuv {
            p.update_parameter(self.yuv2rgba, LayerParams::Yuv(YuvParams { layout }))?;
        }
        p.set_enabled(self.yuv2rgba, is_yuv)?;
        p.set_enabled(self.rgb2rgba, video_type == VideoType::Rgb24)?;
        if video_type == VideoType::Argb32 {
            p.update_parameter(self.map_channel, LayerParams::ChannelMap(ChannelMap::argb_to_rgba()))?;
        }
        p.set_enabled(self.map_channel, video_type == VideoType::Argb32)?;
        p.set_input_desc(self.input, raw)?;

        debug!(pipeline = self.id().index(), %video_type, width, height, raw = %raw, "video format set");
        self.video_type = Some(video_type);
        self.size = (width, height);
        self.apply_resize()
    }

    /// Output size; resizing runs only when it differs from the capture size.
    pub fn set_output_size(&mut self, width: u32, height: u32) -> GraphResult<()> {
        SurfaceDesc::new(width, height, PixelFormat::U8C4)?;
        self.output_size = Some((width, height));
        self.apply_resize()
    }

    /// Resize filter used when output and capture sizes differ.
    pub fn set_resize_filter(&mut self, filter: ResizeFilter) -> GraphResult<()> {
        let (width, height) = self.output_size.unwrap_or((0, 0));
        self.owned()?
            .update_parameter(self.resize, LayerParams::Resize(ResizeParams { width, height, filter }))
    }

    fn apply_resize(&mut self) -> GraphResult<()> {
        let p = self.owned()?;
        match self.output_size {
            Some((w, h)) if (w, h) != self.size && self.video_type.is_some() => {
                let filter = p.inspect(|g| match g.layer(self.resize).map(|l| *l.params()) {
                    Some(LayerParams::Resize(current)) => current.filter,
                    _ => ResizeFilter::default(),
                })?;
                p.update_parameter(
                    self.resize,
                    LayerParams::Resize(ResizeParams { width: w, height: h, filter }),
                )?;
                p.set_enabled(self.resize, true)
            }
            _ => p.set_enabled(self.resize, false),
        }
    }

    /// Channel order of the output (default BGRA).
    pub fn set_output_channels(&mut self, map: ChannelMap) -> GraphResult<()> {
        let p = self.owned()?;
        p.update_parameter(self.out_map, LayerParams::ChannelMap(map))?;
        p.set_enabled(self.out_map, map != ChannelMap::identity())
    }

    /// Converts one raw capture frame.
    pub fn run(&self, frame: &[u8]) -> GraphResult<()> {
        let p = self.owned()?;
        if self.video_type.is_none() {
            return Err(GraphError::NoInputDeclared("input".into()));
        }
        p.dispatch(frame)
    }

    /// Bytes of the last converted frame.
    pub fn read_output(&self) -> GraphResult<Vec<u8>> {
        self.owned()?.read_output(self.output)
    }

    /// Shape of the last converted frame.
    pub fn output_desc(&self) -> GraphResult<SurfaceDesc> {
        self.owned()?.output_desc(self.output)
    }

    /// Hands the last converted frame to `sink`.
    pub fn deliver(&self, sink: &mut dyn FrameSink) -> GraphResult<()> {
        self.owned()?.deliver(self.output, sink)
    }
}

impl Drop for VideoFormatPipeline<'_> {
    fn drop(&mut self) {
        match self.registry.release_claim(&self.pipeline, self.claim) {
            Ok(true) => {}
            Ok(false) => debug!(pipeline = self.id().index(), "video pipeline already released"),
            Err(e) => warn!(pipeline = self.id().index(), error = %e, "failed to release video pipeline"),
        }
    }
}
