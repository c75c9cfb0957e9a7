//! Layer types, parameter blocks and per-layer state.

use std::fmt;
use std::str::FromStr;

use vpipe_compute::{KernelOp, OperateParams, ResizeFilter, SurfaceHandle};
use vpipe_core::{ChannelMap, PixelFormat, SurfaceDesc, YuvLayout};

use crate::error::{GraphError, GraphResult};

/// Stable index of a layer within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    /// Position in the graph's layer table.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Processing stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    /// Receives the raw frame.
    Input,
    /// Exposes a committed result for readback.
    Output,
    /// Raw YUV to RGBA.
    YuvToRgba,
    /// RGBA to raw YUV.
    RgbaToYuv,
    /// Channel permutation.
    MapChannel,
    /// Resample.
    Resize,
    /// Overlay composite (connection 0 = source, 1 = overlay).
    Blend,
    /// Flip and gamma.
    Operate,
    /// Three to four channels.
    RgbToRgba,
    /// Four to three channels.
    RgbaToRgb,
    /// 8-bit to float.
    ToFloat,
}

impl LayerType {
    /// All layer types.
    pub const ALL: [LayerType; 11] = [
        Self::Input,
        Self::Output,
        Self::YuvToRgba,
        Self::RgbaToYuv,
        Self::MapChannel,
        Self::Resize,
        Self::Blend,
        Self::Operate,
        Self::RgbToRgba,
        Self::RgbaToRgb,
        Self::ToFloat,
    ];

    /// Canonical tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::YuvToRgba => "yuv2rgba",
            Self::RgbaToYuv => "rgba2yuv",
            Self::MapChannel => "mapchannel",
            Self::Resize => "resize",
            Self::Blend => "blend",
            Self::Operate => "operate",
            Self::RgbToRgba => "rgb2rgba",
            Self::RgbaToRgb => "rgba2rgb",
            Self::ToFloat => "tofloat",
        }
    }

    /// Enabled state of a freshly added layer.
    pub fn default_enabled(&self) -> bool {
        true
    }

    /// Parameter block a fresh layer starts with.
    pub fn default_params(&self) -> LayerParams {
        match self {
            Self::YuvToRgba | Self::RgbaToYuv => LayerParams::Yuv(YuvParams::default()),
            Self::MapChannel => LayerParams::ChannelMap(ChannelMap::identity()),
            Self::Resize => LayerParams::Resize(ResizeParams::default()),
            Self::Blend => LayerParams::Blend(BlendParams::default()),
            Self::Operate => LayerParams::Operate(OperateParams::default()),
            _ => LayerParams::None,
        }
    }

    /// Number of upstream connections the layer reads.
    pub fn input_count(&self) -> usize {
        match self {
            Self::Input => 0,
            Self::Blend => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for LayerType {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == normalized)
            .ok_or_else(|| GraphError::InvalidType(s.to_string()))
    }
}

/// YUV conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YuvParams {
    /// Raw frame layout.
    pub layout: YuvLayout,
}

/// Resize parameters. A zero dimension keeps the input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub filter: ResizeFilter,
}

/// Blend placement and source weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendParams {
    pub left: i32,
    pub top: i32,
    /// Weight of the source frame in `[0, 1]`.
    pub opacity: f32,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            opacity: 1.0,
        }
    }
}

/// Type-specific parameter block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerParams {
    /// Layer types without knobs.
    None,
    Yuv(YuvParams),
    ChannelMap(ChannelMap),
    Resize(ResizeParams),
    Blend(BlendParams),
    Operate(OperateParams),
}

impl LayerParams {
    /// Name of the parameter block kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "no",
            Self::Yuv(_) => "yuv",
            Self::ChannelMap(_) => "channel map",
            Self::Resize(_) => "resize",
            Self::Blend(_) => "blend",
            Self::Operate(_) => "operate",
        }
    }

    /// Checks value ranges.
    pub(crate) fn validate(&self, layer: &str) -> GraphResult<()> {
        let invalid = |reason: String| GraphError::InvalidParameter {
            layer: layer.to_string(),
            reason,
        };
        match self {
            Self::ChannelMap(map) => map.validate()?,
            Self::Blend(p) if !(0.0..=1.0).contains(&p.opacity) => {
                return Err(invalid(format!("opacity {} outside [0, 1]", p.opacity)));
            }
            Self::Operate(p) if !p.gamma.is_finite() || p.gamma <= 0.0 => {
                return Err(invalid(format!("gamma {} must be positive", p.gamma)));
            }
            Self::Resize(p) if (p.width == 0) != (p.height == 0) => {
                return Err(invalid(format!("size {}x{} must set both or neither dimension", p.width, p.height)));
            }
            _ => {}
        }
        Ok(())
    }
}

/// One processing stage of a graph.
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) layer_type: LayerType,
    pub(crate) enabled: bool,
    pub(crate) params: LayerParams,
    pub(crate) connections: Vec<LayerId>,
    /// Declared raw shape (input layers only).
    pub(crate) input_desc: Option<SurfaceDesc>,
    /// Surface written during dispatch.
    pub(crate) surface: Option<Box<dyn SurfaceHandle>>,
    /// Last committed frame (output layers only).
    pub(crate) front: Option<Box<dyn SurfaceHandle>>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.layer_type)
            .field("enabled", &self.enabled)
            .field("params", &self.params)
            .field("connections", &self.connections)
            .field("input_desc", &self.input_desc)
            .field("surface", &self.surface.as_ref().map(|s| *s.desc()))
            .finish()
    }
}

impl Layer {
    pub(crate) fn new(id: LayerId, name: String, layer_type: LayerType) -> Self {
        Self {
            id,
            name,
            layer_type,
            enabled: layer_type.default_enabled(),
            params: layer_type.default_params(),
            connections: Vec::new(),
            input_desc: None,
            surface: None,
            front: None,
        }
    }

    /// Stable id.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type tag.
    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    /// Whether the layer runs during dispatch.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current parameter block.
    pub fn params(&self) -> &LayerParams {
        &self.params
    }

    /// Upstream layers in connection order.
    pub fn connections(&self) -> &[LayerId] {
        &self.connections
    }

    /// Shape of the surface produced by the last dispatch, if allocated.
    pub fn surface_desc(&self) -> Option<SurfaceDesc> {
        self.surface.as_ref().map(|s| *s.desc())
    }

    /// Kernel run by this layer.
    pub(crate) fn kernel(&self) -> Option<KernelOp> {
        let op = match (self.layer_type, self.params) {
            (LayerType::Input, _) => return None,
            (LayerType::Output, _) => KernelOp::Copy,
            (LayerType::YuvToRgba, LayerParams::Yuv(p)) => KernelOp::YuvToRgba(p.layout),
            (LayerType::RgbaToYuv, LayerParams::Yuv(p)) => KernelOp::RgbaToYuv(p.layout),
            (LayerType::MapChannel, LayerParams::ChannelMap(map)) => KernelOp::RemapChannels(map),
            (LayerType::Resize, LayerParams::Resize(p)) => KernelOp::Resize(p.filter),
            (LayerType::Blend, LayerParams::Blend(p)) => KernelOp::Blend {
                left: p.left,
                top: p.top,
                opacity: p.opacity,
            },
            (LayerType::Operate, LayerParams::Operate(p)) => KernelOp::Operate(p),
            (LayerType::RgbToRgba, _) => KernelOp::PackedToPlanar4,
            (LayerType::RgbaToRgb, _) => KernelOp::Planar4ToPacked,
            (LayerType::ToFloat, _) => KernelOp::ToFloat,
            _ => return None,
        };
        Some(op)
    }

    /// Output shape given the shapes of the resolved inputs.
    pub(crate) fn derive_desc(&self, inputs: &[SurfaceDesc]) -> GraphResult<SurfaceDesc> {
        let name = self.name.as_str();
        if self.layer_type == LayerType::Input {
            return self
                .input_desc
                .ok_or_else(|| GraphError::NoInputDeclared(self.name.clone()));
        }
        let src = inputs
            .first()
            .copied()
            .ok_or_else(|| GraphError::DisconnectedLayer(self.name.clone()))?;
        let expect = |format: PixelFormat| -> GraphResult<()> {
            if src.format != format {
                return Err(GraphError::shape(
                    name,
                    format!("expects {format} input, got {}", src.format),
                ));
            }
            Ok(())
        };

        match (self.layer_type, self.params) {
            (LayerType::YuvToRgba, LayerParams::Yuv(p)) => {
                let (w, h) = p
                    .layout
                    .image_size(&src)
                    .map_err(|e| GraphError::shape(name, e.to_string()))?;
                Ok(SurfaceDesc::new(w, h, PixelFormat::U8C4)?)
            }
            (LayerType::RgbaToYuv, LayerParams::Yuv(p)) => {
                expect(PixelFormat::U8C4)?;
                p.layout
                    .raw_desc(src.width, src.height)
                    .map_err(|e| GraphError::shape(name, e.to_string()))
            }
            (LayerType::MapChannel, _) => {
                if src.format.channels() != 4 {
                    return Err(GraphError::shape(name, format!("expects 4 channels, got {}", src.format)));
                }
                Ok(src.with_format(src.format))
            }
            (LayerType::Resize, LayerParams::Resize(p)) => {
                if p.width == 0 || p.height == 0 {
                    Ok(src.with_format(src.format))
                } else {
                    Ok(SurfaceDesc::new(p.width, p.height, src.format)?)
                }
            }
            (LayerType::Blend, _) => {
                let overlay = inputs
                    .get(1)
                    .copied()
                    .ok_or_else(|| GraphError::DisconnectedLayer(self.name.clone()))?;
                if overlay.format != src.format {
                    return Err(GraphError::shape(
                        name,
                        format!("overlay is {}, source is {}", overlay.format, src.format),
                    ));
                }
                Ok(src.with_format(src.format))
            }
            (LayerType::RgbToRgba, _) => {
                expect(PixelFormat::U8C3)?;
                Ok(src.with_format(PixelFormat::U8C4))
            }
            (LayerType::RgbaToRgb, _) => {
                expect(PixelFormat::U8C4)?;
                Ok(src.with_format(PixelFormat::U8C3))
            }
            (LayerType::ToFloat, _) => {
                expect(PixelFormat::U8C4)?;
                Ok(src.with_format(PixelFormat::F32C4))
            }
            (LayerType::Output, _) | (LayerType::Operate, _) => Ok(src.with_format(src.format)),
            (layer_type, params) => Err(GraphError::ParameterTypeMismatch {
                layer: self.name.clone(),
                expected: layer_type.default_params().kind_name(),
                actual: params.kind_name(),
            }),
        }
    }
}
