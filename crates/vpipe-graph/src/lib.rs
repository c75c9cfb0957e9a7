//! Layer graph engine for the vpipe frame pipeline.
//!
//! - [`LayerGraph`]: layers, connections, bypass-chaining and dispatch
//! - [`Pipeline`]: a graph behind a try-lock, identified by [`PipelineId`]
//! - [`PipelineRegistry`]: creates pipelines per backend and recycles idle slots
//! - [`VideoFormatPipeline`]: fixed capture-to-RGBA chain
//!
//! # Example
//!
//! ```
//! use vpipe_compute::BackendKind;
//! use vpipe_graph::{PipelineRegistry, VideoFormatPipeline, VideoType};
//! use vpipe_core::ChannelMap;
//!
//! let registry = PipelineRegistry::new();
//! let mut video = VideoFormatPipeline::new(&registry, BackendKind::Cpu).unwrap();
//! video.set_video_format(VideoType::Uyvy, 4, 2).unwrap();
//! video.set_output_channels(ChannelMap::identity()).unwrap();
//!
//! video.run(&[128u8; 16]).unwrap();
//! let rgba = video.read_output().unwrap();
//! assert_eq!(rgba.len(), 4 * 2 * 4);
//! ```

pub mod error;
pub mod graph;
pub mod layer;
pub mod pipeline;
pub mod registry;
pub mod sink;
pub mod video;

pub use error::{ErrorKind, GraphError, GraphResult};
pub use graph::LayerGraph;
pub use layer::{BlendParams, Layer, LayerId, LayerParams, LayerType, ResizeParams, YuvParams};
pub use pipeline::{Pipeline, PipelineId};
pub use registry::{PipelineRegistry, RegistryBuilder, RegistryConfig};
pub use sink::FrameSink;
pub use video::{VideoFormatPipeline, VideoType};

pub use vpipe_compute::{BackendKind, OperateParams, ResizeFilter};
