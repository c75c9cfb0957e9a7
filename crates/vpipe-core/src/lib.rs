//! # vpipe-core
//!
//! Core types for the vpipe frame pipeline.
//!
//! - [`PixelFormat`] - element type and channel count of a surface
//! - [`YuvLayout`] - luma/chroma arrangement of raw capture frames
//! - [`SurfaceDesc`] - immutable surface shape (size, stride, format)
//! - [`ImageView`], [`ImageViewMut`], [`Texel`] - borrowed pixel views used by kernels
//! - [`ChannelMap`] - per-pixel channel reordering
//!
//! ## Crate Structure
//!
//! ```text
//! vpipe-core (this crate)
//!    ^
//!    |
//!    +-- vpipe-compute (kernels, backends)
//!    +-- vpipe-graph (layer graph, pipelines, registry)
//!    +-- vpipe-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod error;
pub mod format;
pub mod surface;
pub mod view;

pub use channel::ChannelMap;
pub use error::*;
pub use format::{PixelFormat, YuvLayout};
pub use surface::SurfaceDesc;
pub use view::{ImageView, ImageViewMut, Texel};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::channel::ChannelMap;
    pub use crate::error::{CoreResult, Error};
    pub use crate::format::{PixelFormat, YuvLayout};
    pub use crate::surface::SurfaceDesc;
    pub use crate::view::{ImageView, ImageViewMut, Texel};
}
