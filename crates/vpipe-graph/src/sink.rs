//! Readback boundary towards capture/encode collaborators.

use vpipe_core::SurfaceDesc;

use crate::error::GraphResult;

/// Consumer of completed output frames.
///
/// Receives tightly packed host bytes together with the shape they were
/// produced at. Closures of the matching signature are sinks too.
pub trait FrameSink {
    /// Takes one completed frame.
    fn consume(&mut self, desc: &SurfaceDesc, bytes: &[u8]) -> GraphResult<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&SurfaceDesc, &[u8]) -> GraphResult<()>,
{
    fn consume(&mut self, desc: &SurfaceDesc, bytes: &[u8]) -> GraphResult<()> {
        self(desc, bytes)
    }
}
