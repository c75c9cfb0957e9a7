//! Pipeline: a layer graph behind a non-blocking lock.
//!
//! Every call takes the graph with `try_lock`. A caller that collides with
//! another configuration call or a dispatch gets [`GraphError::Busy`]
//! immediately instead of waiting.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::warn;
use vpipe_compute::{BackendKind, GpuBackend};
use vpipe_core::{PixelFormat, SurfaceDesc};

use crate::error::{GraphError, GraphResult};
use crate::graph::LayerGraph;
use crate::layer::{LayerId, LayerParams, LayerType};
use crate::sink::FrameSink;

/// Index of a pipeline within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineId(pub(crate) usize);

impl PipelineId {
    /// Registry slot index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline#{}", self.0)
    }
}

/// A layer graph bound to one backend instance.
pub struct Pipeline {
    id: PipelineId,
    kind: BackendKind,
    graph: Mutex<LayerGraph>,
    in_use: AtomicBool,
    claim: AtomicU64,
}

impl Pipeline {
    /// Creates a pipeline that is already claimed by its creator.
    pub(crate) fn new(id: PipelineId, kind: BackendKind, backend: Box<dyn GpuBackend>) -> Self {
        Self {
            id,
            kind,
            graph: Mutex::new(LayerGraph::new(backend)),
            in_use: AtomicBool::new(true),
            claim: AtomicU64::new(1),
        }
    }

    /// Registry id.
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Backend this pipeline runs on.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Whether the pipeline is held by a caller.
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Claim generation, bumped every time the registry hands the slot out.
    pub fn claim(&self) -> u64 {
        self.claim.load(Ordering::Acquire)
    }

    fn try_graph(&self, operation: &'static str) -> GraphResult<MutexGuard<'_, LayerGraph>> {
        match self.graph.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(GraphError::Busy { operation }),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!(pipeline = self.id.0, operation, "recovering poisoned pipeline lock");
                Ok(poisoned.into_inner())
            }
        }
    }

    fn lock(&self, operation: &'static str) -> GraphResult<MutexGuard<'_, LayerGraph>> {
        if !self.is_in_use() {
            return Err(GraphError::PipelineClosed(self.id.0));
        }
        self.try_graph(operation)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// See [`LayerGraph::add_layer`].
    pub fn add_layer(&self, name: &str, layer_type: LayerType) -> GraphResult<LayerId> {
        self.lock("add_layer")?.add_layer(name, layer_type)
    }

    /// See [`LayerGraph::add_layer_tagged`].
    pub fn add_layer_tagged(&self, name: &str, tag: &str) -> GraphResult<LayerId> {
        self.lock("add_layer")?.add_layer_tagged(name, tag)
    }

    /// See [`LayerGraph::remove_layer`].
    pub fn remove_layer(&self, layer: LayerId) -> GraphResult<()> {
        self.lock("remove_layer")?.remove_layer(layer)
    }

    /// See [`LayerGraph::connect`].
    pub fn connect(&self, layer: LayerId, upstream: &str) -> GraphResult<()> {
        self.lock("connect")?.connect(layer, upstream)
    }

    /// See [`LayerGraph::connect_ids`].
    pub fn connect_ids(&self, layer: LayerId, upstream: LayerId) -> GraphResult<()> {
        self.lock("connect")?.connect_ids(layer, upstream)
    }

    /// See [`LayerGraph::disconnect`].
    pub fn disconnect(&self, layer: LayerId, upstream: LayerId) -> GraphResult<bool> {
        self.lock("disconnect")?.disconnect(layer, upstream)
    }

    /// See [`LayerGraph::set_enabled`].
    pub fn set_enabled(&self, layer: LayerId, enabled: bool) -> GraphResult<()> {
        self.lock("set_enabled")?.set_enabled(layer, enabled)
    }

    /// See [`LayerGraph::update_parameter`].
    pub fn update_parameter(&self, layer: LayerId, params: LayerParams) -> GraphResult<()> {
        self.lock("update_parameter")?.update_parameter(layer, params)
    }

    /// See [`LayerGraph::set_input`].
    pub fn set_input(&self, layer: LayerId, width: u32, height: u32, format: PixelFormat) -> GraphResult<()> {
        self.lock("set_input")?.set_input(layer, width, height, format)
    }

    /// See [`LayerGraph::set_input_desc`].
    pub fn set_input_desc(&self, layer: LayerId, desc: SurfaceDesc) -> GraphResult<()> {
        self.lock("set_input")?.set_input_desc(layer, desc)
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// See [`LayerGraph::dispatch`]. A frame that collides with a
    /// configuration call is dropped with [`GraphError::Busy`].
    pub fn dispatch(&self, frame: &[u8]) -> GraphResult<()> {
        self.lock("dispatch")?.dispatch(frame)
    }

    /// See [`LayerGraph::dispatch_frames`].
    pub fn dispatch_frames(&self, frames: &[(LayerId, &[u8])]) -> GraphResult<()> {
        self.lock("dispatch")?.dispatch_frames(frames)
    }

    /// See [`LayerGraph::read_output`].
    pub fn read_output(&self, layer: LayerId) -> GraphResult<Vec<u8>> {
        self.lock("read_output")?.read_output(layer)
    }

    /// See [`LayerGraph::output_desc`].
    pub fn output_desc(&self, layer: LayerId) -> GraphResult<SurfaceDesc> {
        self.lock("read_output")?.output_desc(layer)
    }

    /// Reads back an output layer and hands the frame to `sink`.
    ///
    /// The lock is released before the sink runs.
    pub fn deliver(&self, layer: LayerId, sink: &mut dyn FrameSink) -> GraphResult<()> {
        let (desc, bytes) = {
            let graph = self.lock("deliver")?;
            (graph.output_desc(layer)?, graph.read_output(layer)?)
        };
        sink.consume(&desc, &bytes)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Runs `f` with shared access to the graph.
    pub fn inspect<R>(&self, f: impl FnOnce(&LayerGraph) -> R) -> GraphResult<R> {
        let graph = self.lock("inspect")?;
        Ok(f(&graph))
    }

    /// See [`LayerGraph::layer_id`].
    pub fn layer_id(&self, name: &str) -> GraphResult<Option<LayerId>> {
        self.inspect(|g| g.layer_id(name))
    }

    /// See [`LayerGraph::execution_order`].
    pub fn execution_order(&self) -> GraphResult<Vec<LayerId>> {
        self.inspect(|g| g.execution_order().to_vec())
    }

    /// True when the graph holds no layers.
    ///
    /// A graph locked by someone else is reported as non-empty.
    pub fn is_empty(&self) -> bool {
        self.try_graph("is_empty").map(|g| g.is_empty()).unwrap_or(false)
    }

    // ========================================================================
    // Lifecycle (registry only)
    // ========================================================================

    /// Claims an idle, empty pipeline for reuse and returns the new generation.
    pub(crate) fn try_claim(&self) -> Option<u64> {
        let graph = self.try_graph("claim").ok()?;
        if !graph.is_empty() {
            return None;
        }
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(self.claim.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Clears the graph and marks the slot idle.
    pub(crate) fn close(&self) -> GraphResult<()> {
        self.try_graph("release")?.close();
        self.in_use.store(false, Ordering::Release);
        Ok(())
    }

    /// Closes only if `claim` is still the live generation.
    ///
    /// Returns false when the slot was released or handed to someone else.
    pub(crate) fn close_claim(&self, claim: u64) -> GraphResult<bool> {
        let mut graph = self.try_graph("release")?;
        if !self.is_in_use() || self.claim() != claim {
            return Ok(false);
        }
        graph.close();
        self.in_use.store(false, Ordering::Release);
        Ok(true)
    }

    /// Clears the graph, waiting for any in-flight call.
    pub(crate) fn close_blocking(&self) {
        let mut graph = match self.graph.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(pipeline = self.id.0, "recovering poisoned pipeline lock");
                poisoned.into_inner()
            }
        };
        graph.close();
        self.in_use.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("in_use", &self.is_in_use())
            .field("claim", &self.claim())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpipe_compute::create_backend;

    fn pipeline() -> Pipeline {
        let backend = create_backend(BackendKind::Cpu, None).unwrap();
        Pipeline::new(PipelineId(0), BackendKind::Cpu, backend)
    }

    #[test]
    fn test_nested_call_is_busy() {
        let p = pipeline();
        let err = p
            .inspect(|_| p.add_layer("input", LayerType::Input).unwrap_err())
            .unwrap();
        assert!(err.is_busy());
    }

    #[test]
    fn test_closed_pipeline_rejects_calls() {
        let p = pipeline();
        p.add_layer("input", LayerType::Input).unwrap();
        p.close().unwrap();
        assert!(p.is_empty());
        assert!(matches!(p.add_layer("x", LayerType::Input), Err(GraphError::PipelineClosed(0))));
        assert_eq!(p.try_claim(), Some(2));
        assert_eq!(p.try_claim(), None);
    }

    #[test]
    fn test_stale_claim_does_not_close() {
        let p = pipeline();
        assert_eq!(p.claim(), 1);
        p.close().unwrap();
        let fresh = p.try_claim().unwrap();
        p.add_layer("input", LayerType::Input).unwrap();

        assert!(!p.close_claim(1).unwrap());
        assert!(p.is_in_use());
        assert!(!p.is_empty());

        assert!(p.close_claim(fresh).unwrap());
        assert!(!p.is_in_use());
        assert!(p.is_empty());
    }

    #[test]
    fn test_claim_skips_non_empty() {
        let p = pipeline();
        p.add_layer("input", LayerType::Input).unwrap();
        p.in_use.store(false, Ordering::Release);
        assert_eq!(p.try_claim(), None);
    }

    #[test]
    fn test_deliver_to_closure() {
        let p = pipeline();
        let input = p.add_layer("input", LayerType::Input).unwrap();
        let output = p.add_layer("output", LayerType::Output).unwrap();
        p.connect(output, "input").unwrap();
        p.set_input(input, 2, 2, PixelFormat::U8C4).unwrap();
        p.dispatch(&[9u8; 16]).unwrap();

        let mut seen = Vec::new();
        let mut sink = |desc: &SurfaceDesc, bytes: &[u8]| -> GraphResult<()> {
            seen.push((desc.width, desc.height, bytes.len()));
            Ok(())
        };
        p.deliver(output, &mut sink).unwrap();
        assert_eq!(seen, vec![(2, 2, 16)]);
    }
}
