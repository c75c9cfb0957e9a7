//! Layer graph: topology, bypass resolution and frame dispatch.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::mem;

use tracing::{debug, trace, warn};
use vpipe_compute::{GpuBackend, SurfaceHandle};
use vpipe_core::{PixelFormat, SurfaceDesc};

use crate::error::{GraphError, GraphResult};
use crate::layer::{Layer, LayerId, LayerParams, LayerType};

/// A set of layers bound to one backend.
///
/// Layers are addressed by [`LayerId`], an index that is never reused while
/// the graph is open. Removed layers leave a tombstone.
///
/// # Example
///
/// ```
/// use vpipe_compute::{create_backend, BackendKind};
/// use vpipe_core::{PixelFormat, YuvLayout};
/// use vpipe_graph::{LayerGraph, LayerParams, LayerType, YuvParams};
///
/// let backend = create_backend(BackendKind::Cpu, None).unwrap();
/// let mut graph = LayerGraph::new(backend);
/// let input = graph.add_layer("input", LayerType::Input).unwrap();
/// let convert = graph.add_layer("yuv2rgba", LayerType::YuvToRgba).unwrap();
/// let output = graph.add_layer("output", LayerType::Output).unwrap();
/// graph.connect(convert, "input").unwrap();
/// graph.connect(output, "yuv2rgba").unwrap();
/// graph
///     .update_parameter(convert, LayerParams::Yuv(YuvParams { layout: YuvLayout::Uyvy }))
///     .unwrap();
/// graph.set_input(input, 2, 2, PixelFormat::U8C4).unwrap();
///
/// // 2x2 macropixels hold a 4x2 image
/// graph.dispatch(&[128u8; 16]).unwrap();
/// assert_eq!(graph.read_output(output).unwrap().len(), 4 * 4 * 2);
/// ```
pub struct LayerGraph {
    backend: Box<dyn GpuBackend>,
    layers: Vec<Option<Layer>>,
    /// Topological order of live layers, refreshed on every edge change.
    order: Vec<LayerId>,
    frames: u64,
}

/// One enabled layer prepared for a frame.
struct Step {
    id: LayerId,
    inputs: Vec<LayerId>,
    desc: SurfaceDesc,
}

impl LayerGraph {
    /// Creates an empty graph running on `backend`.
    pub fn new(backend: Box<dyn GpuBackend>) -> Self {
        Self {
            backend,
            layers: Vec::new(),
            order: Vec::new(),
            frames: 0,
        }
    }

    /// Backend the graph launches kernels on.
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    // ========================================================================
    // Layers
    // ========================================================================

    /// Appends a layer and returns its id.
    pub fn add_layer(&mut self, name: &str, layer_type: LayerType) -> GraphResult<LayerId> {
        if self.layer_id(name).is_some() {
            return Err(GraphError::DuplicateLayer(name.to_string()));
        }
        let id = LayerId(self.layers.len());
        self.layers.push(Some(Layer::new(id, name.to_string(), layer_type)));
        self.refresh_order();
        debug!(layer = %name, id = id.0, kind = %layer_type, "layer added");
        Ok(id)
    }

    /// Appends a layer whose type is given by tag (see [`LayerType::tag`]).
    pub fn add_layer_tagged(&mut self, name: &str, tag: &str) -> GraphResult<LayerId> {
        let layer_type = tag.parse::<LayerType>()?;
        self.add_layer(name, layer_type)
    }

    /// Removes a layer and every edge that references it.
    ///
    /// The id stays reserved until [`close`](Self::close).
    pub fn remove_layer(&mut self, id: LayerId) -> GraphResult<()> {
        let layer = self
            .layers
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| GraphError::UnknownLayer(id.to_string()))?;
        for other in self.layers.iter_mut().flatten() {
            other.connections.retain(|&up| up != id);
        }
        debug!(layer = %layer.name, id = id.0, "layer removed");
        self.release_surfaces(layer);
        self.refresh_order();
        Ok(())
    }

    /// Looks up a layer id by name.
    pub fn layer_id(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().flatten().find(|l| l.name == name).map(|l| l.id)
    }

    /// Returns a layer by id.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0).and_then(Option::as_ref)
    }

    /// Live layers in id order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().flatten()
    }

    /// Number of live layers.
    pub fn len(&self) -> usize {
        self.layers().count()
    }

    /// True once every layer has been removed or the graph was closed.
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Option::is_none)
    }

    /// Frames completed since the graph was created.
    pub fn frames_dispatched(&self) -> u64 {
        self.frames
    }

    fn get(&self, id: LayerId) -> GraphResult<&Layer> {
        self.layer(id).ok_or_else(|| GraphError::UnknownLayer(id.to_string()))
    }

    fn get_mut(&mut self, id: LayerId) -> GraphResult<&mut Layer> {
        self.layers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| GraphError::UnknownLayer(id.to_string()))
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Makes `layer` read from the layer named `upstream`.
    pub fn connect(&mut self, layer: LayerId, upstream: &str) -> GraphResult<()> {
        let up = self
            .layer_id(upstream)
            .ok_or_else(|| GraphError::UnknownLayer(upstream.to_string()))?;
        self.connect_ids(layer, up)
    }

    /// Makes `layer` read from `upstream`.
    ///
    /// Connections are appended in call order; a repeated edge is ignored.
    pub fn connect_ids(&mut self, layer: LayerId, upstream: LayerId) -> GraphResult<()> {
        let up_name = self.get(upstream)?.name.clone();
        let target = self.get(layer)?;

        if target.layer_type == LayerType::Input {
            return Err(GraphError::InvalidConnection {
                layer: target.name.clone(),
                reason: "input layers have no upstream".into(),
            });
        }
        if target.connections.contains(&upstream) {
            return Ok(());
        }
        if layer == upstream || self.reaches(upstream, layer) {
            return Err(GraphError::CycleDetected {
                layer: target.name.clone(),
                upstream: up_name,
            });
        }
        let limit = target.layer_type.input_count();
        if target.connections.len() >= limit {
            return Err(GraphError::InvalidConnection {
                layer: target.name.clone(),
                reason: format!("{} accepts {limit} upstream connection(s)", target.layer_type),
            });
        }

        let target = self.get_mut(layer)?;
        target.connections.push(upstream);
        debug!(layer = %target.name, upstream = %up_name, "connected");
        self.refresh_order();
        Ok(())
    }

    /// Removes the edge `upstream -> layer`. Returns whether it existed.
    pub fn disconnect(&mut self, layer: LayerId, upstream: LayerId) -> GraphResult<bool> {
        let target = self.get_mut(layer)?;
        let before = target.connections.len();
        target.connections.retain(|&up| up != upstream);
        let removed = target.connections.len() != before;
        if removed {
            debug!(layer = %target.name, upstream = upstream.0, "disconnected");
            self.refresh_order();
        }
        Ok(removed)
    }

    /// Whether `ancestor` is reachable by walking upstream from `from`.
    fn reaches(&self, from: LayerId, ancestor: LayerId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.layers.len()];
        while let Some(id) = stack.pop() {
            if id == ancestor {
                return true;
            }
            if mem::replace(&mut seen[id.0], true) {
                continue;
            }
            if let Some(layer) = self.layer(id) {
                stack.extend(layer.connections.iter().copied());
            }
        }
        false
    }

    /// Kahn's algorithm, ties broken by ascending id.
    fn refresh_order(&mut self) {
        let n = self.layers.len();
        let mut indegree = vec![0usize; n];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
        for layer in self.layers.iter().flatten() {
            indegree[layer.id.0] = layer.connections.len();
            for up in &layer.connections {
                downstream[up.0].push(layer.id.0);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = self
            .layers
            .iter()
            .flatten()
            .filter(|l| indegree[l.id.0] == 0)
            .map(|l| Reverse(l.id.0))
            .collect();

        self.order.clear();
        while let Some(Reverse(idx)) = ready.pop() {
            self.order.push(LayerId(idx));
            for &down in &downstream[idx] {
                indegree[down] -= 1;
                if indegree[down] == 0 {
                    ready.push(Reverse(down));
                }
            }
        }
        trace!(order = ?self.order, "execution order refreshed");
    }

    /// Live layers in the order dispatch visits them.
    pub fn execution_order(&self) -> &[LayerId] {
        &self.order
    }

    /// Nearest enabled layer at or above `id`, depth-first in connection order.
    fn resolve_source(&self, id: LayerId) -> Option<LayerId> {
        let layer = self.layer(id)?;
        if layer.enabled {
            return Some(id);
        }
        layer.connections.iter().find_map(|&up| self.resolve_source(up))
    }

    /// Enabled layers feeding each input slot of `layer`.
    pub fn resolved_inputs(&self, layer: LayerId) -> GraphResult<Vec<LayerId>> {
        let target = self.get(layer)?;
        (0..target.layer_type.input_count())
            .map(|slot| {
                target
                    .connections
                    .get(slot)
                    .and_then(|&up| self.resolve_source(up))
                    .ok_or_else(|| GraphError::DisconnectedLayer(target.name.clone()))
            })
            .collect()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Toggles whether a layer runs during dispatch.
    ///
    /// Downstream layers reading a disabled layer fall back to its nearest
    /// enabled ancestor.
    pub fn set_enabled(&mut self, id: LayerId, enabled: bool) -> GraphResult<()> {
        let layer = self.get_mut(id)?;
        if layer.enabled != enabled {
            layer.enabled = enabled;
            debug!(layer = %layer.name, enabled, "layer toggled");
        }
        Ok(())
    }

    /// Replaces a layer's parameter block. Takes effect on the next dispatch.
    pub fn update_parameter(&mut self, id: LayerId, params: LayerParams) -> GraphResult<()> {
        let layer = self.get_mut(id)?;
        let expected = layer.layer_type.default_params();
        if mem::discriminant(&expected) != mem::discriminant(&params) {
            return Err(GraphError::ParameterTypeMismatch {
                layer: layer.name.clone(),
                expected: expected.kind_name(),
                actual: params.kind_name(),
            });
        }
        params.validate(&layer.name)?;
        layer.params = params;
        debug!(layer = %layer.name, ?params, "parameters updated");
        Ok(())
    }

    /// Declares the raw shape an input layer will receive.
    ///
    /// Derived surfaces are reallocated on the next dispatch.
    pub fn set_input(&mut self, id: LayerId, width: u32, height: u32, format: PixelFormat) -> GraphResult<()> {
        let desc = SurfaceDesc::new(width, height, format)?;
        self.set_input_desc(id, desc)
    }

    /// Like [`set_input`](Self::set_input) with an explicit (possibly padded) shape.
    pub fn set_input_desc(&mut self, id: LayerId, desc: SurfaceDesc) -> GraphResult<()> {
        let layer = self.get_mut(id)?;
        if layer.layer_type != LayerType::Input {
            return Err(GraphError::InvalidParameter {
                layer: layer.name.clone(),
                reason: format!("{} layers take no input shape", layer.layer_type),
            });
        }
        if layer.input_desc != Some(desc) {
            debug!(layer = %layer.name, %desc, "input declared");
            layer.input_desc = Some(desc);
        }
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Runs one frame, uploading `frame` into every enabled input layer.
    pub fn dispatch(&mut self, frame: &[u8]) -> GraphResult<()> {
        let inputs: Vec<LayerId> = self
            .layers()
            .filter(|l| l.layer_type == LayerType::Input && l.enabled)
            .map(|l| l.id)
            .collect();
        let frames: Vec<(LayerId, &[u8])> = inputs.into_iter().map(|id| (id, frame)).collect();
        self.dispatch_frames(&frames)
    }

    /// Runs one frame with a separate buffer per input layer.
    ///
    /// Input layers without a buffer keep their last uploaded contents. On
    /// error no output layer changes what [`read_output`](Self::read_output)
    /// returns.
    pub fn dispatch_frames(&mut self, frames: &[(LayerId, &[u8])]) -> GraphResult<()> {
        let result = self.run_frame(frames);
        match &result {
            Ok(()) => {
                self.frames += 1;
                trace!(frame = self.frames, "frame committed");
            }
            Err(e) => warn!(error = %e, "frame dropped"),
        }
        result
    }

    fn run_frame(&mut self, frames: &[(LayerId, &[u8])]) -> GraphResult<()> {
        let plan = self.plan()?;

        for &(id, bytes) in frames {
            let layer = self.get(id)?;
            if layer.layer_type != LayerType::Input {
                return Err(GraphError::InvalidParameter {
                    layer: layer.name.clone(),
                    reason: "frames can only be supplied to input layers".into(),
                });
            }
            let desc = layer
                .input_desc
                .ok_or_else(|| GraphError::NoInputDeclared(layer.name.clone()))?;
            if bytes.len() != desc.packed_len() && bytes.len() != desc.byte_len() {
                return Err(GraphError::InputSizeMismatch {
                    expected: desc.packed_len(),
                    actual: bytes.len(),
                });
            }
        }

        self.allocate(&plan)?;

        for &(id, bytes) in frames {
            let Some(layer) = self.layers.get_mut(id.0).and_then(Option::as_mut) else {
                continue;
            };
            if !layer.enabled {
                continue;
            }
            let name = layer.name.clone();
            let Some(surface) = layer.surface.as_deref_mut() else {
                continue;
            };
            self.backend
                .upload(surface, bytes)
                .map_err(|e| GraphError::execution(&name, e))?;
        }

        for step in plan.iter().filter(|s| !s.inputs.is_empty()) {
            self.launch(step)?;
        }

        for step in &plan {
            if let Some(layer) = self.layers.get_mut(step.id.0).and_then(Option::as_mut) {
                if layer.layer_type == LayerType::Output {
                    mem::swap(&mut layer.surface, &mut layer.front);
                }
            }
        }
        Ok(())
    }

    /// Resolves inputs and output shapes of every enabled layer.
    fn plan(&self) -> GraphResult<Vec<Step>> {
        let mut descs: HashMap<LayerId, SurfaceDesc> = HashMap::new();
        let mut plan = Vec::new();
        for &id in &self.order {
            let layer = self.get(id)?;
            if !layer.enabled {
                continue;
            }
            let inputs = self.resolved_inputs(id)?;
            let input_descs = inputs
                .iter()
                .map(|up| {
                    descs
                        .get(up)
                        .copied()
                        .ok_or_else(|| GraphError::DisconnectedLayer(layer.name.clone()))
                })
                .collect::<GraphResult<Vec<_>>>()?;
            let desc = layer.derive_desc(&input_descs)?;
            descs.insert(id, desc);
            plan.push(Step { id, inputs, desc });
        }
        Ok(plan)
    }

    /// Reallocates surfaces whose shape no longer matches the plan.
    fn allocate(&mut self, plan: &[Step]) -> GraphResult<()> {
        for step in plan {
            let current = self.get(step.id)?.surface.as_ref().map(|s| *s.desc());
            if current == Some(step.desc) {
                continue;
            }
            let layer = self.get_mut(step.id)?;
            let stale = layer.surface.take();
            let name = layer.name.clone();
            if let Some(stale) = stale {
                self.backend.free_surface(stale);
            }
            let surface = self
                .backend
                .allocate_surface(step.desc)
                .map_err(|e| GraphError::resource(&name, e))?;
            debug!(layer = %name, desc = %step.desc, "surface allocated");
            self.get_mut(step.id)?.surface = Some(surface);
        }
        Ok(())
    }

    fn launch(&mut self, step: &Step) -> GraphResult<()> {
        let layer = self.get_mut(step.id)?;
        let name = layer.name.clone();
        let op = layer.kernel().ok_or_else(|| GraphError::ParameterTypeMismatch {
            layer: name.clone(),
            expected: layer.layer_type.default_params().kind_name(),
            actual: layer.params.kind_name(),
        })?;
        let mut output = layer
            .surface
            .take()
            .ok_or_else(|| GraphError::NoFrame(name.clone()))?;

        let result = step
            .inputs
            .iter()
            .map(|&up| self.surface_of(up))
            .collect::<GraphResult<Vec<&dyn SurfaceHandle>>>()
            .and_then(|inputs| {
                trace!(layer = %name, op = op.name(), "launch");
                self.backend
                    .launch(&op, &inputs, &mut *output)
                    .map_err(|e| GraphError::execution(&name, e))
            });

        self.get_mut(step.id)?.surface = Some(output);
        result
    }

    fn surface_of(&self, id: LayerId) -> GraphResult<&dyn SurfaceHandle> {
        let layer = self.get(id)?;
        layer
            .surface
            .as_deref()
            .ok_or_else(|| GraphError::NoFrame(layer.name.clone()))
    }

    // ========================================================================
    // Readback
    // ========================================================================

    fn committed(&self, id: LayerId) -> GraphResult<&dyn SurfaceHandle> {
        let layer = self.get(id)?;
        if layer.layer_type != LayerType::Output {
            return Err(GraphError::InvalidParameter {
                layer: layer.name.clone(),
                reason: "only output layers can be read back".into(),
            });
        }
        if !layer.enabled {
            return Err(GraphError::LayerDisabled(layer.name.clone()));
        }
        layer
            .front
            .as_deref()
            .ok_or_else(|| GraphError::NoFrame(layer.name.clone()))
    }

    /// Shape of the last completed frame of an output layer.
    pub fn output_desc(&self, id: LayerId) -> GraphResult<SurfaceDesc> {
        Ok(*self.committed(id)?.desc())
    }

    /// Downloads the last completed frame of an output layer as packed bytes.
    pub fn read_output(&self, id: LayerId) -> GraphResult<Vec<u8>> {
        let surface = self.committed(id)?;
        let name = &self.get(id)?.name;
        self.backend
            .download(surface)
            .map_err(|e| GraphError::execution(name, e))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    fn release_surfaces(&self, mut layer: Layer) {
        for surface in [layer.surface.take(), layer.front.take()].into_iter().flatten() {
            self.backend.free_surface(surface);
        }
    }

    /// Frees every surface and drops every layer. Idempotent.
    ///
    /// The graph stays usable; ids restart from zero.
    pub fn close(&mut self) {
        if self.layers.is_empty() {
            return;
        }
        let layers = mem::take(&mut self.layers);
        let count = layers.iter().flatten().count();
        for layer in layers.into_iter().flatten() {
            self.release_surfaces(layer);
        }
        self.order.clear();
        debug!(layers = count, "graph closed");
    }
}

impl Drop for LayerGraph {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LayerGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerGraph")
            .field("backend", &self.backend.name())
            .field("layers", &self.layers().collect::<Vec<_>>())
            .field("order", &self.order)
            .field("frames", &self.frames)
            .finish()
    }
}
