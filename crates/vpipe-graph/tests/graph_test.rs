//! LayerGraph behaviour: topology, bypass, errors and end-to-end conversion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vpipe_compute::{
    create_backend, BackendKind, ComputeError, ComputeResult, CpuBackend, GpuBackend, GpuLimits, KernelOp,
    SurfaceHandle,
};
use vpipe_core::{ChannelMap, PixelFormat, SurfaceDesc, YuvLayout};
use vpipe_graph::{
    BlendParams, GraphError, LayerGraph, LayerId, LayerParams, LayerType, OperateParams, ResizeFilter, ResizeParams,
    YuvParams,
};

fn cpu_graph() -> LayerGraph {
    LayerGraph::new(create_backend(BackendKind::Cpu, None).unwrap())
}

/// 4x4 RGBA frame with distinct pixels.
fn gradient() -> Vec<u8> {
    (0..16u8)
        .flat_map(|i| [i * 10, 200 - i * 5, i * 3 + 40, 255])
        .collect()
}

/// input -> operate(flip x) -> map channel(bgra) -> output
fn chain(graph: &mut LayerGraph) -> [LayerId; 4] {
    let input = graph.add_layer("input", LayerType::Input).unwrap();
    let operate = graph.add_layer("operate", LayerType::Operate).unwrap();
    let map = graph.add_layer("map", LayerType::MapChannel).unwrap();
    let output = graph.add_layer("output", LayerType::Output).unwrap();
    graph.connect(operate, "input").unwrap();
    graph.connect(map, "operate").unwrap();
    graph.connect(output, "map").unwrap();
    graph
        .update_parameter(operate, LayerParams::Operate(OperateParams { flip_x: true, ..Default::default() }))
        .unwrap();
    graph.update_parameter(map, LayerParams::ChannelMap(ChannelMap::bgra())).unwrap();
    graph.set_input(input, 4, 4, PixelFormat::U8C4).unwrap();
    [input, operate, map, output]
}

// ============================================================================
// Topology
// ============================================================================

#[test]
fn test_cycle_rejected_topology_intact() {
    let mut g = cpu_graph();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    let a = g.add_layer("a", LayerType::Operate).unwrap();
    let b = g.add_layer("b", LayerType::Operate).unwrap();
    g.connect(b, "a").unwrap();

    let order_before = g.execution_order().to_vec();
    let err = g.connect(a, "b").unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));
    assert!(err.is_configuration());
    assert_eq!(g.execution_order(), order_before.as_slice());
    assert!(g.layer(a).unwrap().connections().is_empty());
    assert_eq!(g.layer(b).unwrap().connections(), &[a]);

    // Non-cyclic edge still accepted afterwards.
    g.connect(a, "input").unwrap();
    assert_eq!(g.execution_order(), &[input, a, b]);
}

#[test]
fn test_order_ties_by_ascending_index() {
    let mut g = cpu_graph();
    let late = g.add_layer("late", LayerType::Operate).unwrap();
    let solo = g.add_layer("solo", LayerType::Input).unwrap();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    g.connect(late, "input").unwrap();
    assert_eq!(g.execution_order(), &[solo, input, late]);
}

#[test]
fn test_unknown_type_tag() {
    let mut g = cpu_graph();
    assert!(matches!(g.add_layer_tagged("x", "sharpen"), Err(GraphError::InvalidType(_))));
    let id = g.add_layer_tagged("map", "mapchannel").unwrap();
    assert_eq!(g.layer(id).unwrap().layer_type(), LayerType::MapChannel);
}

// ============================================================================
// Bypass
// ============================================================================

#[test]
fn test_disable_and_reenable_restores_output() {
    let mut g = cpu_graph();
    let [_, operate, map, output] = chain(&mut g);
    let frame = gradient();

    g.dispatch(&frame).unwrap();
    let baseline = g.read_output(output).unwrap();

    g.set_enabled(map, false).unwrap();
    g.dispatch(&frame).unwrap();
    let bypassed = g.read_output(output).unwrap();
    assert_ne!(bypassed, baseline);

    g.set_enabled(map, true).unwrap();
    g.dispatch(&frame).unwrap();
    assert_eq!(g.read_output(output).unwrap(), baseline);

    // Disabling the mid-chain stage routes map straight to the input.
    g.set_enabled(operate, false).unwrap();
    g.dispatch(&frame).unwrap();
    let unflipped = g.read_output(output).unwrap();
    for (src, out) in frame.chunks_exact(4).zip(unflipped.chunks_exact(4)) {
        assert_eq!([src[2], src[1], src[0], src[3]], [out[0], out[1], out[2], out[3]]);
    }
}

#[test]
fn test_bypass_walks_several_disabled_layers() {
    let mut g = cpu_graph();
    let [input, operate, map, output] = chain(&mut g);
    g.set_enabled(operate, false).unwrap();
    g.set_enabled(map, false).unwrap();
    assert_eq!(g.resolved_inputs(output).unwrap(), vec![input]);

    let frame = gradient();
    g.dispatch(&frame).unwrap();
    assert_eq!(g.read_output(output).unwrap(), frame);
}

#[test]
fn test_disconnected_layer() {
    let mut g = cpu_graph();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    g.add_layer("output", LayerType::Output).unwrap();
    g.set_input(input, 2, 2, PixelFormat::U8C4).unwrap();
    let err = g.dispatch(&[0u8; 16]).unwrap_err();
    assert!(matches!(err, GraphError::DisconnectedLayer(ref name) if name == "output"));
}

#[test]
fn test_disabled_input_disconnects_downstream() {
    let mut g = cpu_graph();
    let [input, operate, _, _] = chain(&mut g);
    g.set_enabled(input, false).unwrap();
    assert!(matches!(g.resolved_inputs(operate), Err(GraphError::DisconnectedLayer(_))));
    assert!(matches!(g.dispatch(&gradient()), Err(GraphError::DisconnectedLayer(_))));
}

// ============================================================================
// Parameters and readback
// ============================================================================

#[test]
fn test_parameter_type_mismatch_keeps_params() {
    let mut g = cpu_graph();
    let [_, _, map, _] = chain(&mut g);
    let err = g
        .update_parameter(map, LayerParams::Blend(BlendParams::default()))
        .unwrap_err();
    assert!(matches!(err, GraphError::ParameterTypeMismatch { .. }));
    assert_eq!(*g.layer(map).unwrap().params(), LayerParams::ChannelMap(ChannelMap::bgra()));
}

#[test]
fn test_readback_states() {
    let mut g = cpu_graph();
    let [_, operate, _, output] = chain(&mut g);
    assert!(matches!(g.read_output(output), Err(GraphError::NoFrame(_))));
    assert!(matches!(g.read_output(operate), Err(GraphError::InvalidParameter { .. })));

    g.dispatch(&gradient()).unwrap();
    assert_eq!(g.output_desc(output).unwrap(), SurfaceDesc::new(4, 4, PixelFormat::U8C4).unwrap());

    g.set_enabled(output, false).unwrap();
    assert!(matches!(g.read_output(output), Err(GraphError::LayerDisabled(_))));
}

#[test]
fn test_frame_size_mismatch() {
    let mut g = cpu_graph();
    chain(&mut g);
    let err = g.dispatch(&[0u8; 10]).unwrap_err();
    assert!(matches!(err, GraphError::InputSizeMismatch { expected: 64, actual: 10 }));
}

#[test]
fn test_set_input_reallocates_lazily() {
    let mut g = cpu_graph();
    let [input, _, _, output] = chain(&mut g);
    g.dispatch(&gradient()).unwrap();

    g.set_input(input, 2, 2, PixelFormat::U8C4).unwrap();
    g.set_input(input, 8, 2, PixelFormat::U8C4).unwrap();
    // Nothing dispatched yet: readback still shows the previous frame.
    assert_eq!(g.output_desc(output).unwrap().width, 4);

    g.dispatch(&[1u8; 8 * 2 * 4]).unwrap();
    let desc = g.output_desc(output).unwrap();
    assert_eq!((desc.width, desc.height), (8, 2));
}

#[test]
fn test_resize_layer() {
    let mut g = cpu_graph();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    let resize = g.add_layer("resize", LayerType::Resize).unwrap();
    let output = g.add_layer("output", LayerType::Output).unwrap();
    g.connect(resize, "input").unwrap();
    g.connect(output, "resize").unwrap();
    g.set_input(input, 4, 4, PixelFormat::U8C4).unwrap();
    let params = ResizeParams { width: 2, height: 2, filter: ResizeFilter::Nearest };
    g.update_parameter(resize, LayerParams::Resize(params)).unwrap();

    g.dispatch(&[50u8; 64]).unwrap();
    let desc = g.output_desc(output).unwrap();
    assert_eq!((desc.width, desc.height), (2, 2));
    assert!(g.read_output(output).unwrap().iter().all(|&v| v == 50));
}

#[test]
fn test_blend_layer_with_two_inputs() {
    let mut g = cpu_graph();
    let source = g.add_layer("source", LayerType::Input).unwrap();
    let overlay = g.add_layer("overlay", LayerType::Input).unwrap();
    let blend = g.add_layer("blend", LayerType::Blend).unwrap();
    let output = g.add_layer("output", LayerType::Output).unwrap();
    g.connect(blend, "source").unwrap();
    g.connect(blend, "overlay").unwrap();
    g.connect(output, "blend").unwrap();
    g.set_input(source, 4, 4, PixelFormat::U8C4).unwrap();
    g.set_input(overlay, 2, 2, PixelFormat::U8C4).unwrap();
    let params = BlendParams { left: 1, top: 1, opacity: 0.0 };
    g.update_parameter(blend, LayerParams::Blend(params)).unwrap();

    let src = vec![10u8; 64];
    let over = vec![200u8; 16];
    g.dispatch_frames(&[(source, &src), (overlay, &over)]).unwrap();

    let out = g.read_output(output).unwrap();
    for y in 0..4usize {
        for x in 0..4usize {
            let inside = (1..3).contains(&x) && (1..3).contains(&y);
            let expected = if inside { 200 } else { 10 };
            assert_eq!(out[(y * 4 + x) * 4], expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_rgba_yuv_round_trip_through_graph() {
    let mut g = cpu_graph();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    let encode = g.add_layer("rgba2yuv", LayerType::RgbaToYuv).unwrap();
    let decode = g.add_layer("yuv2rgba", LayerType::YuvToRgba).unwrap();
    let output = g.add_layer("output", LayerType::Output).unwrap();
    g.connect(encode, "input").unwrap();
    g.connect(decode, "rgba2yuv").unwrap();
    g.connect(output, "yuv2rgba").unwrap();
    let yuv = LayerParams::Yuv(YuvParams { layout: YuvLayout::Nv12 });
    g.update_parameter(encode, yuv).unwrap();
    g.update_parameter(decode, yuv).unwrap();
    g.set_input(input, 4, 4, PixelFormat::U8C4).unwrap();

    let frame: Vec<u8> = std::iter::repeat([180u8, 90, 40, 255]).take(16).flatten().collect();
    g.dispatch(&frame).unwrap();
    let out = g.read_output(output).unwrap();
    for (a, b) in frame.iter().zip(&out) {
        assert!((*a as i32 - *b as i32).abs() <= 3, "{a} vs {b}");
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_uyvy_mid_gray_640x480() {
    let mut g = cpu_graph();
    let input = g.add_layer("input", LayerType::Input).unwrap();
    let convert = g.add_layer("yuv2rgba", LayerType::YuvToRgba).unwrap();
    let output = g.add_layer("output", LayerType::Output).unwrap();
    g.connect(convert, "input").unwrap();
    g.connect(output, "yuv2rgba").unwrap();
    g.update_parameter(convert, LayerParams::Yuv(YuvParams { layout: YuvLayout::Uyvy }))
        .unwrap();
    g.set_input_desc(input, YuvLayout::Uyvy.raw_desc(640, 480).unwrap()).unwrap();

    g.dispatch(&vec![128u8; 320 * 480 * 4]).unwrap();

    let desc = g.output_desc(output).unwrap();
    assert_eq!((desc.width, desc.height, desc.format), (640, 480, PixelFormat::U8C4));
    let out = g.read_output(output).unwrap();
    assert_eq!(out.len(), 640 * 480 * 4);
    for px in out.chunks_exact(4) {
        for &c in &px[..3] {
            assert!((c as i32 - 128).abs() <= 2, "channel {c}");
        }
        assert_eq!(px[3], 255);
    }
    assert_eq!(g.frames_dispatched(), 1);
}

// ============================================================================
// Failure recovery
// ============================================================================

/// CPU backend whose channel remaps fail on demand.
struct FaultyBackend {
    inner: CpuBackend,
    fail: Arc<AtomicBool>,
}

impl GpuBackend for FaultyBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn name(&self) -> &'static str {
        "faulty"
    }

    fn limits(&self) -> &GpuLimits {
        self.inner.limits()
    }

    fn allocate_surface(&self, desc: SurfaceDesc) -> ComputeResult<Box<dyn SurfaceHandle>> {
        self.inner.allocate_surface(desc)
    }

    fn free_surface(&self, surface: Box<dyn SurfaceHandle>) {
        self.inner.free_surface(surface)
    }

    fn upload(&self, surface: &mut dyn SurfaceHandle, bytes: &[u8]) -> ComputeResult<()> {
        self.inner.upload(surface, bytes)
    }

    fn download(&self, surface: &dyn SurfaceHandle) -> ComputeResult<Vec<u8>> {
        self.inner.download(surface)
    }

    fn launch(&self, op: &KernelOp, inputs: &[&dyn SurfaceHandle], output: &mut dyn SurfaceHandle) -> ComputeResult<()> {
        if self.fail.load(Ordering::SeqCst) && matches!(op, KernelOp::RemapChannels(_)) {
            return Err(ComputeError::LaunchFailed("injected failure".into()));
        }
        self.inner.launch(op, inputs, output)
    }

    fn allocated_bytes(&self) -> u64 {
        self.inner.allocated_bytes()
    }
}

#[test]
fn test_execution_error_keeps_previous_output() {
    let fail = Arc::new(AtomicBool::new(false));
    let backend = FaultyBackend { inner: CpuBackend::new(), fail: fail.clone() };
    let mut g = LayerGraph::new(Box::new(backend));
    let [_, _, _, output] = chain(&mut g);

    let first = gradient();
    g.dispatch(&first).unwrap();
    let committed = g.read_output(output).unwrap();

    fail.store(true, Ordering::SeqCst);
    let second = vec![77u8; 64];
    let err = g.dispatch(&second).unwrap_err();
    assert!(err.is_execution());
    assert!(matches!(err, GraphError::Execution { ref layer, .. } if layer == "map"));
    assert_eq!(g.read_output(output).unwrap(), committed);
    assert_eq!(g.frames_dispatched(), 1);

    fail.store(false, Ordering::SeqCst);
    g.dispatch(&second).unwrap();
    assert_ne!(g.read_output(output).unwrap(), committed);
}

#[test]
fn test_resource_error_then_recovery() {
    let backend = create_backend(BackendKind::Cpu, Some(GpuLimits::with_memory(100))).unwrap();
    let mut g = LayerGraph::new(backend);
    let input = g.add_layer("input", LayerType::Input).unwrap();
    let output = g.add_layer("output", LayerType::Output).unwrap();
    g.connect(output, "input").unwrap();

    // Input (64) fits, output (64 more) does not.
    g.set_input(input, 4, 4, PixelFormat::U8C4).unwrap();
    let err = g.dispatch(&[0u8; 64]).unwrap_err();
    assert!(err.is_resource());
    assert!(matches!(err, GraphError::Resource { ref layer, .. } if layer == "output"));

    g.set_input(input, 2, 2, PixelFormat::U8C4).unwrap();
    g.dispatch(&[5u8; 16]).unwrap();
    g.dispatch(&[6u8; 16]).unwrap();
    assert_eq!(g.read_output(output).unwrap(), vec![6u8; 16]);
    assert!(g.backend().allocated_bytes() <= 100);
}

#[test]
fn test_bgr_output_via_channel_map() {
    let mut graph = cpu_graph();
    let input = graph.add_layer("input", LayerType::Input).unwrap();
    let map = graph.add_layer("map", LayerType::MapChannel).unwrap();
    let rgb = graph.add_layer("rgba2rgb", LayerType::RgbaToRgb).unwrap();
    let output = graph.add_layer("output", LayerType::Output).unwrap();
    graph.connect(map, "input").unwrap();
    graph.connect(rgb, "map").unwrap();
    graph.connect(output, "rgba2rgb").unwrap();
    graph.update_parameter(map, LayerParams::ChannelMap(ChannelMap::bgra())).unwrap();
    graph.set_input(input, 2, 1, PixelFormat::U8C4).unwrap();

    let frame = [10u8, 20, 30, 255, 40, 50, 60, 128];
    graph.dispatch(&frame).unwrap();
    assert_eq!(graph.output_desc(output).unwrap().format, PixelFormat::U8C3);
    assert_eq!(graph.read_output(output).unwrap(), vec![30, 20, 10, 60, 50, 40]);

    // Without the map the alpha drop keeps RGB order.
    graph.set_enabled(map, false).unwrap();
    graph.dispatch(&frame).unwrap();
    assert_eq!(graph.read_output(output).unwrap(), vec![10, 20, 30, 40, 50, 60]);
}
