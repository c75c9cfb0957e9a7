//! PipelineRegistry: slot reuse, lifecycle and contention.

use std::thread;

use vpipe_compute::BackendKind;
use vpipe_core::PixelFormat;
use vpipe_graph::{GraphError, LayerType, PipelineRegistry};

#[test]
fn test_released_slot_is_reused() {
    let registry = PipelineRegistry::new();
    let first = registry.acquire(BackendKind::Cpu).unwrap();
    let second = registry.acquire(BackendKind::Cpu).unwrap();
    assert_ne!(first, second);

    registry.release(first).unwrap();
    let third = registry.acquire(BackendKind::Cpu).unwrap();
    assert_eq!(third, first);
    assert_eq!(registry.len().unwrap(), 2);
    assert_eq!(registry.contexts_created(), 2);
}

#[test]
fn test_empty_pipeline_in_use_is_not_reused() {
    let registry = PipelineRegistry::new();
    let held = registry.acquire(BackendKind::Cpu).unwrap();
    assert!(registry.pipeline(held).unwrap().is_empty());

    let other = registry.acquire(BackendKind::Cpu).unwrap();
    assert_ne!(other, held);
    assert!(registry.pipeline(held).unwrap().is_in_use());
    assert_eq!(registry.contexts_created(), 2);
}

#[test]
fn test_released_pipeline_is_empty_and_closed() {
    let registry = PipelineRegistry::new();
    let id = registry.acquire(BackendKind::Cpu).unwrap();
    let pipeline = registry.pipeline(id).unwrap();
    pipeline.add_layer("input", LayerType::Input).unwrap();
    assert!(!pipeline.is_empty());

    registry.release(id).unwrap();
    assert!(pipeline.is_empty());
    assert!(!pipeline.is_in_use());
    assert!(matches!(
        pipeline.add_layer("input", LayerType::Input),
        Err(GraphError::PipelineClosed(_))
    ));
}

#[test]
fn test_unknown_pipeline() {
    let registry = PipelineRegistry::new();
    let other = PipelineRegistry::new();
    let foreign = other.acquire(BackendKind::Cpu).unwrap();

    let err = registry.release(foreign).unwrap_err();
    assert!(matches!(err, GraphError::UnknownPipeline(0)));
    assert!(err.is_configuration());
    assert!(registry.pipeline(foreign).is_err());
}

#[test]
fn test_release_while_locked_is_busy() {
    let registry = PipelineRegistry::new();
    let id = registry.acquire(BackendKind::Cpu).unwrap();
    let pipeline = registry.pipeline(id).unwrap();

    let err = pipeline.inspect(|_| registry.release(id).unwrap_err()).unwrap();
    assert!(err.is_busy());
    assert!(pipeline.is_in_use());

    registry.release(id).unwrap();
}

#[test]
fn test_shutdown_closes_everything() {
    let registry = PipelineRegistry::builder().backend(BackendKind::Cpu).build();
    let id = registry.acquire(BackendKind::Auto).unwrap();
    let pipeline = registry.pipeline(id).unwrap();
    let input = pipeline.add_layer("input", LayerType::Input).unwrap();
    let output = pipeline.add_layer("output", LayerType::Output).unwrap();
    pipeline.connect(output, "input").unwrap();
    pipeline.set_input(input, 8, 8, PixelFormat::U8C4).unwrap();
    pipeline.dispatch(&[3u8; 256]).unwrap();

    registry.shutdown();
    assert!(registry.is_empty().unwrap());
    assert!(pipeline.is_empty());
    assert!(!pipeline.is_in_use());
    assert!(matches!(pipeline.dispatch(&[3u8; 256]), Err(GraphError::PipelineClosed(_))));

    registry.shutdown();
    let fresh = registry.acquire(BackendKind::Cpu).unwrap();
    assert_eq!(fresh.index(), 0);
    assert_eq!(registry.contexts_created(), 2);
}

#[test]
fn test_independent_pipelines_dispatch_concurrently() {
    let registry = PipelineRegistry::new();
    let ids: Vec<_> = (0..4).map(|_| registry.acquire(BackendKind::Cpu).unwrap()).collect();

    thread::scope(|s| {
        for (n, &id) in ids.iter().enumerate() {
            let registry = &registry;
            s.spawn(move || {
                let pipeline = registry.pipeline(id).unwrap();
                let input = pipeline.add_layer("input", LayerType::Input).unwrap();
                let output = pipeline.add_layer("output", LayerType::Output).unwrap();
                pipeline.connect(output, "input").unwrap();
                pipeline.set_input(input, 16, 16, PixelFormat::U8C4).unwrap();
                let frame = vec![n as u8; 16 * 16 * 4];
                for _ in 0..10 {
                    pipeline.dispatch(&frame).unwrap();
                }
                assert_eq!(pipeline.read_output(output).unwrap(), frame);
            });
        }
    });

    assert_eq!(registry.contexts_created(), 4);
}
