//! Benchmarks for vpipe kernels and graph dispatch.
//!
//! Run with: `cargo bench -p vpipe-bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use vpipe_compute::kernels::{remap_channels, resize, rgba_to_yuv, yuv_to_rgba};
use vpipe_compute::ResizeFilter;
use vpipe_core::{ChannelMap, ImageView, ImageViewMut, YuvLayout};
use vpipe_graph::{BackendKind, PipelineRegistry, VideoFormatPipeline, VideoType};

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;

/// Mid-gray-ish RGBA test card with a horizontal ramp.
fn test_card(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            let x = (i % width) as u8;
            [x, 128, 255 - x, 255]
        })
        .collect()
}

/// Benchmark YUV to RGBA for every layout.
fn bench_yuv_to_rgba(c: &mut Criterion) {
    let mut group = c.benchmark_group("yuv_to_rgba");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let rgba = test_card(WIDTH, HEIGHT);
    let card = ImageView::packed(&rgba, WIDTH, HEIGHT, 4).unwrap();

    for layout in YuvLayout::CONVERTIBLE {
        let desc = layout.raw_desc(WIDTH, HEIGHT).unwrap();
        let channels = desc.format.channels() as usize;
        let mut raw = vec![0u8; desc.packed_len()];
        {
            let mut dst = ImageViewMut::packed(&mut raw, desc.width, desc.height, channels).unwrap();
            rgba_to_yuv(&card, &mut dst, layout).unwrap();
        }
        let mut out = vec![0u8; rgba.len()];

        group.bench_function(BenchmarkId::from_parameter(layout.name()), |b| {
            b.iter(|| {
                let src = ImageView::packed(&raw, desc.width, desc.height, channels).unwrap();
                let mut dst = ImageViewMut::packed(&mut out, WIDTH, HEIGHT, 4).unwrap();
                yuv_to_rgba(black_box(&src), &mut dst, layout).unwrap();
            })
        });
    }

    group.finish();
}

/// Benchmark RGBA to YUV for every layout.
fn bench_rgba_to_yuv(c: &mut Criterion) {
    let mut group = c.benchmark_group("rgba_to_yuv");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let rgba = test_card(WIDTH, HEIGHT);

    for layout in YuvLayout::CONVERTIBLE {
        let desc = layout.raw_desc(WIDTH, HEIGHT).unwrap();
        let channels = desc.format.channels() as usize;
        let mut raw = vec![0u8; desc.packed_len()];

        group.bench_function(BenchmarkId::from_parameter(layout.name()), |b| {
            b.iter(|| {
                let src = ImageView::packed(&rgba, WIDTH, HEIGHT, 4).unwrap();
                let mut dst = ImageViewMut::packed(&mut raw, desc.width, desc.height, channels).unwrap();
                rgba_to_yuv(black_box(&src), &mut dst, layout).unwrap();
            })
        });
    }

    group.finish();
}

/// Benchmark channel remap and resize.
fn bench_pixel_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixel_ops");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let rgba = test_card(WIDTH, HEIGHT);
    let mut out = vec![0u8; rgba.len()];

    group.bench_function("remap_bgra", |b| {
        b.iter(|| {
            let src = ImageView::packed(&rgba, WIDTH, HEIGHT, 4).unwrap();
            let mut dst = ImageViewMut::packed(&mut out, WIDTH, HEIGHT, 4).unwrap();
            remap_channels(black_box(&src), &mut dst, ChannelMap::bgra()).unwrap();
        })
    });

    let (half_w, half_h) = (WIDTH / 2, HEIGHT / 2);
    let mut half = vec![0u8; (half_w * half_h * 4) as usize];
    for filter in [ResizeFilter::Nearest, ResizeFilter::Bilinear] {
        group.bench_with_input(BenchmarkId::new("resize_half", filter.name()), &filter, |b, &filter| {
            b.iter(|| {
                let src = ImageView::packed(&rgba, WIDTH, HEIGHT, 4).unwrap();
                let mut dst = ImageViewMut::packed(&mut half, half_w, half_h, 4).unwrap();
                resize(black_box(&src), &mut dst, filter).unwrap();
            })
        });
    }

    group.finish();
}

/// Benchmark a full capture conversion through the graph.
fn bench_video_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("video_pipeline");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let registry = PipelineRegistry::new();
    for video_type in [VideoType::Nv12, VideoType::Uyvy] {
        let mut video = VideoFormatPipeline::new(&registry, BackendKind::Cpu).unwrap();
        video.set_video_format(video_type, WIDTH, HEIGHT).unwrap();
        let frame = vec![128u8; video_type.raw_desc(WIDTH, HEIGHT).unwrap().packed_len()];

        group.bench_function(BenchmarkId::from_parameter(video_type.name()), |b| {
            b.iter(|| {
                video.run(black_box(&frame)).unwrap();
                black_box(video.read_output().unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_yuv_to_rgba,
    bench_rgba_to_yuv,
    bench_pixel_ops,
    bench_video_pipeline,
);
criterion_main!(benches);
