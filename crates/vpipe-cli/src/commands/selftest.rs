//! Mid-gray UYVY self test.

use crate::SelftestArgs;
use anyhow::{bail, Context, Result};
use std::time::Instant;
use tracing::{debug, info};
use vpipe_compute::BackendKind;
use vpipe_core::ChannelMap;
use vpipe_graph::{PipelineRegistry, VideoFormatPipeline, VideoType};

const GRAY: [u8; 4] = [128, 128, 128, 255];

/// Largest per-channel distance between each RGBA pixel and `expected`.
fn max_deviation(rgba: &[u8], expected: [u8; 4]) -> u8 {
    rgba.chunks_exact(4)
        .flat_map(|px| px.iter().zip(expected).map(|(&a, b)| a.abs_diff(b)))
        .max()
        .unwrap_or(0)
}

/// Runs the self test.
pub fn run(registry: &PipelineRegistry, args: &SelftestArgs, verbose: bool) -> Result<()> {
    if args.width % 2 != 0 {
        bail!("UYVY width must be even, got {}", args.width);
    }

    let mut video = VideoFormatPipeline::new(registry, BackendKind::Auto).context("Failed to create pipeline")?;
    video.set_video_format(VideoType::Uyvy, args.width, args.height)?;
    video.set_output_channels(ChannelMap::identity())?;

    // Y = U = V = 128 everywhere.
    let frame = vec![128u8; (args.width / 2 * args.height * 4) as usize];

    let start = Instant::now();
    video.run(&frame).context("Self test dispatch failed")?;
    let rgba = video.read_output()?;
    let elapsed = start.elapsed();

    let deviation = max_deviation(&rgba, GRAY);
    info!(
        width = args.width,
        height = args.height,
        deviation,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Self test finished"
    );
    debug!(backend = %video.pipeline().kind(), "Self test backend");

    if verbose {
        println!(
            "{}x{} UYVY -> RGBA in {:.2} ms, max deviation {}",
            args.width,
            args.height,
            elapsed.as_secs_f64() * 1000.0,
            deviation
        );
    }

    if deviation > args.tolerance {
        bail!("Self test failed: deviation {deviation} exceeds tolerance {}", args.tolerance);
    }
    println!("Self test passed ({}x{}, deviation {})", args.width, args.height, deviation);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_deviation() {
        assert_eq!(max_deviation(&[128, 128, 128, 255], GRAY), 0);
        assert_eq!(max_deviation(&[130, 127, 128, 255, 128, 128, 120, 250], GRAY), 8);
        assert_eq!(max_deviation(&[], GRAY), 0);
    }

    #[test]
    fn test_selftest_small_frame() {
        let registry = PipelineRegistry::new();
        let args = SelftestArgs { width: 16, height: 8, tolerance: 2 };
        run(&registry, &args, false).unwrap();
    }

    #[test]
    fn test_selftest_rejects_odd_width() {
        let registry = PipelineRegistry::new();
        let args = SelftestArgs { width: 15, height: 8, tolerance: 2 };
        assert!(run(&registry, &args, false).is_err());
    }
}
