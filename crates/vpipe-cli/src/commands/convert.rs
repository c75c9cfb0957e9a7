//! Raw capture conversion command.

use crate::ConvertArgs;
use anyhow::{bail, Context, Result};
use tracing::{debug, info, trace};
use vpipe_compute::{BackendKind, ResizeFilter};
use vpipe_core::ChannelMap;
use vpipe_graph::{PipelineRegistry, VideoFormatPipeline};

/// Runs the convert command.
pub fn run(registry: &PipelineRegistry, args: &ConvertArgs, verbose: bool) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "convert::run");

    let video_type = super::parse_video_type(&args.format)?;
    let filter: ResizeFilter = args
        .filter
        .parse()
        .with_context(|| format!("Invalid resize filter '{}'", args.filter))?;
    let out_width = args.out_width.unwrap_or(args.width);
    let out_height = args.out_height.unwrap_or(args.height);

    let frame = super::load_frame(&args.input)?;
    let expected = video_type
        .raw_desc(args.width, args.height)
        .with_context(|| format!("Invalid {video_type} size {}x{}", args.width, args.height))?
        .packed_len();
    if frame.len() != expected {
        bail!(
            "{} holds {} bytes, a {}x{} {} frame needs {}",
            args.input.display(),
            frame.len(),
            args.width,
            args.height,
            video_type,
            expected
        );
    }

    info!(
        input = %args.input.display(),
        format = %video_type,
        width = args.width,
        height = args.height,
        out_width,
        out_height,
        "Converting frame"
    );
    if verbose {
        println!(
            "Converting {} ({} {}x{}) -> {} ({}x{} {})",
            args.input.display(),
            video_type,
            args.width,
            args.height,
            args.output.display(),
            out_width,
            out_height,
            if args.bgra { "BGRA" } else { "RGBA" }
        );
    }

    let mut video = VideoFormatPipeline::new(registry, BackendKind::Auto).context("Failed to create pipeline")?;
    video.set_video_format(video_type, args.width, args.height)?;
    video.set_output_size(out_width, out_height)?;
    video.set_resize_filter(filter)?;
    let channels = if args.bgra { ChannelMap::bgra() } else { ChannelMap::identity() };
    video.set_output_channels(channels)?;

    video.run(&frame).context("Conversion failed")?;
    let desc = video.output_desc()?;
    let pixels = video.read_output()?;
    debug!(output = %desc, bytes = pixels.len(), "Frame converted");

    super::save_frame(&args.output, &pixels)?;

    if verbose {
        println!("Done.");
    }
    Ok(())
}
