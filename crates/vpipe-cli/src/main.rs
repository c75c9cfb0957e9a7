//! vpipe - raw capture frame conversion CLI
//!
//! Front end for the layer graph: lists backends, converts raw capture
//! frames to RGBA/BGRA and runs a built-in self test.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vpipe_compute::BackendKind;
use vpipe_graph::PipelineRegistry;

mod commands;

#[derive(Parser)]
#[command(name = "vpipe")]
#[command(author, version, about = "Reconfigurable frame pipeline CLI")]
#[command(long_about = "
Converts raw capture frames through the vpipe layer graph.

Examples:
  vpipe backends                                  # List compute backends
  vpipe convert frame.uyvy -o frame.rgba -f uyvy -W 640 -H 480
  vpipe convert cap.nv12 -o small.bgra -f nv12 -W 1920 -H 1080 --out-width 960 --out-height 540 --bgra
  vpipe selftest -W 1280 -H 720                   # Mid-gray UYVY round trip
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Compute backend: auto, cpu, cuda, dx11
    #[arg(short, long, global = true, default_value = "auto")]
    backend: String,

    /// Memory budget per backend context in megabytes
    #[arg(long = "memory-limit-mb", global = true)]
    memory_limit_mb: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List compute backends and their availability
    #[command(visible_alias = "b")]
    Backends,

    /// Convert a raw capture frame to RGBA or BGRA
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Run a synthetic mid-gray frame through the pipeline
    Selftest(SelftestArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Raw input frame
    input: PathBuf,

    /// Output file (tightly packed 8-bit pixels)
    #[arg(short, long)]
    output: PathBuf,

    /// Capture format: nv12, i420, yuy2, yvyu, uyvy, yuy2p, argb32, rgba32, rgb24
    #[arg(short, long)]
    format: String,

    /// Capture width
    #[arg(short = 'W', long)]
    width: u32,

    /// Capture height
    #[arg(short = 'H', long)]
    height: u32,

    /// Output width (defaults to capture width)
    #[arg(long)]
    out_width: Option<u32>,

    /// Output height (defaults to capture height)
    #[arg(long)]
    out_height: Option<u32>,

    /// Write BGRA instead of RGBA
    #[arg(long)]
    bgra: bool,

    /// Resize filter: nearest, bilinear
    #[arg(long, default_value = "bilinear")]
    filter: String,
}

#[derive(Args)]
struct SelftestArgs {
    /// Frame width
    #[arg(short = 'W', long, default_value = "640")]
    width: u32,

    /// Frame height
    #[arg(short = 'H', long, default_value = "480")]
    height: u32,

    /// Largest accepted deviation per channel
    #[arg(short, long, default_value = "2")]
    tolerance: u8,
}

/// Installs the fmt subscriber; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(true)
        .with_level(true)
        .init();
}

/// Builds the registry shared by every command.
fn build_registry(cli: &Cli) -> Result<PipelineRegistry> {
    let backend: BackendKind = cli
        .backend
        .parse()
        .with_context(|| format!("Invalid backend '{}'", cli.backend))?;
    let mut builder = PipelineRegistry::builder().backend(backend).verbose(cli.verbose);
    if let Some(mb) = cli.memory_limit_mb {
        builder = builder.memory_limit_mb(mb);
    }
    Ok(builder.build())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match &cli.command {
        Commands::Backends => commands::backends::run(cli.verbose),
        Commands::Convert(args) => {
            let registry = build_registry(&cli)?;
            commands::convert::run(&registry, args, cli.verbose)
        }
        Commands::Selftest(args) => {
            let registry = build_registry(&cli)?;
            commands::selftest::run(&registry, args, cli.verbose)
        }
    }
}
