//! Backend listing command.

use anyhow::Result;
use vpipe_compute::{describe_backends, select_best_backend, GpuLimits};

/// Prints every known backend, marking the available ones.
pub fn run(verbose: bool) -> Result<()> {
    print!("{}", describe_backends());
    println!("Auto selects: {}", select_best_backend());

    if verbose {
        let limits = GpuLimits::detect_host();
        println!(
            "Host memory: {} MB total, {} MB usable{}",
            limits.total_memory / (1024 * 1024),
            limits.available_memory / (1024 * 1024),
            if limits.detected { "" } else { " (estimated)" }
        );
    }
    Ok(())
}
