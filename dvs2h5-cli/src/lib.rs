//! Plumbing shared by the converter binaries.

use anyhow::{Context, Result};
use clap::Args;
use dvs2h5_core::{collect_inputs, plan_jobs, ConversionJob, ConversionSummary};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments common to both converters.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CommonArgs {
    /// Input file, or a directory to scan for inputs
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output directory for .h5 files (default: same directory as each input)
    #[arg(long = "output_dir", short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output filename without extension (single input only)
    #[arg(long = "output_name", short = 'n', value_name = "NAME")]
    pub output_name: Option<String>,

    /// Subtract the first timestamp so that ts[0] == 0
    #[arg(long = "zero_ts", short = 'z')]
    pub zero_ts: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Initializes logging; `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);
}

/// Resolves the inputs and their output paths.
///
/// Returns `None` (after logging a warning) when a directory holds no file
/// with the given extension.
pub fn plan(args: &CommonArgs, extension: &str) -> Result<Option<Vec<ConversionJob>>> {
    let inputs = collect_inputs(&args.input, extension)
        .with_context(|| format!("Failed to list {}", args.input.display()))?;

    if inputs.is_empty() {
        warn!("No .{} files found in: {}", extension, args.input.display());
        return Ok(None);
    }

    let jobs = plan_jobs(
        &inputs,
        args.output_dir.as_deref(),
        args.output_name.as_deref(),
    )
    .context("Failed to resolve output paths")?;
    Ok(Some(jobs))
}

/// Spinner showing the running event count of one conversion.
pub fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Reading events...");
    pb
}

/// Prints the per-file result line and, unless quiet, a short summary.
pub fn report(summary: &ConversionSummary, elapsed: Duration, quiet: bool) {
    println!(
        "✓ Wrote {} events to {}",
        summary.events,
        summary.output.display()
    );

    if !quiet {
        let secs = elapsed.as_secs_f64();
        eprintln!("  Duration:     {:.3}s", secs);
        if secs > 0.0 {
            eprintln!("  Throughput:   {:.0} events/s", summary.events as f64 / secs);
        }
        if let Some(t0) = summary.first_ts_us {
            eprintln!("  First event:  {} us", t0);
        }
    }
}
