//! Converts AEDAT4 recordings into HDF5 files.

use anyhow::{Context, Result};
use clap::Parser;
use dvs2h5_cli::{init_logging, plan, report, spinner, CommonArgs};
use dvs2h5_core::{convert_recording_with_progress, ConversionOutcome, ConvertOptions};
use log::warn;
use std::time::Instant;

/// Convert AEDAT4 event recordings into HDF5.
///
/// INPUT may be a single .aedat4 file or a directory; every .aedat4 file
/// directly inside the directory is converted to its own .h5 file.
#[derive(Parser, Debug)]
#[command(name = "aedat4-to-h5")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let Some(jobs) = plan(&args.common, "aedat4")? else {
        return Ok(());
    };

    let options = ConvertOptions {
        zero_ts: args.common.zero_ts,
        ..ConvertOptions::default()
    };

    for job in &jobs {
        println!(
            "Extracting events from {} → {}",
            job.input.display(),
            job.output.display()
        );

        let progress = spinner(args.common.quiet);
        let start_time = Instant::now();

        let outcome =
            convert_recording_with_progress(&job.input, &job.output, &options, |events| {
                progress.set_message(format!("{} events", events))
            })
            .with_context(|| format!("Failed to convert {}", job.input.display()))?;

        progress.finish_and_clear();
        match outcome {
            ConversionOutcome::Written(summary) => {
                report(&summary, start_time.elapsed(), args.common.quiet);
            }
            ConversionOutcome::Empty { input } => {
                warn!("No events read from {}; skipping.", input.display());
            }
        }
    }

    Ok(())
}
