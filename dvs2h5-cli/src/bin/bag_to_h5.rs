//! Extracts DVS events from ROS1 bags into HDF5 files.

use anyhow::{Context, Result};
use clap::Parser;
use dvs2h5_cli::{init_logging, plan, report, spinner, CommonArgs};
use dvs2h5_core::{
    convert_bag_with_progress, ConvertOptions, DEFAULT_BUFFER_EVENTS, DEFAULT_EVENT_TOPIC,
};
use std::time::Instant;

/// Extract dvs_msgs/EventArray events from ROS1 .bag files into HDF5.
///
/// INPUT may be a single .bag file or a directory; every .bag file directly
/// inside the directory is converted to its own .h5 file.
#[derive(Parser, Debug)]
#[command(name = "dvs-bag-to-h5")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Event topic to extract
    #[arg(
        long = "event_topic",
        visible_alias = "topic",
        short = 't',
        default_value = DEFAULT_EVENT_TOPIC
    )]
    event_topic: String,

    /// Number of events buffered before each write to disk
    #[arg(long = "buffer_events", default_value_t = DEFAULT_BUFFER_EVENTS)]
    buffer_events: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    if args.buffer_events == 0 {
        anyhow::bail!("--buffer_events must be at least 1");
    }

    let Some(jobs) = plan(&args.common, "bag")? else {
        return Ok(());
    };

    let options = ConvertOptions {
        zero_ts: args.common.zero_ts,
        buffer_events: args.buffer_events,
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

        let summary = convert_bag_with_progress(
            &job.input,
            &job.output,
            &args.event_topic,
            &options,
            |events| progress.set_message(format!("{} events", events)),
        )
        .with_context(|| format!("Failed to convert {}", job.input.display()))?;

        progress.finish_and_clear();
        report(&summary, start_time.elapsed(), args.common.quiet);
    }

    Ok(())
}
