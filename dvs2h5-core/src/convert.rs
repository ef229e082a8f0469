//! End-to-end conversion pipelines.
//!
//! Both pipelines make a single forward pass over their source:
//! source batch -> [`Normalizer`] -> [`BufferedWriter`] -> HDF5 datasets.

use crate::bag::BagEventReader;
use crate::normalize::Normalizer;
use crate::output::{
    BufferedWriter, DatasetOptions, H5EventWriter, OutputError, DEFAULT_BUFFER_EVENTS,
};
use crate::parser::DecodeError;
use crate::recording::{AedatRecording, EventBatchSource};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort the conversion of one input.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Settings shared by both pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Shift timestamps so the first event is at 0.
    pub zero_ts: bool,
    /// Flush threshold, in events.
    pub buffer_events: usize,
    pub dataset: DatasetOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            zero_ts: false,
            buffer_events: DEFAULT_BUFFER_EVENTS,
            dataset: DatasetOptions::default(),
        }
    }
}

/// Result of a conversion that produced a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Events written to each of the four datasets.
    pub events: u64,
    /// Raw timestamp (µs) of the first event, before any zero-basing.
    pub first_ts_us: Option<i64>,
}

/// Outcome of converting a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Written(ConversionSummary),
    /// The source held no events; no output file was created.
    Empty { input: PathBuf },
}

/// Converts the event topic of a ROS1 bag into an HDF5 file.
///
/// The output file is always created, even when no matching events exist.
pub fn convert_bag(
    input: &Path,
    output: &Path,
    topic: &str,
    options: &ConvertOptions,
) -> Result<ConversionSummary, ConvertError> {
    convert_bag_with_progress(input, output, topic, options, |_| {})
}

/// Like [`convert_bag`], reporting the running event count after each batch.
pub fn convert_bag_with_progress<F>(
    input: &Path,
    output: &Path,
    topic: &str,
    options: &ConvertOptions,
    mut on_progress: F,
) -> Result<ConversionSummary, ConvertError>
where
    F: FnMut(u64),
{
    if !input.exists() {
        return Err(ConvertError::NotFound(input.to_path_buf()));
    }

    let reader = BagEventReader::open(input, topic)?;
    if !reader.has_topic() {
        warn!(
            "{} has no indexed connection on {}",
            reader.path().display(),
            reader.topic()
        );
    }

    let sink = H5EventWriter::create(output, &options.dataset)?;
    debug!("Writing events to {}", sink.path().display());
    let mut writer = BufferedWriter::new(sink, options.buffer_events);
    let mut normalizer = Normalizer::new(options.zero_ts);

    for batch in reader.batches() {
        let batch = batch?;
        writer.push(normalizer.normalize(&batch))?;
        on_progress(writer.total_events());
    }

    let events = writer.total_events();
    writer.finish()?;

    Ok(ConversionSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        events,
        first_ts_us: normalizer.first_ts_us(),
    })
}

/// Converts an AEDAT4 recording into an HDF5 file.
pub fn convert_recording(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConversionOutcome, ConvertError> {
    convert_recording_with_progress(input, output, options, |_| {})
}

/// Like [`convert_recording`], reporting the running event count after each batch.
pub fn convert_recording_with_progress<F>(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    on_progress: F,
) -> Result<ConversionOutcome, ConvertError>
where
    F: FnMut(u64),
{
    if !input.exists() {
        return Err(ConvertError::NotFound(input.to_path_buf()));
    }

    let mut recording = AedatRecording::open(input)?;
    convert_source(&mut recording, input, output, options, on_progress)
}

/// Drains a batch source into an HDF5 file.
///
/// The output file is created lazily on the first non-empty batch, so a
/// source without events leaves no file behind.
pub fn convert_source<S, F>(
    source: &mut S,
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    mut on_progress: F,
) -> Result<ConversionOutcome, ConvertError>
where
    S: EventBatchSource,
    F: FnMut(u64),
{
    let mut normalizer = Normalizer::new(options.zero_ts);
    let mut writer: Option<BufferedWriter<H5EventWriter>> = None;

    while source.is_running() {
        let Some(batch) = source.next_batch()? else {
            continue;
        };
        if batch.is_empty() {
            continue;
        }

        let columns = normalizer.normalize(&batch);
        if writer.is_none() {
            let sink = H5EventWriter::create(output, &options.dataset)?;
            debug!("Writing events to {}", sink.path().display());
            writer = Some(BufferedWriter::new(sink, options.buffer_events));
        }
        if let Some(writer) = writer.as_mut() {
            writer.push(columns)?;
            on_progress(writer.total_events());
        }
    }

    let Some(writer) = writer else {
        return Ok(ConversionOutcome::Empty {
            input: input.to_path_buf(),
        });
    };

    let events = writer.total_events();
    writer.finish()?;

    Ok(ConversionOutcome::Written(ConversionSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        events,
        first_ts_us: normalizer.first_ts_us(),
    }))
}
