//! HDF5 output for normalized event streams.
//!
//! The on-disk layout is a group `events` holding four one-dimensional,
//! chunked, gzip-compressed, resizable datasets of equal length:
//!
//! ```text
//! events/ts  f64  microseconds
//! events/xs  u16
//! events/ys  u16
//! events/ps  u8   0 or 1
//! ```

use crate::types::EventColumns;
use hdf5::types::H5Type;
use hdf5::{Dataset, File, Group};
use log::debug;
use ndarray::{s, ArrayView1};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing or reading event files.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

pub const EVENTS_GROUP: &str = "events";
pub const TS_DATASET: &str = "ts";
pub const XS_DATASET: &str = "xs";
pub const YS_DATASET: &str = "ys";
pub const PS_DATASET: &str = "ps";

/// Default flush threshold, in events.
pub const DEFAULT_BUFFER_EVENTS: usize = 2_000_000;

/// Dataset creation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Chunk length of every dataset, in elements.
    pub chunk_events: usize,
    /// gzip level (0-9), or `None` for uncompressed datasets.
    pub compression: Option<u8>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            chunk_events: 1 << 16,
            compression: Some(4),
        }
    }
}

/// Destination for flushed event batches.
pub trait EventSink {
    /// Appends a non-empty batch at the tail of the stored stream.
    fn append(&mut self, columns: &EventColumns) -> Result<(), OutputError>;
}

/// Append-only HDF5 event file.
///
/// The file is created (truncating any existing one) by [`create`](Self::create)
/// and closed when the writer is dropped, on every exit path.
pub struct H5EventWriter {
    path: PathBuf,
    ts: Dataset,
    xs: Dataset,
    ys: Dataset,
    ps: Dataset,
    _file: File,
}

impl std::fmt::Debug for H5EventWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H5EventWriter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl H5EventWriter {
    /// Creates the file, its parent directories, and four empty datasets.
    pub fn create<P: AsRef<Path>>(path: P, options: &DatasetOptions) -> Result<Self, OutputError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let group = file.create_group(EVENTS_GROUP)?;

        Ok(Self {
            path: path.to_path_buf(),
            ts: create_extendable_dataset::<f64>(&group, TS_DATASET, options)?,
            xs: create_extendable_dataset::<u16>(&group, XS_DATASET, options)?,
            ys: create_extendable_dataset::<u16>(&group, YS_DATASET, options)?,
            ps: create_extendable_dataset::<u8>(&group, PS_DATASET, options)?,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for H5EventWriter {
    fn append(&mut self, columns: &EventColumns) -> Result<(), OutputError> {
        append_slice(&self.ts, columns.ts())?;
        append_slice(&self.xs, columns.xs())?;
        append_slice(&self.ys, columns.ys())?;
        append_slice(&self.ps, columns.ps())?;
        Ok(())
    }
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    options: &DatasetOptions,
) -> Result<Dataset, OutputError> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((options.chunk_events.max(1),));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    Ok(builder.create(name)?)
}

/// Grows `dataset` by `data.len()` and writes `data` into the new tail.
fn append_slice<T: H5Type>(dataset: &Dataset, data: &[T]) -> Result<(), OutputError> {
    if data.is_empty() {
        return Ok(());
    }
    let old = dataset.shape().first().copied().unwrap_or(0);
    let new_len = old + data.len();
    dataset.resize((new_len,))?;
    dataset.write_slice(ArrayView1::from(data), s![old..new_len])?;
    Ok(())
}

/// Accumulates normalized batches and flushes them to a sink in bulk.
///
/// A flush happens whenever the buffered event count reaches the threshold,
/// and once more in [`finish`](Self::finish).
#[derive(Debug)]
pub struct BufferedWriter<S: EventSink> {
    sink: S,
    buffer: EventColumns,
    threshold: usize,
    total_events: u64,
    flushes: usize,
}

impl<S: EventSink> BufferedWriter<S> {
    /// Wraps a sink. A threshold of 0 is treated as 1 (flush every batch).
    pub fn new(sink: S, threshold: usize) -> Self {
        Self {
            sink,
            buffer: EventColumns::new(),
            threshold: threshold.max(1),
            total_events: 0,
            flushes: 0,
        }
    }

    /// Buffers a batch, flushing if the threshold is reached.
    pub fn push(&mut self, columns: EventColumns) -> Result<(), OutputError> {
        if columns.is_empty() {
            return Ok(());
        }
        self.total_events += columns.len() as u64;
        if self.buffer.is_empty() {
            self.buffer = columns;
        } else {
            self.buffer.extend_from(&columns);
        }

        if self.buffer.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes buffered events to the sink. No-op when nothing is buffered.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        debug!("Flushing {} events", self.buffer.len());
        self.sink.append(&self.buffer)?;
        self.buffer.clear();
        self.flushes += 1;
        Ok(())
    }

    /// Performs the final flush and hands back the sink.
    pub fn finish(mut self) -> Result<S, OutputError> {
        self.flush()?;
        debug!("{} events written in {} flush(es)", self.total_events, self.flushes);
        Ok(self.sink)
    }

    /// Events accepted so far, flushed or not.
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Events waiting for the next flush.
    pub fn buffered_events(&self) -> usize {
        self.buffer.len()
    }

    /// Number of non-empty flushes performed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Reads a whole event file back into memory.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<EventColumns, OutputError> {
    let file = File::open(path)?;
    let group = file.group(EVENTS_GROUP)?;

    let ts = group.dataset(TS_DATASET)?.read_raw::<f64>()?;
    let xs = group.dataset(XS_DATASET)?.read_raw::<u16>()?;
    let ys = group.dataset(YS_DATASET)?.read_raw::<u16>()?;
    let ps = group.dataset(PS_DATASET)?.read_raw::<u8>()?;

    let lens = [ts.len(), xs.len(), ys.len(), ps.len()];
    EventColumns::from_parts(ts, xs, ys, ps).ok_or_else(|| {
        OutputError::InvalidFormat(format!("event datasets differ in length: {:?}", lens))
    })
}
