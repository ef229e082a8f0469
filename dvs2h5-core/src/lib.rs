//! Event-camera recording to HDF5 converter library.
//!
//! This crate converts event streams from ROS1 bags (`dvs_msgs/EventArray`
//! messages) and AEDAT4 recordings into one HDF5 layout: a group `events`
//! with four equal-length datasets `ts` (f64, µs), `xs` (u16), `ys` (u16)
//! and `ps` (u8, 0/1).
//!
//! # Example
//!
//! ```no_run
//! use dvs2h5_core::{convert_bag, ConvertOptions, DEFAULT_EVENT_TOPIC};
//! use std::path::Path;
//!
//! let options = ConvertOptions {
//!     zero_ts: true,
//!     ..ConvertOptions::default()
//! };
//! let summary = convert_bag(
//!     Path::new("run1.bag"),
//!     Path::new("run1.h5"),
//!     DEFAULT_EVENT_TOPIC,
//!     &options,
//! )
//! .unwrap();
//!
//! println!("Wrote {} events to {:?}", summary.events, summary.output);
//! ```
//!
//! # Features
//!
//! - Single forward pass over the source; memory bounded by the flush threshold
//! - Optional zero-basing of timestamps against the first event of the run
//! - Chunked, gzip-compressed, resizable datasets grown by append only

pub mod bag;
pub mod convert;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod paths;
pub mod recording;
pub mod types;

// Re-export commonly used types
pub use bag::{BagEventReader, DEFAULT_EVENT_TOPIC, EVENT_ARRAY_TYPE};
pub use convert::{
    convert_bag, convert_bag_with_progress, convert_recording, convert_recording_with_progress,
    convert_source, ConversionOutcome, ConversionSummary, ConvertError, ConvertOptions,
};
pub use normalize::Normalizer;
pub use output::{
    read_events, BufferedWriter, DatasetOptions, EventSink, H5EventWriter, OutputError,
    DEFAULT_BUFFER_EVENTS,
};
pub use parser::DecodeError;
pub use paths::{collect_inputs, plan_jobs, resolve_output_path, ConversionJob};
pub use recording::{AedatRecording, EventBatchSource};
pub use types::{BagEvent, EventColumns, RawEvent, RecordingEvent};
