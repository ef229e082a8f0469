//! Camera-recording source: pulls event batches from an AEDAT4 decoder.

use crate::parser::DecodeError;
use crate::types::RecordingEvent;
use aedat::base::{Decoder, StreamContent};
use aedat::events_generated::size_prefixed_root_as_event_packet;
use log::debug;
use std::path::{Path, PathBuf};

/// A decoder that hands out event batches until it stops running.
///
/// `next_batch` may return `Ok(None)` (or an empty batch) while the source is
/// still running, e.g. when the underlying container delivered a packet from
/// a non-event stream. Only [`is_running`](EventBatchSource::is_running)
/// decides when the stream is over.
pub trait EventBatchSource {
    /// `false` once the source is exhausted.
    fn is_running(&self) -> bool;

    /// Pulls the next batch, if one is available.
    fn next_batch(&mut self) -> Result<Option<Vec<RecordingEvent>>, DecodeError>;
}

/// AEDAT4 recording opened for sequential reading.
pub struct AedatRecording {
    path: PathBuf,
    decoder: Decoder,
    running: bool,
}

impl std::fmt::Debug for AedatRecording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AedatRecording")
            .field("path", &self.path)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl AedatRecording {
    /// Opens a recording. A malformed or unsupported file fails here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let decoder = Decoder::new(path).map_err(|e| {
            DecodeError::Recording(format!("failed to open {}: {e}", path.display()))
        })?;

        debug!(
            "Opened {} with {} event stream(s)",
            path.display(),
            decoder
                .id_to_stream
                .values()
                .filter(|stream| matches!(stream.content, StreamContent::Events))
                .count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            running: true,
        })
    }

    /// Path of the underlying recording.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_event_stream(&self, stream_id: u32) -> bool {
        self.decoder
            .id_to_stream
            .get(&stream_id)
            .is_some_and(|stream| matches!(stream.content, StreamContent::Events))
    }
}

impl EventBatchSource for AedatRecording {
    fn is_running(&self) -> bool {
        self.running
    }

    fn next_batch(&mut self) -> Result<Option<Vec<RecordingEvent>>, DecodeError> {
        let packet = match self.decoder.next() {
            Some(Ok(packet)) => packet,
            Some(Err(e)) => {
                self.running = false;
                return Err(DecodeError::Recording(e.to_string()));
            }
            None => {
                self.running = false;
                return Ok(None);
            }
        };

        // Frames, IMU samples and triggers share the container.
        if !self.is_event_stream(packet.stream_id) {
            return Ok(None);
        }

        let events = size_prefixed_root_as_event_packet(&packet.buffer)
            .map_err(|e| DecodeError::Recording(format!("invalid event packet: {e}")))?;

        Ok(events.elements().map(|elements| {
            elements
                .iter()
                .map(|e| RecordingEvent::new(e.t(), e.x(), e.y(), e.on()))
                .collect()
        }))
    }
}
