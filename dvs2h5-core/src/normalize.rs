//! Conversion of raw source batches into the canonical column encoding.
//!
//! The normalizer is stateful across a whole conversion run: it remembers the
//! timestamp of the very first emitted event so that zero-basing uses one
//! global origin rather than a per-batch one.

use crate::types::{EventColumns, RawEvent};
use log::info;

/// Stateful normalizer for one conversion run.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    zero_ts: bool,
    first_ts_us: Option<i64>,
}

impl Normalizer {
    /// Creates a normalizer. With `zero_ts` set, every timestamp is shifted so
    /// the first emitted event lands at 0.
    pub fn new(zero_ts: bool) -> Self {
        Self {
            zero_ts,
            first_ts_us: None,
        }
    }

    /// Timestamp (µs) of the first event seen in this run, if any.
    pub fn first_ts_us(&self) -> Option<i64> {
        self.first_ts_us
    }

    /// Whether timestamps are shifted so the run starts at 0.
    pub fn zero_ts(&self) -> bool {
        self.zero_ts
    }

    /// Converts one batch into canonical columns.
    ///
    /// An empty batch yields empty columns and leaves the run origin untouched.
    pub fn normalize<E: RawEvent>(&mut self, batch: &[E]) -> EventColumns {
        let mut columns = EventColumns::with_capacity(batch.len());
        self.normalize_into(batch, &mut columns);
        columns
    }

    /// Like [`normalize`](Self::normalize), appending to existing columns.
    pub fn normalize_into<E: RawEvent>(&mut self, batch: &[E], columns: &mut EventColumns) {
        let Some(first) = batch.first() else {
            return;
        };

        let origin = match self.first_ts_us {
            Some(t0) => t0,
            None => {
                let t0 = first.timestamp_us();
                self.first_ts_us = Some(t0);
                if self.zero_ts {
                    info!("Zero-basing timestamps (t0 = {} us)", t0);
                }
                t0
            }
        };
        let offset = if self.zero_ts { origin } else { 0 };

        for event in batch {
            columns.push(
                (event.timestamp_us() - offset) as f64,
                event.x(),
                event.y(),
                event.polarity() as u8,
            );
        }
    }
}
