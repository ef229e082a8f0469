//! Core types for event data flowing through the converters.
//!
//! Sources hand out raw per-event records in their native encoding; the
//! normalizer turns batches of those into [`EventColumns`], the canonical
//! column layout that ends up on disk.

/// Per-event accessors shared by every source encoding.
pub trait RawEvent {
    /// Timestamp in whole microseconds.
    fn timestamp_us(&self) -> i64;
    /// X coordinate of the pixel.
    fn x(&self) -> u16;
    /// Y coordinate of the pixel.
    fn y(&self) -> u16;
    /// `true` for an increase in brightness (ON), `false` for a decrease.
    fn polarity(&self) -> bool;
}

/// A single `dvs_msgs/Event` as stored in a ROS1 bag.
///
/// The timestamp is a ROS `time`: whole seconds plus a nanosecond remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagEvent {
    pub x: u16,
    pub y: u16,
    pub secs: u32,
    pub nsecs: u32,
    pub polarity: bool,
}

impl BagEvent {
    /// Creates a new bag event.
    #[inline]
    pub fn new(x: u16, y: u16, secs: u32, nsecs: u32, polarity: bool) -> Self {
        Self {
            x,
            y,
            secs,
            nsecs,
            polarity,
        }
    }
}

impl RawEvent for BagEvent {
    /// Sub-microsecond precision is floored away, never rounded.
    #[inline]
    fn timestamp_us(&self) -> i64 {
        self.secs as i64 * 1_000_000 + (self.nsecs / 1_000) as i64
    }

    #[inline]
    fn x(&self) -> u16 {
        self.x
    }

    #[inline]
    fn y(&self) -> u16 {
        self.y
    }

    #[inline]
    fn polarity(&self) -> bool {
        self.polarity
    }
}

/// A single event decoded from an AEDAT4 recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingEvent {
    /// Timestamp in microseconds
    pub timestamp: i64,
    pub x: i16,
    pub y: i16,
    pub polarity: bool,
}

impl RecordingEvent {
    /// Creates a new recording event.
    #[inline]
    pub fn new(timestamp: i64, x: i16, y: i16, polarity: bool) -> Self {
        Self {
            timestamp,
            x,
            y,
            polarity,
        }
    }
}

impl RawEvent for RecordingEvent {
    #[inline]
    fn timestamp_us(&self) -> i64 {
        self.timestamp
    }

    // Coordinates are assumed non-negative; no range check is performed.
    #[inline]
    fn x(&self) -> u16 {
        self.x as u16
    }

    #[inline]
    fn y(&self) -> u16 {
        self.y as u16
    }

    #[inline]
    fn polarity(&self) -> bool {
        self.polarity
    }
}

/// Canonical column-oriented event batch.
///
/// All four columns always have the same length. Every mutation goes through
/// methods that touch the four vectors together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventColumns {
    ts: Vec<f64>,
    xs: Vec<u16>,
    ys: Vec<u16>,
    ps: Vec<u8>,
}

impl EventColumns {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch with room for `capacity` events per column.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ts: Vec::with_capacity(capacity),
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            ps: Vec::with_capacity(capacity),
        }
    }

    /// Builds a batch from four columns, or `None` if their lengths differ.
    pub fn from_parts(ts: Vec<f64>, xs: Vec<u16>, ys: Vec<u16>, ps: Vec<u8>) -> Option<Self> {
        let n = ts.len();
        if xs.len() != n || ys.len() != n || ps.len() != n {
            return None;
        }
        Some(Self { ts, xs, ys, ps })
    }

    /// Appends one already-normalized event.
    #[inline]
    pub fn push(&mut self, ts: f64, x: u16, y: u16, p: u8) {
        self.ts.push(ts);
        self.xs.push(x);
        self.ys.push(y);
        self.ps.push(p);
    }

    /// Appends every event of `other`, preserving order.
    pub fn extend_from(&mut self, other: &EventColumns) {
        self.ts.extend_from_slice(&other.ts);
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.ps.extend_from_slice(&other.ps);
    }

    /// Removes all events, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.ts.clear();
        self.xs.clear();
        self.ys.clear();
        self.ps.clear();
    }

    /// Number of events in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.ts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// Timestamps in microseconds.
    pub fn ts(&self) -> &[f64] {
        &self.ts
    }

    pub fn xs(&self) -> &[u16] {
        &self.xs
    }

    pub fn ys(&self) -> &[u16] {
        &self.ys
    }

    /// Polarities, `0` or `1`.
    pub fn ps(&self) -> &[u8] {
        &self.ps
    }
}
