//! Low-level decoding of ROS1 `dvs_msgs/EventArray` payloads.
//!
//! Message layout (ROS1 serialization, little-endian, no padding):
//!
//! ```text
//! std_msgs/Header header   u32 seq | u32 secs | u32 nsecs | u32 len | frame_id bytes
//! uint32 height
//! uint32 width
//! dvs_msgs/Event[] events  u32 count | count * Event
//! ```
//!
//! where each `Event` is `u16 x | u16 y | u32 secs | u32 nsecs | u8 polarity`.

use crate::types::BagEvent;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// Errors that can occur while reading an event source.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bag error: {0}")]
    Bag(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Malformed EventArray payload: {0}")]
    Payload(String),
}

/// Serialized size of one `dvs_msgs/Event`.
pub const EVENT_WIRE_SIZE: usize = 13;

/// A decoded `dvs_msgs/EventArray` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArray {
    pub height: u32,
    pub width: u32,
    pub events: Vec<BagEvent>,
}

/// Decodes a serialized `dvs_msgs/EventArray`.
pub fn parse_event_array(data: &[u8]) -> Result<EventArray, DecodeError> {
    let mut cursor = Cursor::new(data);

    // Header: seq, stamp, frame_id
    let _seq = read_u32(&mut cursor, "header.seq")?;
    let _stamp_secs = read_u32(&mut cursor, "header.stamp")?;
    let _stamp_nsecs = read_u32(&mut cursor, "header.stamp")?;
    let frame_id_len = read_u32(&mut cursor, "header.frame_id")? as usize;
    skip(&mut cursor, frame_id_len, "header.frame_id")?;

    let height = read_u32(&mut cursor, "height")?;
    let width = read_u32(&mut cursor, "width")?;

    let count = read_u32(&mut cursor, "events")? as usize;
    let remaining = data.len() - cursor.position() as usize;
    if count
        .checked_mul(EVENT_WIRE_SIZE)
        .map_or(true, |needed| needed > remaining)
    {
        return Err(DecodeError::Payload(format!(
            "declares {} events but only {} bytes remain",
            count, remaining
        )));
    }

    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(read_event(&mut cursor)?);
    }

    Ok(EventArray {
        height,
        width,
        events,
    })
}

#[inline]
fn read_event(cursor: &mut Cursor<&[u8]>) -> Result<BagEvent, DecodeError> {
    let x = read_u16(cursor, "event.x")?;
    let y = read_u16(cursor, "event.y")?;
    let secs = read_u32(cursor, "event.ts")?;
    let nsecs = read_u32(cursor, "event.ts")?;
    let polarity = cursor
        .read_u8()
        .map_err(|_| truncated("event.polarity"))?
        != 0;
    Ok(BagEvent::new(x, y, secs, nsecs, polarity))
}

#[inline]
fn read_u16(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<u16, DecodeError> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| truncated(field))
}

#[inline]
fn read_u32(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<u32, DecodeError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated(field))
}

fn skip(cursor: &mut Cursor<&[u8]>, len: usize, field: &str) -> Result<(), DecodeError> {
    let end = cursor.position() as usize + len;
    if end > cursor.get_ref().len() {
        return Err(truncated(field));
    }
    cursor.set_position(end as u64);
    Ok(())
}

fn truncated(field: &str) -> DecodeError {
    DecodeError::Payload(format!("truncated while reading {}", field))
}

/// Reports whether a ROS1 message definition declares an `events` array.
///
/// Only the top-level definition is inspected; nested definitions that follow
/// a `MSG:` separator line are ignored. An empty definition is accepted, since
/// some recorders do not store one.
pub fn declares_event_list(definition: &str) -> bool {
    if definition.trim().is_empty() {
        return true;
    }

    for line in definition.lines() {
        let line = line.trim();
        if line.starts_with("MSG:") || line.starts_with("====") {
            break;
        }
        // Strip trailing comments
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut parts = line.split_whitespace();
        if let (Some(field_type), Some(name)) = (parts.next(), parts.next()) {
            if name == "events" && field_type.ends_with("[]") {
                return true;
            }
        }
    }

    false
}
