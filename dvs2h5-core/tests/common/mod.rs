//! Test fixtures: minimal ROS1 v2.0 bag and AEDAT4 writers, and scripted
//! batch sources.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use dvs2h5_core::{DecodeError, EventBatchSource, RecordingEvent};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

const OP_MSG_DATA: u8 = 0x02;
const OP_BAG_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

/// Size of the version line plus the padded bag header record.
const BAG_HEADER_SIZE: usize = 4096;

pub const EVENT_ARRAY_DEFINITION: &str = "Header header\n\
uint32 height\n\
uint32 width\n\
Event[] events\n\
================================================================================\n\
MSG: dvs_msgs/Event\n\
uint16 x\n\
uint16 y\n\
time ts\n\
bool polarity\n";

/// `(x, y, secs, nsecs, polarity)`
pub type WireEvent = (u16, u16, u32, u32, bool);

/// Serializes a `dvs_msgs/EventArray`.
pub fn event_array(events: &[WireEvent]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(0).unwrap(); // seq
    buf.write_u32::<LittleEndian>(0).unwrap(); // stamp.secs
    buf.write_u32::<LittleEndian>(0).unwrap(); // stamp.nsecs
    let frame_id = b"dvs";
    buf.write_u32::<LittleEndian>(frame_id.len() as u32).unwrap();
    buf.extend_from_slice(frame_id);
    buf.write_u32::<LittleEndian>(260).unwrap();
    buf.write_u32::<LittleEndian>(346).unwrap();
    buf.write_u32::<LittleEndian>(events.len() as u32).unwrap();
    for &(x, y, secs, nsecs, polarity) in events {
        buf.write_u16::<LittleEndian>(x).unwrap();
        buf.write_u16::<LittleEndian>(y).unwrap();
        buf.write_u32::<LittleEndian>(secs).unwrap();
        buf.write_u32::<LittleEndian>(nsecs).unwrap();
        buf.write_u8(polarity as u8).unwrap();
    }
    buf
}

#[derive(Debug, Clone)]
struct Connection {
    id: u32,
    topic: String,
    message_type: String,
    definition: String,
}

#[derive(Debug, Clone)]
struct Message {
    conn: u32,
    time: (u32, u32),
    data: Vec<u8>,
}

/// Builds an uncompressed ROS1 v2.0 bag file.
#[derive(Debug, Clone)]
pub struct BagBuilder {
    connections: Vec<Connection>,
    chunks: Vec<Vec<Message>>,
    index_connections: bool,
}

impl Default for BagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BagBuilder {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            chunks: vec![Vec::new()],
            index_connections: true,
        }
    }

    /// Leaves connection records out of the index section; they then only
    /// appear inside chunks.
    pub fn without_index_connections(mut self) -> Self {
        self.index_connections = false;
        self
    }

    pub fn connection(&mut self, topic: &str, message_type: &str, definition: &str) -> u32 {
        let id = self.connections.len() as u32;
        self.connections.push(Connection {
            id,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
            definition: definition.to_string(),
        });
        id
    }

    /// Adds a `dvs_msgs/EventArray` connection.
    pub fn event_connection(&mut self, topic: &str) -> u32 {
        self.connection(topic, "dvs_msgs/EventArray", EVENT_ARRAY_DEFINITION)
    }

    /// Appends a raw message to the current chunk.
    pub fn message(&mut self, conn: u32, time: (u32, u32), data: Vec<u8>) -> &mut Self {
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.push(Message { conn, time, data });
        }
        self
    }

    /// Appends an `EventArray` message stamped with its first event's time.
    pub fn events(&mut self, conn: u32, events: &[WireEvent]) -> &mut Self {
        let time = events.first().map_or((0, 0), |e| (e.2, e.3));
        self.message(conn, time, event_array(events))
    }

    /// Starts a new chunk for subsequent messages.
    pub fn next_chunk(&mut self) -> &mut Self {
        if self.chunks.last().is_some_and(|c| !c.is_empty()) {
            self.chunks.push(Vec::new());
        }
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut chunk_infos = Vec::new();

        for chunk in self.chunks.iter().filter(|c| !c.is_empty()) {
            let chunk_pos = (BAG_HEADER_SIZE + body.len()) as u64;

            let mut data = Vec::new();
            let mut written = Vec::new();
            let mut index: BTreeMap<u32, Vec<((u32, u32), u32)>> = BTreeMap::new();
            for msg in chunk {
                if !written.contains(&msg.conn) {
                    write_connection(&mut data, &self.connections[msg.conn as usize]);
                    written.push(msg.conn);
                }
                let offset = data.len() as u32;
                write_header(
                    &mut data,
                    &[
                        ("op", vec![OP_MSG_DATA]),
                        ("conn", msg.conn.to_le_bytes().to_vec()),
                        ("time", time_bytes(msg.time)),
                    ],
                );
                write_data(&mut data, &msg.data);
                index.entry(msg.conn).or_default().push((msg.time, offset));
            }

            write_header(
                &mut body,
                &[
                    ("op", vec![OP_CHUNK]),
                    ("compression", b"none".to_vec()),
                    ("size", (data.len() as u32).to_le_bytes().to_vec()),
                ],
            );
            write_data(&mut body, &data);

            for (conn, entries) in &index {
                write_header(
                    &mut body,
                    &[
                        ("op", vec![OP_INDEX_DATA]),
                        ("ver", 1u32.to_le_bytes().to_vec()),
                        ("conn", conn.to_le_bytes().to_vec()),
                        ("count", (entries.len() as u32).to_le_bytes().to_vec()),
                    ],
                );
                let mut index_data = Vec::new();
                for (time, offset) in entries {
                    index_data.extend_from_slice(&time_bytes(*time));
                    index_data.extend_from_slice(&offset.to_le_bytes());
                }
                write_data(&mut body, &index_data);
            }

            let start = chunk.iter().map(|m| m.time).min().unwrap_or((0, 0));
            let end = chunk.iter().map(|m| m.time).max().unwrap_or((0, 0));
            let counts: Vec<(u32, u32)> = index
                .iter()
                .map(|(conn, entries)| (*conn, entries.len() as u32))
                .collect();
            chunk_infos.push((chunk_pos, start, end, counts));
        }

        let index_pos = (BAG_HEADER_SIZE + body.len()) as u64;

        let mut index_section = Vec::new();
        if self.index_connections {
            for conn in &self.connections {
                write_connection(&mut index_section, conn);
            }
        }
        for (chunk_pos, start, end, counts) in &chunk_infos {
            write_header(
                &mut index_section,
                &[
                    ("op", vec![OP_CHUNK_INFO]),
                    ("ver", 1u32.to_le_bytes().to_vec()),
                    ("chunk_pos", chunk_pos.to_le_bytes().to_vec()),
                    ("start_time", time_bytes(*start)),
                    ("end_time", time_bytes(*end)),
                    ("count", (counts.len() as u32).to_le_bytes().to_vec()),
                ],
            );
            let mut data = Vec::new();
            for (conn, count) in counts {
                data.extend_from_slice(&conn.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
            }
            write_data(&mut index_section, &data);
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"#ROSBAG V2.0\n");
        let version_len = bytes.len();
        let header_len = write_header(
            &mut bytes,
            &[
                ("op", vec![OP_BAG_HEADER]),
                ("index_pos", index_pos.to_le_bytes().to_vec()),
                (
                    "conn_count",
                    (self.connections.len() as u32).to_le_bytes().to_vec(),
                ),
                (
                    "chunk_count",
                    (chunk_infos.len() as u32).to_le_bytes().to_vec(),
                ),
            ],
        );
        let padding = BAG_HEADER_SIZE - version_len - 4 - header_len - 4;
        write_data(&mut bytes, &vec![b' '; padding]);
        assert_eq!(bytes.len(), BAG_HEADER_SIZE);

        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(&index_section);
        bytes
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

fn write_connection(buffer: &mut Vec<u8>, conn: &Connection) {
    write_header(
        buffer,
        &[
            ("op", vec![OP_CONNECTION]),
            ("conn", conn.id.to_le_bytes().to_vec()),
            ("topic", conn.topic.as_bytes().to_vec()),
        ],
    );

    let mut data = Vec::new();
    write_header(
        &mut data,
        &[
            ("topic", conn.topic.as_bytes().to_vec()),
            ("type", conn.message_type.as_bytes().to_vec()),
            ("md5sum", b"7f8dc7b1e42a5c1ab1d3cc5d1b3a4a23".to_vec()),
            ("message_definition", conn.definition.as_bytes().to_vec()),
            ("callerid", b"/dvs_ros_driver".to_vec()),
            ("latching", b"0".to_vec()),
        ],
    );
    write_data(buffer, &data);
}

/// Writes `header_len | fields`, returning `header_len`.
fn write_header(buffer: &mut Vec<u8>, fields: &[(&str, Vec<u8>)]) -> usize {
    let mut header = Vec::new();
    for (name, value) in fields {
        header
            .write_u32::<LittleEndian>((name.len() + 1 + value.len()) as u32)
            .unwrap();
        header.extend_from_slice(name.as_bytes());
        header.push(b'=');
        header.extend_from_slice(value);
    }
    buffer
        .write_u32::<LittleEndian>(header.len() as u32)
        .unwrap();
    buffer.extend_from_slice(&header);
    header.len()
}

fn write_data(buffer: &mut Vec<u8>, data: &[u8]) {
    buffer.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    buffer.extend_from_slice(data);
}

fn time_bytes(time: (u32, u32)) -> Vec<u8> {
    let mut bytes = time.0.to_le_bytes().to_vec();
    bytes.extend_from_slice(&time.1.to_le_bytes());
    bytes
}

/// Batch source replaying a fixed script, then stopping.
///
/// `None` entries model pulls that returned nothing while still running.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Option<Vec<RecordingEvent>>>,
    pub pulls: usize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<Vec<RecordingEvent>>>) -> Self {
        Self {
            script: script.into(),
            pulls: 0,
        }
    }
}

impl EventBatchSource for ScriptedSource {
    fn is_running(&self) -> bool {
        !self.script.is_empty()
    }

    fn next_batch(&mut self) -> Result<Option<Vec<RecordingEvent>>, DecodeError> {
        self.pulls += 1;
        Ok(self.script.pop_front().flatten())
    }
}

const AEDAT_MAGIC: &[u8] = b"#!AER-DAT4.0\r\n";

/// `(t, x, y, on)`
pub type AedatEvent = (i64, i16, i16, bool);

#[derive(Debug, Clone)]
enum AedatPacket {
    Events(Vec<AedatEvent>),
    Frame,
}

/// Builds an uncompressed AEDAT4 recording with one event stream (id 0) and
/// one frame stream (id 1).
///
/// The flatbuffers are laid out by hand: the IO header only carries its XML
/// description, and event packets are size-prefixed `EVTS` buffers holding a
/// single vector of 16-byte `Event` structs.
#[derive(Debug, Clone, Default)]
pub struct AedatBuilder {
    packets: Vec<AedatPacket>,
}

impl AedatBuilder {
    pub const EVENT_STREAM: u32 = 0;
    pub const FRAME_STREAM: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&mut self, events: &[AedatEvent]) -> &mut Self {
        self.packets.push(AedatPacket::Events(events.to_vec()));
        self
    }

    /// Appends a packet on the frame stream; its payload is never decoded.
    pub fn frame(&mut self) -> &mut Self {
        self.packets.push(AedatPacket::Frame);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = AEDAT_MAGIC.to_vec();
        let header = io_header(&aedat_description());
        write_data(&mut bytes, &header);

        for packet in &self.packets {
            let (stream_id, buffer) = match packet {
                AedatPacket::Events(events) => (Self::EVENT_STREAM, event_packet(events)),
                AedatPacket::Frame => (Self::FRAME_STREAM, frame_packet()),
            };
            bytes.write_u32::<LittleEndian>(stream_id).unwrap();
            write_data(&mut bytes, &buffer);
        }
        bytes
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

fn aedat_description() -> String {
    let stream = |id: u32, identifier: &str| {
        format!(
            "<node name=\"{id}\" path=\"/mainloop/Recorder/outInfo/{id}/\">\
             <attr key=\"compression\" type=\"string\">NONE</attr>\
             <attr key=\"typeIdentifier\" type=\"string\">{identifier}</attr>\
             <node name=\"info\" path=\"/mainloop/Recorder/outInfo/{id}/info/\">\
             <attr key=\"sizeX\" type=\"int\">346</attr>\
             <attr key=\"sizeY\" type=\"int\">260</attr>\
             <attr key=\"source\" type=\"string\">DAVIS346</attr>\
             </node></node>"
        )
    };
    format!(
        "<dv version=\"2.0\">\
         <node name=\"outInfo\" path=\"/mainloop/Recorder/outInfo/\">{}{}</node>\
         </dv>",
        stream(AedatBuilder::EVENT_STREAM, "EVTS"),
        stream(AedatBuilder::FRAME_STREAM, "FRME"),
    )
}

/// IO header table with only its third field (`description`) set, so the
/// compression defaults to none and the data table position to -1.
fn io_header(description: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(16).unwrap(); // root table at 16
    // vtable at 4: 3 fields, table of 8 bytes, description at +4
    for value in [10u16, 8, 0, 0, 4] {
        buf.write_u16::<LittleEndian>(value).unwrap();
    }
    buf.write_u16::<LittleEndian>(0).unwrap(); // pad
    buf.write_i32::<LittleEndian>(16 - 4).unwrap(); // table -> vtable
    buf.write_u32::<LittleEndian>(4).unwrap(); // string at 24
    buf.write_u32::<LittleEndian>(description.len() as u32).unwrap();
    buf.extend_from_slice(description.as_bytes());
    buf.push(0);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
    buf
}

/// Size-prefixed `EventPacket` buffer with the `EVTS` identifier.
fn event_packet(events: &[AedatEvent]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>((28 + 16 * events.len()) as u32).unwrap();
    buf.write_u32::<LittleEndian>(16).unwrap(); // root table at 4 + 16
    buf.extend_from_slice(b"EVTS");
    // vtable at 12: 1 field, table of 8 bytes, elements at +4
    for value in [6u16, 8, 4, 0] {
        buf.write_u16::<LittleEndian>(value).unwrap();
    }
    buf.write_i32::<LittleEndian>(20 - 12).unwrap(); // table -> vtable
    buf.write_u32::<LittleEndian>(4).unwrap(); // vector at 28
    buf.write_u32::<LittleEndian>(events.len() as u32).unwrap();
    for &(t, x, y, on) in events {
        buf.write_i64::<LittleEndian>(t).unwrap();
        buf.write_i16::<LittleEndian>(x).unwrap();
        buf.write_i16::<LittleEndian>(y).unwrap();
        buf.push(on as u8);
        buf.extend_from_slice(&[0; 3]);
    }
    buf
}

fn frame_packet() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(12).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
    buf.extend_from_slice(b"FRME");
    buf.extend_from_slice(&[0; 8]);
    buf
}
