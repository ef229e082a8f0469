//! ROS1 bag source: pulls `dvs_msgs/EventArray` messages from one topic.
//!
//! Connections are learned from the index section when the bag is opened and
//! from connection records embedded in chunks while iterating. Messages are
//! decoded one chunk at a time, so memory use is bounded by the chunk size
//! rather than by the size of the bag.

use crate::parser::{self, DecodeError};
use crate::types::BagEvent;
use log::debug;
use rosbag::record_types::Connection;
use rosbag::{ChunkRecord, IndexRecord, MessageRecord, RosBag};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Topic the DVS ROS driver publishes on.
pub const DEFAULT_EVENT_TOPIC: &str = "/dvs/events";

/// ROS type name of an event batch message.
pub const EVENT_ARRAY_TYPE: &str = "dvs_msgs/EventArray";

/// What the reader needs to know about a connection.
#[derive(Debug, Clone)]
struct ConnectionInfo {
    topic: String,
    message_type: String,
    has_event_list: bool,
}

impl ConnectionInfo {
    fn from_record(conn: &Connection<'_>) -> Self {
        Self {
            topic: conn.topic.to_string(),
            message_type: conn.tp.to_string(),
            has_event_list: parser::declares_event_list(&conn.message_definition),
        }
    }

    /// An empty type tag is accepted alongside the expected one.
    fn is_event_array(&self) -> bool {
        self.message_type == EVENT_ARRAY_TYPE || self.message_type.is_empty()
    }
}

/// Reader over the event batches of one topic in a ROS1 bag.
///
/// The bag stays open (memory-mapped) for as long as the reader lives and is
/// released when the reader is dropped. Iterating again restarts from the
/// first chunk.
pub struct BagEventReader {
    path: PathBuf,
    bag: RosBag,
    topic: String,
    connections: HashMap<u32, ConnectionInfo>,
}

impl std::fmt::Debug for BagEventReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagEventReader")
            .field("path", &self.path)
            .field("topic", &self.topic)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

impl BagEventReader {
    /// Opens a bag and indexes its connections.
    pub fn open<P: AsRef<Path>>(path: P, topic: &str) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let bag = RosBag::new(path)
            .map_err(|e| DecodeError::Bag(format!("failed to open {}: {e}", path.display())))?;

        let mut connections = HashMap::new();
        for record in bag.index_records() {
            let record =
                record.map_err(|e| DecodeError::Bag(format!("failed to read index: {e}")))?;
            if let IndexRecord::Connection(conn) = record {
                connections
                    .entry(conn.id)
                    .or_insert_with(|| ConnectionInfo::from_record(&conn));
            }
        }

        debug!(
            "Opened {} with {} connection(s)",
            path.display(),
            connections.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            bag,
            topic: topic.to_string(),
            connections,
        })
    }

    /// Path of the underlying bag file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Topic this reader filters on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Reports whether any known connection publishes on the reader's topic.
    ///
    /// Connections that only appear inside chunks are not known until
    /// iteration reaches them.
    pub fn has_topic(&self) -> bool {
        self.connections.values().any(|c| c.topic == self.topic)
    }

    /// Lazily yields the events of each matching message, in bag order.
    ///
    /// Messages on other topics, of another type, without an event list, or
    /// with zero events are skipped. A malformed payload on a matching
    /// connection is returned as an error.
    pub fn batches(&self) -> impl Iterator<Item = Result<Vec<BagEvent>, DecodeError>> + '_ {
        let mut connections = self.connections.clone();
        let topic = self.topic.as_str();

        self.bag
            .chunk_records()
            .flat_map(move |record| match record {
                Ok(ChunkRecord::Chunk(chunk)) => {
                    decode_chunk(chunk.messages(), topic, &mut connections)
                }
                Ok(_) => Vec::new(),
                Err(e) => vec![Err(DecodeError::Bag(format!("failed to read chunk: {e}")))],
            })
    }
}

/// Decodes every matching message of one chunk.
fn decode_chunk<'a, I>(
    messages: I,
    topic: &str,
    connections: &mut HashMap<u32, ConnectionInfo>,
) -> Vec<Result<Vec<BagEvent>, DecodeError>>
where
    I: Iterator<Item = Result<MessageRecord<'a>, rosbag::Error>>,
{
    let mut batches = Vec::new();

    for record in messages {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                batches.push(Err(DecodeError::Bag(format!(
                    "failed to read message: {e}"
                ))));
                break;
            }
        };

        if let MessageRecord::Connection(conn) = &record {
            connections
                .entry(conn.id)
                .or_insert_with(|| ConnectionInfo::from_record(conn));
            continue;
        }
        let MessageRecord::MessageData(msg) = record else {
            continue;
        };

        let Some(conn) = connections.get(&msg.conn_id) else {
            debug!("Skipping message on unknown connection {}", msg.conn_id);
            continue;
        };
        if conn.topic != topic {
            continue;
        }
        if !conn.has_event_list {
            debug!("Skipping message without an event list on {}", topic);
            continue;
        }
        if !conn.is_event_array() {
            debug!(
                "Skipping {} message on {}; expected {}",
                conn.message_type, topic, EVENT_ARRAY_TYPE
            );
            continue;
        }

        match parser::parse_event_array(&msg.data[..]) {
            Ok(array) if array.events.is_empty() => continue,
            Ok(array) => batches.push(Ok(array.events)),
            Err(e) => {
                batches.push(Err(e));
                break;
            }
        }
    }

    batches
}
