/*!
The chunk layer: every RTMP message after the handshake travels as one or
more chunks on a numbered chunk stream, each chunk carrying a basic header,
a message header whose size depends on its format class, and a bounded
slice of the message body.

[`ChunkStreamReader`] reassembles raw transport bytes back into whole
[`RtmpPacket`]s, tracking the per-connection state the format requires:
previously seen headers per chunk stream (compressed headers inherit from
them) and the mutable maximum chunk size negotiated via the SetChunkSize
control message.
*/

mod errors;
mod header;
mod reader;

pub use self::errors::ChunkReadError;
pub use self::header::{ChunkHeader, ChunkHeaderFormat};
pub use self::reader::{ChunkStreamReader, DEFAULT_MAX_CHUNK_SIZE, MAX_CHUNK_SIZE};

use crate::time::RtmpTimestamp;
use bytes::Bytes;

/// One fully reassembled logical RTMP message.
#[derive(PartialEq, Debug, Clone)]
pub struct RtmpPacket {
    pub timestamp: RtmpTimestamp,

    /// True when the message's first chunk carried an absolute timestamp
    /// (format class Large) rather than a delta against the previous
    /// message on the chunk stream.
    pub has_absolute_timestamp: bool,

    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub body: Bytes,
}
