use super::errors::ChunkReadError;
use super::header::{parse_chunk_stream_id, ChunkHeader, ChunkHeaderFormat};
use super::RtmpPacket;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::BytesMut;
use std::cmp::min;
use std::collections::HashMap;

/// Chunk size every connection starts with, per the RTMP specification.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 128;

/// Largest chunk size a SetChunkSize message can carry (31 bits).
pub const MAX_CHUNK_SIZE: usize = 0x7fff_ffff;

/// A timestamp field of all ones announces a 4 byte extended timestamp.
const EXTENDED_TIMESTAMP_SENTINEL: u32 = 0xff_ffff;

enum ChunkOutcome {
    NotEnoughBytes,
    ChunkConsumed,
    MessageCompleted(RtmpPacket),
}

struct PartialMessage {
    data: BytesMut,
    absolute_timestamp: bool,
}

/// Reassembles raw transport bytes into whole RTMP messages.
///
/// Because compressed chunk headers inherit from previous chunks and
/// because the peer can renegotiate its chunk size mid-connection, every
/// byte arriving on a connection must pass through the same reader
/// instance, in order.
///
/// It is normal for one read off the socket to contain a partial message
/// (or a partial chunk); such bytes are buffered internally and the same
/// bytes must not be passed in again.  Callers should drain completed
/// messages by calling `next_packet` with an empty slice until it returns
/// `None`:
///
/// ```no_run
/// use minnow_rtmp::chunk::ChunkStreamReader;
///
/// # fn read_from_socket(_buf: &mut [u8]) -> usize { 0 }
/// let mut reader = ChunkStreamReader::new();
/// let mut buffer = [0_u8; 2048];
/// loop {
///     let byte_count = read_from_socket(&mut buffer);
///     let mut incoming = &buffer[..byte_count];
///     while let Some(packet) = reader.next_packet(incoming).unwrap() {
///         incoming = &[];
///         // dispatch packet
///         # drop(packet);
///     }
/// }
/// ```
pub struct ChunkStreamReader {
    max_chunk_size: usize,
    buffer: BytesMut,
    previous_headers: HashMap<u32, ChunkHeader>,
    partial_messages: HashMap<u32, PartialMessage>,
}

impl Default for ChunkStreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStreamReader {
    pub fn new() -> ChunkStreamReader {
        ChunkStreamReader {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            buffer: BytesMut::with_capacity(4096),
            previous_headers: HashMap::new(),
            partial_messages: HashMap::new(),
        }
    }

    /// Appends freshly read bytes and attempts to slice one complete
    /// message out of the accumulated buffer.
    ///
    /// If the bytes formed more than one message only the first is
    /// returned; keep calling with an empty slice to drain the rest.  That
    /// matters because a SetChunkSize message must take effect (via
    /// [`set_max_chunk_size`](Self::set_max_chunk_size)) before the chunks
    /// that follow it are parsed.
    pub fn next_packet(&mut self, bytes: &[u8]) -> Result<Option<RtmpPacket>, ChunkReadError> {
        self.buffer.extend_from_slice(bytes);

        loop {
            match self.read_one_chunk()? {
                ChunkOutcome::NotEnoughBytes => return Ok(None),
                ChunkOutcome::ChunkConsumed => continue,
                ChunkOutcome::MessageCompleted(packet) => return Ok(Some(packet)),
            }
        }
    }

    /// Applies a new maximum chunk size announced by the peer.
    ///
    /// Should only be called in reaction to a SetChunkSize message; any
    /// mismatch between the peers desynchronizes the chunk framing.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkReadError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(ChunkReadError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Parses one chunk from the front of the buffer, consuming nothing
    /// unless the whole chunk (header and payload slice) is present.
    fn read_one_chunk(&mut self) -> Result<ChunkOutcome, ChunkReadError> {
        let buffer = &self.buffer[..];
        let (csid, basic_length) = match parse_chunk_stream_id(buffer) {
            None => return Ok(ChunkOutcome::NotEnoughBytes),
            Some(value) => value,
        };

        let format = ChunkHeaderFormat::from_first_byte(buffer[0]);
        let header_length = format.message_header_length();
        if buffer.len() < basic_length + header_length {
            return Ok(ChunkOutcome::NotEnoughBytes);
        }

        let mut header = match format {
            ChunkHeaderFormat::Large => {
                let mut new_header = ChunkHeader::new();
                new_header.chunk_stream_id = csid;
                new_header
            }

            _ => match self.previous_headers.get(&csid) {
                None => return Err(ChunkReadError::NoPreviousChunkOnStream { csid }),
                Some(previous) => previous.clone(),
            },
        };

        let fields = &buffer[basic_length..];
        match format {
            ChunkHeaderFormat::Large => {
                header.timestamp_field = BigEndian::read_u24(fields);
                header.message_length = BigEndian::read_u24(&fields[3..]);
                header.message_type_id = fields[6];
                // The stream id is the one little-endian field in the header
                header.message_stream_id = LittleEndian::read_u32(&fields[7..]);
            }

            ChunkHeaderFormat::Medium => {
                header.timestamp_field = BigEndian::read_u24(fields);
                header.message_length = BigEndian::read_u24(&fields[3..]);
                header.message_type_id = fields[6];
            }

            ChunkHeaderFormat::Small => {
                header.timestamp_field = BigEndian::read_u24(fields);
            }

            ChunkHeaderFormat::Minimum => (),
        }

        let mut offset = basic_length + header_length;
        let extended_timestamp = if header.timestamp_field >= EXTENDED_TIMESTAMP_SENTINEL {
            if buffer.len() < offset + 4 {
                return Ok(ChunkOutcome::NotEnoughBytes);
            }

            let value = BigEndian::read_u32(&buffer[offset..]);
            offset += 4;
            Some(value)
        } else {
            None
        };

        let first_chunk_of_message = !self.partial_messages.contains_key(&csid);

        // Timestamps are absolute in Large headers and deltas everywhere
        // else.  A delta is applied once per message: continuation chunks
        // of a split message must not re-apply it, and their extended
        // timestamp (re-sent by some encoders) is likewise ignored.
        match format {
            ChunkHeaderFormat::Large => {
                header
                    .timestamp
                    .set(extended_timestamp.unwrap_or(header.timestamp_field));
            }

            ChunkHeaderFormat::Medium | ChunkHeaderFormat::Small => {
                header.timestamp = header.timestamp + header.timestamp_field;
                if let Some(extended) = extended_timestamp {
                    if first_chunk_of_message {
                        header.timestamp = header.timestamp
                            + extended.wrapping_sub(EXTENDED_TIMESTAMP_SENTINEL);
                    }
                }
            }

            ChunkHeaderFormat::Minimum => {
                if first_chunk_of_message {
                    header.timestamp = header.timestamp + header.timestamp_field;
                    if let Some(extended) = extended_timestamp {
                        header.timestamp = header.timestamp
                            + extended.wrapping_sub(EXTENDED_TIMESTAMP_SENTINEL);
                    }
                }
            }
        }

        let message_length = header.message_length as usize;
        let accumulated = self
            .partial_messages
            .get(&csid)
            .map_or(0, |message| message.data.len());
        let remaining_bytes = match message_length.checked_sub(accumulated) {
            Some(remaining) => remaining,
            None => return Err(ChunkReadError::MessageLengthShrank { csid }),
        };

        let payload_length = min(remaining_bytes, self.max_chunk_size);
        if buffer.len() < offset + payload_length {
            return Ok(ChunkOutcome::NotEnoughBytes);
        }

        // The whole chunk is present; consume it
        let consumed = self.buffer.split_to(offset + payload_length);
        let payload = &consumed[offset..];

        let is_complete = {
            let message = self
                .partial_messages
                .entry(csid)
                .or_insert_with(|| PartialMessage {
                    data: BytesMut::with_capacity(message_length),
                    absolute_timestamp: format == ChunkHeaderFormat::Large,
                });
            message.data.extend_from_slice(payload);
            message.data.len() == message_length
        };

        self.previous_headers.insert(csid, header.clone());

        if !is_complete {
            return Ok(ChunkOutcome::ChunkConsumed);
        }

        match self.partial_messages.remove(&csid) {
            Some(message) => Ok(ChunkOutcome::MessageCompleted(RtmpPacket {
                timestamp: header.timestamp,
                has_absolute_timestamp: message.absolute_timestamp,
                message_type_id: header.message_type_id,
                message_stream_id: header.message_stream_id,
                body: message.data.freeze(),
            })),
            None => Ok(ChunkOutcome::ChunkConsumed),
        }
    }
}
