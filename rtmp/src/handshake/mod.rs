//! Server side of the RTMP handshake.
//!
//! The handshake is a fixed exchange that happens once, before any chunked
//! messages flow: the client sends `c0` (one version byte) and `c1`
//! (1536 bytes: 4 byte time, 4 reserved zero bytes, 1528 random bytes),
//! the server answers with `s0`/`s1` of the same shapes, then each side
//! echoes the other's packet 1 as `c2`/`s2`.
//!
//! Only the plain (unsigned) handshake is implemented.  The digest variant
//! used by some Flash clients negotiates the same packet sizes but signs
//! the random section; peers attempting it will fail the echo validation.
//!
//! Bytes are fed in as they arrive off the socket and buffered internally,
//! so the caller does not need to align reads with packet boundaries:
//!
//! ```no_run
//! use minnow_rtmp::handshake::{HandshakeProcessResult, ServerHandshake};
//!
//! # fn read_from_socket(_buf: &mut [u8]) -> usize { 0 }
//! # fn write_to_socket(_bytes: &[u8]) {}
//! let mut handshake = ServerHandshake::new();
//! let mut buffer = [0_u8; 4096];
//! loop {
//!     let byte_count = read_from_socket(&mut buffer);
//!     match handshake.process_bytes(&buffer[..byte_count]).unwrap() {
//!         HandshakeProcessResult::InProgress { response_bytes } => {
//!             write_to_socket(&response_bytes);
//!         }
//!         HandshakeProcessResult::Completed { response_bytes, remaining_bytes } => {
//!             write_to_socket(&response_bytes);
//!             // remaining_bytes belong to the chunk stream
//!             break;
//!         }
//!     }
//! }
//! ```

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, WriteBytesExt};
use rand::Rng;
use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// The RTMP version this server speaks and offers in `s0`.
pub const RTMP_VERSION: u8 = 3;

/// Total size of packets 1 and 2.
pub const PACKET_SIZE: usize = 1536;

const TIME_FIELD_SIZE: usize = 4;
const RESERVED_FIELD_SIZE: usize = 4;
const RANDOM_FIELD_SIZE: usize = PACKET_SIZE - TIME_FIELD_SIZE - RESERVED_FIELD_SIZE;

const RESERVED_FIELD_OFFSET: usize = TIME_FIELD_SIZE;
const RANDOM_FIELD_OFFSET: usize = TIME_FIELD_SIZE + RESERVED_FIELD_SIZE;

#[derive(Eq, PartialEq, Debug)]
enum State {
    WaitingForC0C1,
    WaitingForC2,
    Completed,
}

/// The outcome of processing a slice of incoming handshake bytes.
#[derive(Eq, PartialEq, Debug)]
pub enum HandshakeProcessResult {
    /// More bytes are needed; any response bytes produced so far must be
    /// sent to the peer.
    InProgress { response_bytes: Vec<u8> },

    /// The handshake finished.  `remaining_bytes` holds whatever arrived
    /// after `c2` and belongs to the chunk stream.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

/// Drives the server half of the handshake over an internally buffered
/// byte stream.
pub struct ServerHandshake {
    current_state: State,
    buffer: Vec<u8>,
    sent_packet_1: [u8; PACKET_SIZE],
    received_packet_1: [u8; PACKET_SIZE],
}

impl Default for ServerHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHandshake {
    pub fn new() -> ServerHandshake {
        ServerHandshake {
            current_state: State::WaitingForC0C1,
            buffer: Vec::new(),
            sent_packet_1: [0; PACKET_SIZE],
            received_packet_1: [0; PACKET_SIZE],
        }
    }

    pub fn is_completed(&self) -> bool {
        self.current_state == State::Completed
    }

    /// Feeds bytes read off the transport into the state machine.
    ///
    /// Partial packets are buffered; the same bytes must not be passed in
    /// twice.
    pub fn process_bytes(
        &mut self,
        data: &[u8],
    ) -> Result<HandshakeProcessResult, HandshakeError> {
        self.buffer.extend_from_slice(data);

        let mut response_bytes = Vec::new();
        loop {
            match self.current_state {
                State::WaitingForC0C1 => {
                    if self.buffer.len() < 1 + PACKET_SIZE {
                        return Ok(HandshakeProcessResult::InProgress { response_bytes });
                    }

                    self.process_c0_c1(&mut response_bytes)?;
                }

                State::WaitingForC2 => {
                    if self.buffer.len() < PACKET_SIZE {
                        return Ok(HandshakeProcessResult::InProgress { response_bytes });
                    }

                    self.process_c2(&mut response_bytes)?;
                }

                State::Completed => {
                    let remaining_bytes = std::mem::take(&mut self.buffer);
                    return Ok(HandshakeProcessResult::Completed {
                        response_bytes,
                        remaining_bytes,
                    });
                }
            }
        }
    }

    fn process_c0_c1(&mut self, response_bytes: &mut Vec<u8>) -> Result<(), HandshakeError> {
        // An unexpected version in c0 is tolerated: s0 answers with the
        // version this server actually speaks instead of rejecting.
        let _client_version = self.buffer[0];

        let packet_1: Vec<u8> = self.buffer.drain(0..1 + PACKET_SIZE).skip(1).collect();
        let reserved = &packet_1[RESERVED_FIELD_OFFSET..RESERVED_FIELD_OFFSET + RESERVED_FIELD_SIZE];
        if reserved.iter().any(|byte| *byte != 0) {
            return Err(HandshakeError::NonZeroedReservedField);
        }

        self.received_packet_1.copy_from_slice(&packet_1);
        self.sent_packet_1 = create_packet_1()?;

        response_bytes.push(RTMP_VERSION);
        response_bytes.extend_from_slice(&self.sent_packet_1);

        self.current_state = State::WaitingForC2;
        Ok(())
    }

    fn process_c2(&mut self, response_bytes: &mut Vec<u8>) -> Result<(), HandshakeError> {
        let packet_2: Vec<u8> = self.buffer.drain(0..PACKET_SIZE).collect();
        if packet_2[..] != self.sent_packet_1[..] {
            return Err(HandshakeError::IncorrectEchoResponse);
        }

        // s2 is an exact copy of the client's packet 1
        response_bytes.extend_from_slice(&self.received_packet_1);

        self.current_state = State::Completed;
        Ok(())
    }
}

fn create_packet_1() -> Result<[u8; PACKET_SIZE], HandshakeError> {
    let mut random = [0_u8; RANDOM_FIELD_SIZE];
    rand::thread_rng().fill(&mut random[..]);

    let mut cursor = Cursor::new(Vec::with_capacity(PACKET_SIZE));
    cursor.write_u32::<BigEndian>(current_epoch_millis())?;
    cursor.write_u32::<BigEndian>(0)?;
    cursor.write_all(&random)?;

    let mut packet = [0_u8; PACKET_SIZE];
    packet.copy_from_slice(&cursor.into_inner());
    Ok(packet)
}

fn current_epoch_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_c0(version: u8) -> Vec<u8> {
        vec![version]
    }

    fn create_c1(epoch: u32, reserved: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        bytes.write_u32::<BigEndian>(epoch).unwrap();
        bytes.write_u32::<BigEndian>(reserved).unwrap();

        let mut random = [0_u8; RANDOM_FIELD_SIZE];
        rand::thread_rng().fill(&mut random[..]);
        bytes.write_all(&random).unwrap();

        bytes.into_inner()
    }

    fn unwrap_in_progress(result: HandshakeProcessResult) -> Vec<u8> {
        match result {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        }
    }

    #[test]
    fn starts_waiting_for_c0_and_c1() {
        let handshake = ServerHandshake::new();
        assert_eq!(handshake.current_state, State::WaitingForC0C1);
        assert!(!handshake.is_completed());
    }

    #[test]
    fn no_response_until_full_c0_and_c1_arrive() {
        let mut handshake = ServerHandshake::new();
        let response = unwrap_in_progress(handshake.process_bytes(&[3_u8; 100]).unwrap());

        assert!(response.is_empty());
        assert_eq!(handshake.current_state, State::WaitingForC0C1);
    }

    #[test]
    fn valid_c0_and_c1_produce_s0_and_s1() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(3);
        input.extend(create_c1(15, 0));

        let response = unwrap_in_progress(handshake.process_bytes(&input).unwrap());

        assert_eq!(response.len(), 1 + PACKET_SIZE);
        assert_eq!(response[0], RTMP_VERSION);

        // s1's reserved field must be zeroed
        let s1 = &response[1..];
        assert_eq!(&s1[RESERVED_FIELD_OFFSET..RANDOM_FIELD_OFFSET], &[0, 0, 0, 0]);
        assert_eq!(handshake.current_state, State::WaitingForC2);
    }

    #[test]
    fn unsupported_version_is_answered_with_version_3() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(6);
        input.extend(create_c1(15, 0));

        let response = unwrap_in_progress(handshake.process_bytes(&input).unwrap());

        assert_eq!(response[0], 3);
        assert_eq!(handshake.current_state, State::WaitingForC2);
    }

    #[test]
    fn nonzero_reserved_field_aborts_before_s1_is_sent() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(3);
        input.extend(create_c1(15, 0xdeadbeef));

        match handshake.process_bytes(&input) {
            Err(HandshakeError::NonZeroedReservedField) => (),
            Ok(_) => panic!("Expected NonZeroedReservedField but got Ok"),
            Err(x) => panic!("Expected NonZeroedReservedField but got {}", x),
        }
    }

    #[test]
    fn correct_echo_completes_handshake_with_s2_copying_c1() {
        let mut handshake = ServerHandshake::new();
        let c1 = create_c1(15, 0);
        let mut input = create_c0(3);
        input.extend(c1.clone());

        let response = unwrap_in_progress(handshake.process_bytes(&input).unwrap());
        let s1 = response[1..].to_vec();

        match handshake.process_bytes(&s1).unwrap() {
            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                assert_eq!(response_bytes, c1, "s2 was not an exact copy of c1");
                assert!(remaining_bytes.is_empty());
            }
            x => panic!("Expected Completed, got {:?}", x),
        }

        assert!(handshake.is_completed());
    }

    #[test]
    fn incorrect_echo_aborts() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(3);
        input.extend(create_c1(15, 0));

        let response = unwrap_in_progress(handshake.process_bytes(&input).unwrap());
        let mut bad_echo = response[1..].to_vec();
        bad_echo[100] = bad_echo[100].wrapping_add(1);

        match handshake.process_bytes(&bad_echo) {
            Err(HandshakeError::IncorrectEchoResponse) => (),
            Ok(_) => panic!("Expected IncorrectEchoResponse but got Ok"),
            Err(x) => panic!("Expected IncorrectEchoResponse but got {}", x),
        }
    }

    #[test]
    fn bytes_after_c2_are_surfaced_for_the_chunk_stream() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(3);
        input.extend(create_c1(15, 0));

        let response = unwrap_in_progress(handshake.process_bytes(&input).unwrap());

        let mut echo_and_more = response[1..].to_vec();
        echo_and_more.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);

        match handshake.process_bytes(&echo_and_more).unwrap() {
            HandshakeProcessResult::Completed {
                remaining_bytes, ..
            } => assert_eq!(remaining_bytes, vec![0x02, 0x00, 0x00, 0x00]),
            x => panic!("Expected Completed, got {:?}", x),
        }
    }

    #[test]
    fn handshake_works_when_bytes_arrive_fragmented() {
        let mut handshake = ServerHandshake::new();
        let mut input = create_c0(3);
        input.extend(create_c1(15, 0));

        let mut response = Vec::new();
        for fragment in input.chunks(100) {
            response = unwrap_in_progress(handshake.process_bytes(fragment).unwrap());
        }

        assert_eq!(response.len(), 1 + PACKET_SIZE);

        let s1 = response[1..].to_vec();
        let (first_half, second_half) = s1.split_at(700);
        let first = handshake.process_bytes(first_half).unwrap();
        assert!(matches!(first, HandshakeProcessResult::InProgress { .. }));

        match handshake.process_bytes(second_half).unwrap() {
            HandshakeProcessResult::Completed { .. } => (),
            x => panic!("Expected Completed, got {:?}", x),
        }
    }
}
