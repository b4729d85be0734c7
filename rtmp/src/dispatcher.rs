//! Routes reassembled packets by message type.
//!
//! Two types carry behavior today: SetChunkSize (the connection loop must
//! retune its [`ChunkStreamReader`](crate::chunk::ChunkStreamReader) with
//! the announced size) and CommandAmf0, whose payload is decoded and
//! inspected for the `connect` command.  Every other known type is a
//! deliberate no-op; an id outside the specification is a protocol
//! violation that terminates the connection.

use crate::chunk::RtmpPacket;
use crate::messages::RtmpMessageType;
use byteorder::{BigEndian, ByteOrder};
use minnow_amf::{deserialize, Amf0DeserializationError, Amf0Value, AmfStr};
use thiserror::Error;

/// What a successfully dispatched packet asks of the connection loop.
#[derive(PartialEq, Debug)]
pub enum DispatchOutcome {
    /// The peer announced a new chunk size; the chunk reader must be
    /// retuned before the next packet is parsed
    ChunkSizeChanged(u32),

    /// A `connect` command arrived.  The application name is pulled out of
    /// the command object when one was sent
    ConnectRequested { app: Option<AmfStr> },

    /// A command other than `connect`; received and ignored
    CommandReceived { name: AmfStr },

    /// A known message type with no behavior attached
    Ignored(RtmpMessageType),
}

/// An enumeration defining all the possible errors that could occur while
/// dispatching a packet.  All of them are fatal for the connection.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The chunk header carried a type id outside the RTMP specification
    #[error("Unknown RTMP message type id {type_id}")]
    UnknownMessageType { type_id: u8 },

    /// A SetChunkSize message must carry a 32 bit size between 1 and
    /// 2,147,483,647
    #[error("SetChunkSize carried an invalid size of {size}")]
    InvalidChunkSize { size: u32 },

    /// The body of a command message was not decodable AMF0
    #[error("Command payload was not valid AMF0: {0}")]
    InvalidCommandPayload(#[from] Amf0DeserializationError),

    /// A command message must start with a string command name
    #[error("Command message did not start with a command name")]
    MalformedCommand,
}

/// Dispatches one reassembled packet, switching on its message type.
pub fn dispatch(packet: &RtmpPacket) -> Result<DispatchOutcome, DispatchError> {
    let message_type = match RtmpMessageType::from_type_id(packet.message_type_id) {
        Some(message_type) => message_type,
        None => {
            return Err(DispatchError::UnknownMessageType {
                type_id: packet.message_type_id,
            })
        }
    };

    match message_type {
        RtmpMessageType::SetChunkSize => handle_set_chunk_size(&packet.body),
        RtmpMessageType::CommandAmf0 => handle_amf0_command(&packet.body),
        _ => Ok(DispatchOutcome::Ignored(message_type)),
    }
}

fn handle_set_chunk_size(body: &[u8]) -> Result<DispatchOutcome, DispatchError> {
    if body.len() < 4 {
        return Err(DispatchError::InvalidChunkSize { size: 0 });
    }

    // The top bit of the field is reserved
    let size = BigEndian::read_u32(body) & 0x7fff_ffff;
    if size == 0 {
        return Err(DispatchError::InvalidChunkSize { size });
    }

    Ok(DispatchOutcome::ChunkSizeChanged(size))
}

fn handle_amf0_command(body: &[u8]) -> Result<DispatchOutcome, DispatchError> {
    let mut values = deserialize(body)?;

    if values.is_empty() {
        return Err(DispatchError::MalformedCommand);
    }

    let name = match values.remove(0) {
        Amf0Value::Utf8String(name) => name,
        _ => return Err(DispatchError::MalformedCommand),
    };

    if name != "connect" {
        return Ok(DispatchOutcome::CommandReceived { name });
    }

    // connect payloads are [name, transaction id, command object, ...], but
    // the trailing values are optional on the wire
    let app = values
        .into_iter()
        .find_map(|value| value.get_object())
        .and_then(|object| {
            object.property_named("app").and_then(|property| {
                if let Amf0Value::Utf8String(app) = &property.value {
                    Some(app.clone())
                } else {
                    None
                }
            })
        });

    Ok(DispatchOutcome::ConnectRequested { app })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::RtmpTimestamp;
    use bytes::Bytes;
    use minnow_amf::{serialize, Amf0Object};

    fn packet_of(type_id: u8, body: Vec<u8>) -> RtmpPacket {
        RtmpPacket {
            timestamp: RtmpTimestamp::new(0),
            has_absolute_timestamp: true,
            message_type_id: type_id,
            message_stream_id: 0,
            body: Bytes::from(body),
        }
    }

    #[test]
    fn set_chunk_size_surfaces_new_size() {
        let packet = packet_of(1, vec![0x00, 0x00, 0x10, 0x00]);
        let outcome = dispatch(&packet).unwrap();

        assert_eq!(outcome, DispatchOutcome::ChunkSizeChanged(4096));
    }

    #[test]
    fn set_chunk_size_ignores_reserved_top_bit() {
        let packet = packet_of(1, vec![0x80, 0x00, 0x10, 0x00]);
        let outcome = dispatch(&packet).unwrap();

        assert_eq!(outcome, DispatchOutcome::ChunkSizeChanged(4096));
    }

    #[test]
    fn error_when_set_chunk_size_truncated() {
        let packet = packet_of(1, vec![0x00, 0x00]);
        assert!(matches!(
            dispatch(&packet),
            Err(DispatchError::InvalidChunkSize { .. })
        ));
    }

    #[test]
    fn connect_command_is_recognized() {
        let mut command_object = Amf0Object::new();
        command_object.add_property("app", Amf0Value::Utf8String("live".into()));
        command_object.add_property("tcUrl", Amf0Value::Utf8String("rtmp://host/live".into()));

        let body = serialize(&[
            Amf0Value::Utf8String("connect".into()),
            Amf0Value::Number(1.0),
            Amf0Value::Object(command_object),
        ])
        .unwrap();

        let outcome = dispatch(&packet_of(20, body)).unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::ConnectRequested {
                app: Some("live".into())
            }
        );
    }

    #[test]
    fn bare_connect_string_is_still_recognized() {
        let body = serialize(&[Amf0Value::Utf8String("connect".into())]).unwrap();
        let outcome = dispatch(&packet_of(20, body)).unwrap();

        assert_eq!(outcome, DispatchOutcome::ConnectRequested { app: None });
    }

    #[test]
    fn other_commands_are_received_but_ignored() {
        let body = serialize(&[
            Amf0Value::Utf8String("createStream".into()),
            Amf0Value::Number(2.0),
            Amf0Value::Null,
        ])
        .unwrap();

        let outcome = dispatch(&packet_of(20, body)).unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::CommandReceived {
                name: "createStream".into()
            }
        );
    }

    #[test]
    fn error_when_command_does_not_start_with_a_name() {
        let body = serialize(&[Amf0Value::Number(1.0)]).unwrap();

        assert!(matches!(
            dispatch(&packet_of(20, body)),
            Err(DispatchError::MalformedCommand)
        ));
    }

    #[test]
    fn error_when_command_payload_is_not_amf0() {
        let packet = packet_of(20, vec![0xff, 0x00, 0x01]);

        assert!(matches!(
            dispatch(&packet),
            Err(DispatchError::InvalidCommandPayload(_))
        ));
    }

    #[test]
    fn known_but_unhandled_types_are_noops() {
        for (type_id, expected) in [
            (2, RtmpMessageType::Abort),
            (3, RtmpMessageType::Acknowledgement),
            (4, RtmpMessageType::UserControl),
            (5, RtmpMessageType::WindowAcknowledgementSize),
            (6, RtmpMessageType::SetPeerBandwidth),
            (8, RtmpMessageType::Audio),
            (9, RtmpMessageType::Video),
            (15, RtmpMessageType::DataAmf3),
            (16, RtmpMessageType::SharedObjectAmf3),
            (17, RtmpMessageType::CommandAmf3),
            (18, RtmpMessageType::DataAmf0),
            (19, RtmpMessageType::SharedObjectAmf0),
            (22, RtmpMessageType::Aggregate),
        ] {
            let outcome = dispatch(&packet_of(type_id, vec![1, 2, 3])).unwrap();
            assert_eq!(outcome, DispatchOutcome::Ignored(expected));
        }
    }

    #[test]
    fn error_when_message_type_is_unknown() {
        let packet = packet_of(0xff, vec![]);

        assert!(matches!(
            dispatch(&packet),
            Err(DispatchError::UnknownMessageType { type_id: 0xff })
        ));
    }
}
