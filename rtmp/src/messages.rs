//! The RTMP message type model: one variant per message type id that can
//! appear in a chunk header.
//!
//! Only a subset of these carries behavior in this server (see the
//! [`dispatcher`](crate::dispatcher) module); the rest are modeled so the
//! dispatcher can tell "known but unhandled" apart from "unknown", which
//! are very different conditions — the former is a no-op, the latter kills
//! the connection.

/// Every message type id defined by the RTMP specification.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum RtmpMessageType {
    /// Announces a new maximum chunk size for the sending peer (0x01)
    SetChunkSize,

    /// Tells the peer to discard a partially received message (0x02)
    Abort,

    /// Confirms the number of bytes received so far (0x03)
    Acknowledgement,

    /// Stream-level events such as StreamBegin or ping requests (0x04)
    UserControl,

    /// How many bytes may be sent before an acknowledgement is due (0x05)
    WindowAcknowledgementSize,

    /// Asks the peer to limit its outgoing bandwidth (0x06)
    SetPeerBandwidth,

    /// Audio data (0x08)
    Audio,

    /// Video data (0x09)
    Video,

    /// Metadata encoded as AMF3 (0x0f)
    DataAmf3,

    /// Shared object events encoded as AMF3 (0x10)
    SharedObjectAmf3,

    /// A command encoded as AMF3 (0x11)
    CommandAmf3,

    /// Metadata encoded as AMF0 (0x12)
    DataAmf0,

    /// Shared object events encoded as AMF0 (0x13)
    SharedObjectAmf0,

    /// A command encoded as AMF0, e.g. `connect` (0x14)
    CommandAmf0,

    /// Several messages bundled into one body (0x16)
    Aggregate,
}

impl RtmpMessageType {
    /// Maps a wire type id to a message type; `None` for ids outside the
    /// specification.
    pub fn from_type_id(type_id: u8) -> Option<RtmpMessageType> {
        match type_id {
            1 => Some(RtmpMessageType::SetChunkSize),
            2 => Some(RtmpMessageType::Abort),
            3 => Some(RtmpMessageType::Acknowledgement),
            4 => Some(RtmpMessageType::UserControl),
            5 => Some(RtmpMessageType::WindowAcknowledgementSize),
            6 => Some(RtmpMessageType::SetPeerBandwidth),
            8 => Some(RtmpMessageType::Audio),
            9 => Some(RtmpMessageType::Video),
            15 => Some(RtmpMessageType::DataAmf3),
            16 => Some(RtmpMessageType::SharedObjectAmf3),
            17 => Some(RtmpMessageType::CommandAmf3),
            18 => Some(RtmpMessageType::DataAmf0),
            19 => Some(RtmpMessageType::SharedObjectAmf0),
            20 => Some(RtmpMessageType::CommandAmf0),
            22 => Some(RtmpMessageType::Aggregate),
            _ => None,
        }
    }

    pub fn type_id(&self) -> u8 {
        match *self {
            RtmpMessageType::SetChunkSize => 1,
            RtmpMessageType::Abort => 2,
            RtmpMessageType::Acknowledgement => 3,
            RtmpMessageType::UserControl => 4,
            RtmpMessageType::WindowAcknowledgementSize => 5,
            RtmpMessageType::SetPeerBandwidth => 6,
            RtmpMessageType::Audio => 8,
            RtmpMessageType::Video => 9,
            RtmpMessageType::DataAmf3 => 15,
            RtmpMessageType::SharedObjectAmf3 => 16,
            RtmpMessageType::CommandAmf3 => 17,
            RtmpMessageType::DataAmf0 => 18,
            RtmpMessageType::SharedObjectAmf0 => 19,
            RtmpMessageType::CommandAmf0 => 20,
            RtmpMessageType::Aggregate => 22,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RtmpMessageType;

    #[test]
    fn type_ids_round_trip() {
        for type_id in 0..=255_u8 {
            if let Some(message_type) = RtmpMessageType::from_type_id(type_id) {
                assert_eq!(message_type.type_id(), type_id);
            }
        }
    }

    #[test]
    fn known_type_ids_are_recognized() {
        let known = [1, 2, 3, 4, 5, 6, 8, 9, 15, 16, 17, 18, 19, 20, 22];
        for type_id in known {
            assert!(
                RtmpMessageType::from_type_id(type_id).is_some(),
                "type id {} should be known",
                type_id
            );
        }
    }

    #[test]
    fn unknown_type_ids_are_rejected() {
        for type_id in [0, 7, 10, 21, 23, 0x7f, 0xff] {
            assert_eq!(RtmpMessageType::from_type_id(type_id), None);
        }
    }
}
