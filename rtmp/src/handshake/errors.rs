use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur during
/// the RTMP handshake.  Any of these is fatal for the connection.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Bytes 4-7 of packet 1 are reserved and must be zeroed; a client
    /// sending anything else is not speaking the simple handshake
    #[error("Packet 1's reserved field was expected to be zeroed, but wasn't")]
    NonZeroedReservedField,

    /// Packet 2 must be an exact echo of the 1536 bytes we sent as our own
    /// packet 1
    #[error("Peer did not echo back the handshake bytes it was sent")]
    IncorrectEchoResponse,

    /// An I/O error occurred while forming the outgoing packets
    #[error("{0}")]
    Io(#[from] io::Error),
}
