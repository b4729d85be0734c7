use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while
/// serializing values into AMF0 encoded bytes.
#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    /// Property names are length-prefixed with 16 bits, so a name of 65,536
    /// bytes or more cannot be represented
    #[error("Object property name length greater than 65,535")]
    PropertyNameTooLong,

    /// An I/O error occurred while writing the output buffer
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// An enumeration defining all the possible errors that could occur while
/// deserializing AMF0 encoded bytes.
#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    /// A type marker declared more payload bytes than the buffer holds
    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    /// Encountered a type marker outside the AMF0 specification
    #[error("Encountered unknown marker: {marker}")]
    UnknownMarker { marker: u8 },

    /// Reference, movieclip, recordset and typed-object markers are valid
    /// AMF0 but carry types this decoder does not handle
    #[error("Encountered unsupported marker: {marker}")]
    UnsupportedMarker { marker: u8 },

    /// An object end marker appeared where a value was expected
    #[error("Encountered an object end marker outside of an object body")]
    UnexpectedObjectEnd,

    /// An object body ran out of bytes before its `00 00 09` terminator,
    /// even after skipping past undecodable bytes
    #[error("Object body ended without an object end marker")]
    MissingObjectTerminator,

    /// AMF3 reference indices are parsed but no reference table is kept, so
    /// a stream that actually reuses a reference cannot be decoded
    #[error("AMF3 value is a reference index, which is not supported")]
    UnresolvedAmf3Reference,

    /// The AMF3 payload did not follow the object encoding this decoder
    /// understands
    #[error("Invalid or unsupported AMF3 encoding")]
    InvalidAmf3Encoding,

    /// An I/O error occurred while reading the input buffer
    #[error("{0}")]
    Io(#[from] io::Error),
}
