use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while
/// reassembling RTMP chunks into messages.
#[derive(Debug, Error)]
pub enum ChunkReadError {
    /// Compressed chunk headers inherit fields from the previous chunk on
    /// the same chunk stream id, so the first chunk on a stream must use the
    /// full (Large) format
    #[error(
        "Received chunk with a compressed header on csid {csid} prior to receiving a full header"
    )]
    NoPreviousChunkOnStream { csid: u32 },

    /// The chunk size is carried in 31 bits of the SetChunkSize message, so
    /// values of zero or above 2,147,483,647 are invalid
    #[error("Requested an invalid max chunk size of {chunk_size}")]
    InvalidMaxChunkSize { chunk_size: usize },

    /// A continuation header declared a message length smaller than the
    /// bytes already accumulated for that message
    #[error("Chunk on csid {csid} shrank its message length mid-message")]
    MessageLengthShrank { csid: u32 },
}
