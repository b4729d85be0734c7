//! Building blocks for speaking the RTMP wire protocol: the initial
//! handshake, the chunk framing layer that carries every message after it,
//! the message type model, and the per-connection packet dispatcher.
//!
//! Everything in this crate is transport-agnostic: types consume byte
//! slices and produce response/packet values, leaving socket handling to
//! the caller.  State that the protocol requires to persist across messages
//! (previous chunk headers, the negotiated chunk size) lives in
//! per-connection values rather than globals, matching the
//! one-thread-per-connection ownership model of the server.

pub mod chunk;
pub mod dispatcher;
pub mod handshake;
pub mod messages;
pub mod time;
