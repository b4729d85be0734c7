//! The RTMP ingest service: one accept loop per configured server, one
//! thread per accepted client.
//!
//! Each connection runs the handshake to completion, then loops reading
//! transport bytes into the chunk reassembler and dispatching every
//! complete packet.  Any handshake, chunk or dispatch failure closes that
//! connection only; the accept loop never sees it.

use crate::config::RtmpServerSettings;
use log::{debug, error, info, warn};
use minnow_rtmp::chunk::{ChunkReadError, ChunkStreamReader};
use minnow_rtmp::dispatcher::{self, DispatchError, DispatchOutcome};
use minnow_rtmp::handshake::{HandshakeError, HandshakeProcessResult, ServerHandshake};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use thiserror::Error;

/// Per-read buffer size for the connection loop.
const READ_BUFFER_SIZE: usize = 2048;

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("Socket closed mid-handshake")]
    ClosedDuringHandshake,

    #[error("{0}")]
    Handshake(#[from] HandshakeError),

    #[error("{0}")]
    ChunkRead(#[from] ChunkReadError),

    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

pub struct RtmpServer {
    settings: RtmpServerSettings,
}

impl RtmpServer {
    pub fn new(settings: RtmpServerSettings) -> RtmpServer {
        RtmpServer { settings }
    }

    /// Binds the listener and serves clients until the process exits.
    pub fn run(self) {
        let settings = self.settings;

        let listener = match TcpListener::bind((settings.bind_address, settings.port)) {
            Ok(listener) => listener,
            Err(err) => {
                error!(
                    "RTMP server {} could not bind {}:{}: {}",
                    settings.id, settings.bind_address, settings.port, err
                );
                return;
            }
        };

        info!(
            "RTMP server {} running on rtmp://{}:{}",
            settings.id, settings.bind_address, settings.port
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    thread::spawn(move || handle_client(stream));
                }
                Err(err) => {
                    warn!("RTMP server {} accept failed: {}", settings.id, err);
                }
            }
        }
    }
}

fn handle_client(stream: TcpStream) {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(err) => {
            warn!("Could not read peer address of new RTMP connection: {}", err);
            return;
        }
    };

    info!("New RTMP client connection from {}", peer);

    match drive_connection(stream, peer) {
        Ok(()) => info!("RTMP connection from {} closed", peer),
        Err(err) => warn!("RTMP connection from {} terminated: {}", peer, err),
    }
}

fn drive_connection(mut stream: TcpStream, peer: SocketAddr) -> Result<(), ConnectionError> {
    let mut buffer = [0_u8; READ_BUFFER_SIZE];

    // Handshake first; nothing else flows until it completes
    let mut handshake = ServerHandshake::new();
    let leftover = loop {
        let byte_count = stream.read(&mut buffer)?;
        if byte_count == 0 {
            return Err(ConnectionError::ClosedDuringHandshake);
        }

        match handshake.process_bytes(&buffer[..byte_count])? {
            HandshakeProcessResult::InProgress { response_bytes } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes)?;
                }
            }

            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes)?;
                }
                break remaining_bytes;
            }
        }
    };

    info!("RTMP client {} handshaked successfully", peer);

    // Chunk stream: bytes surviving the handshake come first
    let mut reader = ChunkStreamReader::new();
    dispatch_incoming(&mut reader, &leftover, peer)?;

    loop {
        let byte_count = stream.read(&mut buffer)?;
        if byte_count == 0 {
            return Ok(());
        }

        let trimmed = trim_trailing_nuls(&buffer[..byte_count]);
        dispatch_incoming(&mut reader, trimmed, peer)?;
    }
}

/// Feeds one read's worth of bytes into the reassembler and dispatches
/// every packet that completes.
fn dispatch_incoming(
    reader: &mut ChunkStreamReader,
    bytes: &[u8],
    peer: SocketAddr,
) -> Result<(), ConnectionError> {
    let mut incoming = bytes;

    while let Some(packet) = reader.next_packet(incoming)? {
        incoming = &[];

        match dispatcher::dispatch(&packet)? {
            DispatchOutcome::ChunkSizeChanged(size) => {
                debug!("RTMP client {} set its chunk size to {}", peer, size);
                reader.set_max_chunk_size(size as usize)?;
            }

            DispatchOutcome::ConnectRequested { app } => match app {
                Some(app) => info!("RTMP client {} connecting to app '{}'", peer, app),
                None => info!("RTMP client {} sent connect without an app", peer),
            },

            DispatchOutcome::CommandReceived { name } => {
                debug!("RTMP client {} sent unhandled command '{}'", peer, name);
            }

            DispatchOutcome::Ignored(message_type) => {
                debug!(
                    "RTMP client {} sent unhandled message type {:?}",
                    peer, message_type
                );
            }
        }
    }

    Ok(())
}

/// Trailing NUL padding is stripped from each read before the bytes enter
/// the accumulation buffer.
fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == 0 {
        end -= 1;
    }

    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::Cursor;

    #[test]
    fn trailing_nuls_are_trimmed() {
        assert_eq!(trim_trailing_nuls(&[1, 2, 3, 0, 0]), &[1, 2, 3]);
        assert_eq!(trim_trailing_nuls(&[1, 0, 2]), &[1, 0, 2]);
        assert_eq!(trim_trailing_nuls(&[0, 0]), &[] as &[u8]);
        assert_eq!(trim_trailing_nuls(&[]), &[] as &[u8]);
    }

    #[test]
    fn completes_handshake_and_processes_connect_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_client(stream);
        });

        let mut client = TcpStream::connect(address).unwrap();

        // c0 + c1 with a zeroed reserved field and patterned random bytes
        let mut c1 = vec![0_u8; 1536];
        for (index, byte) in c1.iter_mut().enumerate().skip(8) {
            *byte = (index % 251) as u8;
        }
        client.write_all(&[3]).unwrap();
        client.write_all(&c1).unwrap();

        let mut s0_s1 = [0_u8; 1537];
        client.read_exact(&mut s0_s1).unwrap();
        assert_eq!(s0_s1[0], 3, "s0 must offer version 3");
        assert_eq!(&s0_s1[5..9], &[0, 0, 0, 0], "s1 reserved field must be zero");

        // c2 echoes s1, s2 must echo our c1
        client.write_all(&s0_s1[1..]).unwrap();
        let mut s2 = [0_u8; 1536];
        client.read_exact(&mut s2).unwrap();
        assert_eq!(&s2[..], &c1[..], "s2 was not an exact copy of c1");

        // A minimal connect command in one Large chunk on csid 3
        let body = minnow_amf::serialize(&[
            minnow_amf::Amf0Value::Utf8String("connect".into()),
            minnow_amf::Amf0Value::Number(1.0),
        ])
        .unwrap();

        let mut chunk = Cursor::new(Vec::new());
        chunk.write_u8(0x03).unwrap();
        chunk.write_u24::<BigEndian>(0).unwrap();
        chunk.write_u24::<BigEndian>(body.len() as u32).unwrap();
        chunk.write_u8(20).unwrap();
        chunk.write_u32::<byteorder::LittleEndian>(0).unwrap();
        chunk.write_all(&body).unwrap();
        client.write_all(&chunk.into_inner()).unwrap();

        // Closing from our side ends the connection loop cleanly
        drop(client);
        server.join().unwrap();
    }
}
