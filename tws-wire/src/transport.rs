//! Async TCP transport and the connect handshake.
//!
//! The stream carries bare NUL-terminated fields with no message framing.
//! The handshake reads individual fields; after it completes the stream is
//! split so that the dispatcher task owns the read half and request methods
//! share the write half.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::encoder::MessageEncoder;
use crate::errors::{IBApiError, Result};
use crate::protocol::{server_version, CLIENT_VERSION, DEFAULT_HOST, MIN_SERVER_VERSION, NUL};

// ============================================================================
// Transport
// ============================================================================

/// A connected, handshaken TCP session.
///
/// Any bytes the server sends right after the handshake stay in the read
/// buffer and travel with the read half on `into_split`.
pub struct Transport {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    read_buf: BytesMut,
    server_version: i32,
    tws_time: Option<String>,
    client_id: Option<i32>,
}

impl Transport {
    /// Connect to the gateway and run the handshake:
    ///
    /// 1. send the client version,
    /// 2. read the server version and reject it if below the minimum,
    /// 3. read the server time when the server version carries it,
    /// 4. send the client id when the server version accepts it.
    ///
    /// An empty `host` means the local machine.
    pub async fn connect(host: &str, port: u16, client_id: i32) -> Result<Self> {
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).await.map_err(|e| {
            IBApiError::Connection(format!("failed to connect to {addr}: {e}"))
        })?;

        let (reader, writer) = stream.into_split();
        let mut transport = Self {
            reader,
            writer,
            read_buf: BytesMut::with_capacity(8192),
            server_version: 0,
            tws_time: None,
            client_id: None,
        };

        transport.handshake(client_id).await?;
        Ok(transport)
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    async fn handshake(&mut self, client_id: i32) -> Result<()> {
        let mut enc = MessageEncoder::new(0);
        enc.encode_field_i32(CLIENT_VERSION);
        self.send_message(&enc.finalize()?).await?;

        let sv_field = self.read_field().await?;
        let sv = sv_field.parse::<i32>().map_err(|e| {
            IBApiError::Protocol(format!("invalid server version '{sv_field}': {e}"))
        })?;

        if sv < MIN_SERVER_VERSION {
            let _ = self.writer.shutdown().await;
            return Err(IBApiError::UpgradeRequired {
                feature: "connect",
                required: MIN_SERVER_VERSION,
                server_version: sv,
            });
        }
        self.server_version = sv;

        if sv >= server_version::SERVER_TIME {
            self.tws_time = Some(self.read_field().await?);
        }

        if sv >= server_version::CLIENT_ID {
            let mut enc = MessageEncoder::new(sv);
            enc.encode_field_i32(client_id);
            self.send_message(&enc.finalize()?).await?;
            self.client_id = Some(client_id);
        }

        tracing::info!(
            server_version = sv,
            tws_time = self.tws_time.as_deref().unwrap_or(""),
            "TWS handshake complete"
        );
        Ok(())
    }

    /// Read one NUL-terminated field, waiting for more bytes as needed.
    async fn read_field(&mut self) -> Result<String> {
        loop {
            if let Some(len) = self.read_buf.iter().position(|&b| b == NUL) {
                let field = self.read_buf.split_to(len);
                self.read_buf.advance(1);
                return String::from_utf8(field.to_vec())
                    .map_err(|e| IBApiError::Protocol(format!("invalid UTF-8 in handshake: {e}")));
            }
            let n = self.reader.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(IBApiError::Disconnected(
                    "connection closed during handshake".into(),
                ));
            }
        }
    }

    async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await.map_err(|e| {
            IBApiError::Connection(format!("failed to send handshake: {e}"))
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Negotiated server version from the handshake.
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Server time string, present when the server version carries it.
    pub fn tws_time(&self) -> Option<&str> {
        self.tws_time.as_deref()
    }

    /// Client id sent during the handshake, if the server accepts one.
    pub fn client_id(&self) -> Option<i32> {
        self.client_id
    }

    // ========================================================================
    // Split for concurrent read/write
    // ========================================================================

    /// Split into the dispatcher's read half and the requests' write half.
    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        (
            TransportReader {
                reader: self.reader,
                read_buf: self.read_buf,
            },
            TransportWriter {
                writer: self.writer,
            },
        )
    }
}

// ============================================================================
// TransportReader
// ============================================================================

/// Read half of a split transport.
///
/// Exposes the accumulated bytes so the dispatcher can attempt a decode,
/// consume what a complete message used, and read more when it cannot.
pub struct TransportReader {
    reader: OwnedReadHalf,
    read_buf: BytesMut,
}

impl TransportReader {
    /// Bytes received but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.read_buf
    }

    /// Drop the first `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        self.read_buf.advance(n);
    }

    /// Read more bytes from the socket into the buffer.
    ///
    /// Returns the number of bytes read; 0 means the server closed the
    /// stream.
    pub async fn fill(&mut self) -> Result<usize> {
        Ok(self.reader.read_buf(&mut self.read_buf).await?)
    }
}

// ============================================================================
// TransportWriter
// ============================================================================

/// Write half of a split transport.
pub struct TransportWriter {
    writer: OwnedWriteHalf,
}

impl TransportWriter {
    /// Write one encoded request in full.
    pub async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await.map_err(|e| {
            IBApiError::Connection(format!("failed to send: {e}"))
        })?;
        Ok(())
    }

    /// Shut down the write half of the TCP connection.
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
