//! Consuming side: handshake once, then pull frames.
//!
//! The handshake asks for the version and then the metadata, each with a
//! single bounded read. A metadata reply that does not decode is fatal;
//! the client never guesses a frame size. After that every
//! `GET_IMAGE_DATA` is answered with exactly `frame_size()` bytes.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::command::{GET_IMAGE_DATA, GET_META_DATA, GET_VERSION, reply_text};
use crate::coord::BlobCoordinate;
use crate::error::SidsError;
use crate::metadata::MetadataRecord;
use crate::transport::{DEFAULT_REPLY_BUFFER, receive_exact_into, send_command_and_receive, send_exact};

// ── ClientConfig ─────────────────────────────────────────────────

/// Configuration for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Largest accepted version or metadata reply.
    pub reply_buffer: usize,
    /// Deadline for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Reject metadata whose payload size disagrees with its geometry.
    pub strict_metadata: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_buffer: DEFAULT_REPLY_BUFFER,
            connect_timeout: Duration::from_secs(5),
            strict_metadata: false,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────

/// A client with a completed handshake.
pub struct Client<S = TcpStream> {
    stream: S,
    version: String,
    metadata: MetadataRecord,
    frame: Vec<u8>,
    frames_received: u64,
}

impl Client<TcpStream> {
    /// Connect to `addr` (`host:port`) and perform the handshake.
    pub async fn connect(addr: &str, config: &ClientConfig) -> Result<Self, SidsError> {
        info!("connecting to image data server at {addr}");
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(SidsError::connection(format!("no server for image data at {addr}"), e)),
            Err(_) => {
                return Err(SidsError::connection(
                    format!("no server for image data at {addr}"),
                    io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                ));
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {e}");
        }
        Self::handshake(stream, config).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the version and metadata exchange on an open stream.
    pub async fn handshake(mut stream: S, config: &ClientConfig) -> Result<Self, SidsError> {
        let reply = send_command_and_receive(&mut stream, GET_VERSION, config.reply_buffer).await?;
        let version = reply_text(&reply);
        info!("server version: {version}");

        let reply = send_command_and_receive(&mut stream, GET_META_DATA, config.reply_buffer).await?;
        let metadata = if config.strict_metadata {
            MetadataRecord::decode_strict(&reply)?
        } else {
            MetadataRecord::decode(&reply)?
        };
        info!(
            "meta data received: {metadata} ({} bytes per frame)",
            metadata.frame_size()
        );

        Ok(Self {
            stream,
            version,
            metadata,
            frame: vec![0u8; metadata.frame_size()],
            frames_received: 0,
        })
    }

    /// Version string reported by the server.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Stream shape negotiated in the handshake.
    pub fn metadata(&self) -> &MetadataRecord {
        &self.metadata
    }

    /// Bytes per frame, payload plus timestamp.
    pub fn frame_size(&self) -> usize {
        self.frame.len()
    }

    /// Frames received so far.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Request and receive the server's current frame.
    ///
    /// The returned slice is reused by the next call.
    pub async fn next_frame(&mut self) -> Result<&[u8], SidsError> {
        send_exact(&mut self.stream, GET_IMAGE_DATA.as_bytes(), GET_IMAGE_DATA).await?;
        receive_exact_into(&mut self.stream, &mut self.frame).await?;
        self.frames_received += 1;
        Ok(&self.frame)
    }

    /// Pixel part of the last received frame, without timestamp bytes.
    pub fn payload(&self) -> &[u8] {
        &self.frame[..self.metadata.payload_bytes as usize]
    }
}

// ── BlobClient ───────────────────────────────────────────────────

/// Client for a blob detector server: a grey 4×1 stream of coordinates.
pub struct BlobClient<S = TcpStream> {
    inner: Client<S>,
}

impl BlobClient<TcpStream> {
    /// Connect to a blob detector server and check its stream shape.
    pub async fn connect(addr: &str, config: &ClientConfig) -> Result<Self, SidsError> {
        Self::new(Client::connect(addr, config).await?)
    }
}

impl<S> BlobClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a handshaken client, rejecting any stream that is not grey 4×1.
    pub fn new(inner: Client<S>) -> Result<Self, SidsError> {
        let m = inner.metadata();
        if !m.is_grey() {
            return Err(SidsError::UnsupportedStream(format!(
                "received data are not grey valued: {m}"
            )));
        }
        if m.width != 4 || m.height != 1 || (m.payload_bytes as usize) < BlobCoordinate::SIZE {
            return Err(SidsError::UnsupportedStream(format!(
                "received data do not have 1x4 format: {m}"
            )));
        }
        Ok(Self { inner })
    }

    /// Version string reported by the server.
    pub fn version(&self) -> &str {
        self.inner.version()
    }

    /// Fetch the current blob coordinate.
    pub async fn coordinate(&mut self) -> Result<BlobCoordinate, SidsError> {
        let frame = self.inner.next_frame().await?;
        BlobCoordinate::decode(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::{Builder, Mock};

    fn handshake_mock(meta: &[u8]) -> Builder {
        let mut b = Builder::new();
        b.write(b"GET_VERSION")
            .read(b"1.00\0")
            .write(b"GET_META_DATA")
            .read(meta);
        b
    }

    async fn client(mock: Mock) -> Result<Client<Mock>, SidsError> {
        Client::handshake(mock, &ClientConfig::default()).await
    }

    #[tokio::test]
    async fn handshake_computes_frame_size() {
        let mock = handshake_mock(b"[W=4,H=1,O=W,C=0,X=XXX,B=4,BTS=0]\0").build();
        let c = client(mock).await.unwrap();
        assert_eq!(c.version(), "1.00");
        assert_eq!(c.frame_size(), 4);
        assert_eq!(*c.metadata(), MetadataRecord::blob());
    }

    #[tokio::test]
    async fn bad_metadata_is_fatal() {
        let mock = handshake_mock(b"[W=4,H=1,O=W,C=0,X=XXX,B=4]\0").build();
        let err = client(mock).await.err().unwrap();
        assert!(matches!(err, SidsError::BadMetadata { matched: 8, .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn strict_mode_rejects_inconsistent_payload() {
        let mock = handshake_mock(b"[W=2,H=2,O=W,C=1,X=RGB,B=4,BTS=0]\0").build();
        let config = ClientConfig {
            strict_metadata: true,
            ..ClientConfig::default()
        };
        assert!(Client::handshake(mock, &config).await.is_err());
    }

    #[tokio::test]
    async fn frames_survive_fragmentation() {
        let mock = handshake_mock(b"[W=3,H=1,O=W,C=0,X=RGB,B=3,BTS=2]\0")
            .write(b"GET_IMAGE_DATA")
            .read(&[10])
            .read(&[20, 30])
            .read(&[0xAA])
            .read(&[0xBB])
            .build();
        let mut c = client(mock).await.unwrap();
        assert_eq!(c.next_frame().await.unwrap(), &[10, 20, 30, 0xAA, 0xBB]);
        assert_eq!(c.payload(), &[10, 20, 30]);
        assert_eq!(c.frames_received(), 1);
    }

    #[tokio::test]
    async fn truncated_frame_ends_stream() {
        let mock = handshake_mock(b"[W=4,H=1,O=W,C=0,X=XXX,B=4,BTS=0]\0")
            .write(b"GET_IMAGE_DATA")
            .read(&[1, 2])
            .build();
        let mut c = client(mock).await.unwrap();
        let err = c.next_frame().await.unwrap_err();
        assert!(matches!(err, SidsError::ShortRead { expected: 4, received: 2 }));
        assert_eq!(c.frames_received(), 0);
    }

    #[tokio::test]
    async fn blob_client_decodes_coordinates() {
        let mock = handshake_mock(b"[W=4,H=1,O=W,C=0,X=XXX,B=4,BTS=0]\0")
            .write(b"GET_IMAGE_DATA")
            .read(&[0x2C, 0x01, 0x05, 0x00])
            .build();
        let mut blob = BlobClient::new(client(mock).await.unwrap()).unwrap();
        assert_eq!(blob.coordinate().await.unwrap(), BlobCoordinate::new(300, 5));
    }

    #[tokio::test]
    async fn blob_client_rejects_color_streams() {
        let mock = handshake_mock(b"[W=4,H=1,O=W,C=1,X=RGB,B=12,BTS=0]\0").build();
        let err = BlobClient::new(client(mock).await.unwrap()).err().unwrap();
        assert!(matches!(err, SidsError::UnsupportedStream(_)));
    }

    #[tokio::test]
    async fn blob_client_rejects_other_shapes() {
        let mock = handshake_mock(b"[W=8,H=1,O=W,C=0,X=XXX,B=8,BTS=0]\0").build();
        assert!(BlobClient::new(client(mock).await.unwrap()).is_err());
    }

    #[tokio::test]
    async fn connect_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = Client::connect(&addr.to_string(), &ClientConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SidsError::Connection { .. }));
    }
}
