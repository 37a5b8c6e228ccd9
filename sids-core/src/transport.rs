//! Exact-size transfer over a byte stream.
//!
//! Image frames have no delimiter: both ends rely on the size negotiated
//! through the metadata handshake, so every frame must be written and read
//! in full no matter how the stream fragments it. Text replies are the
//! exception and are taken with a single bounded read.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::SidsError;

/// Reply buffer used by clients for version and metadata replies.
pub const DEFAULT_REPLY_BUFFER: usize = 124;

/// Write all of `bytes`, resuming after short writes.
///
/// `op` names the operation in the error, e.g. the command being answered.
pub async fn send_exact<W>(io: &mut W, bytes: &[u8], op: &'static str) -> Result<(), SidsError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < bytes.len() {
        match io.write(&bytes[sent..]).await {
            Ok(0) => {
                return Err(SidsError::transport(
                    op,
                    io::Error::new(io::ErrorKind::WriteZero, "peer stopped accepting data"),
                ));
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SidsError::transport(op, e)),
        }
    }
    io.flush().await.map_err(|e| SidsError::transport(op, e))?;
    trace!("{op}: sent {sent} bytes");
    Ok(())
}

/// Fill `buf` completely from `io`.
///
/// A zero-length read before the buffer is full fails with
/// [`SidsError::ShortRead`]. On any error the contents of `buf` are
/// unspecified and must not be used as a frame.
pub async fn receive_exact_into<R>(io: &mut R, buf: &mut [u8]) -> Result<(), SidsError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let expected = buf.len();
    let mut received = 0;
    while received < expected {
        match io.read(&mut buf[received..]).await {
            Ok(0) => return Err(SidsError::ShortRead { expected, received }),
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SidsError::transport("receive frame", e)),
        }
    }
    Ok(())
}

/// Receive exactly `size` bytes into a new buffer.
pub async fn receive_exact<R>(io: &mut R, size: usize) -> Result<Vec<u8>, SidsError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; size];
    receive_exact_into(io, &mut buf).await?;
    Ok(buf)
}

/// Send a command token and take its reply with one read of at most
/// `max_reply` bytes.
///
/// Used for the short NUL-terminated text replies, never for frames.
pub async fn send_command_and_receive<S>(
    io: &mut S,
    token: &'static str,
    max_reply: usize,
) -> Result<Vec<u8>, SidsError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    send_exact(io, token.as_bytes(), token).await?;

    let mut reply = vec![0u8; max_reply];
    let n = loop {
        match io.read(&mut reply).await {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SidsError::transport(token, e)),
        }
    };
    if n == 0 {
        return Err(SidsError::ShortRead {
            expected: 1,
            received: 0,
        });
    }
    reply.truncate(n);
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    fn frame(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[tokio::test]
    async fn receive_one_byte_at_a_time() {
        let data = frame(16);
        let mut builder = Builder::new();
        for b in &data {
            builder.read(std::slice::from_ref(b));
        }
        let mut io = builder.build();
        let got = receive_exact(&mut io, data.len()).await.unwrap();
        assert_eq!(got, data);
    }

    #[tokio::test]
    async fn receive_uneven_chunks() {
        let data = frame(1000);
        let mut io = Builder::new()
            .read(&data[..1])
            .read(&data[1..300])
            .read(&data[300..301])
            .read(&data[301..999])
            .read(&data[999..])
            .build();
        let got = receive_exact(&mut io, 1000).await.unwrap();
        assert_eq!(got, data);
    }

    proptest! {
        #[test]
        fn receive_any_chunking(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            cuts in proptest::collection::vec(1usize..64, 1..32),
        ) {
            let mut builder = Builder::new();
            let mut rest = data.as_slice();
            for cut in cuts.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let (chunk, tail) = rest.split_at((*cut).min(rest.len()));
                builder.read(chunk);
                rest = tail;
            }
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let got = rt.block_on(async {
                let mut io = builder.build();
                receive_exact(&mut io, data.len()).await
            });
            prop_assert_eq!(got.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn receive_zero_bytes_is_immediate() {
        let mut io = Builder::new().build();
        assert!(receive_exact(&mut io, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_read_aborts() {
        let mut io = Builder::new().read(b"abc").read(b"d").build();
        match receive_exact(&mut io, 8).await {
            Err(SidsError::ShortRead { expected, received }) => {
                assert_eq!(expected, 8);
                assert_eq!(received, 4);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_error_is_transport() {
        let mut io = Builder::new()
            .read(b"ab")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let err = receive_exact(&mut io, 4).await.unwrap_err();
        assert!(matches!(err, SidsError::Transport { .. }));
        assert!(err.is_session_local());
    }

    #[tokio::test]
    async fn send_resumes_after_short_writes() {
        let mut io = Builder::new().write(b"GET_").write(b"IMAGE").write(b"_DATA").build();
        send_exact(&mut io, b"GET_IMAGE_DATA", "test").await.unwrap();
    }

    #[tokio::test]
    async fn send_error_is_transport() {
        let mut io = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let err = send_exact(&mut io, b"x", "GET_IMAGE_DATA").await.unwrap_err();
        assert!(err.to_string().contains("GET_IMAGE_DATA"));
    }

    #[tokio::test]
    async fn command_reply_uses_single_read() {
        let mut io = Builder::new()
            .write(b"GET_VERSION")
            .read(b"1.")
            .build();
        let reply = send_command_and_receive(&mut io, "GET_VERSION", 64).await.unwrap();
        assert_eq!(reply, b"1.");
    }

    #[tokio::test]
    async fn command_reply_on_closed_stream() {
        let mut io = Builder::new().write(b"GET_META_DATA").build();
        let err = send_command_and_receive(&mut io, "GET_META_DATA", 64)
            .await
            .unwrap_err();
        assert!(matches!(err, SidsError::ShortRead { .. }));
    }
}
