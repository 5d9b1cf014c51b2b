//! Wire transport for the monitor: length-prefixed frames over Unix domain
//! sockets.
//!
//! A frame is a `u32` little-endian length prefix followed by that many
//! payload bytes (opcode + body, see [`difc_core::wire`]). The prefix is
//! validated against [`MAX_FRAME_SIZE`] before any allocation.

pub mod dispatch;
pub mod socket_manager;

use std::io;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size in bytes.
///
/// The largest legitimate message is an init context carrying three
/// full-length tag lists; 1 MiB leaves generous headroom while keeping a
/// hostile length prefix harmless.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Transport-level failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The length prefix exceeds [`MAX_FRAME_SIZE`]. Detected before
    /// allocation.
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Size from the length prefix.
        size: usize,
        /// The enforced maximum.
        max: usize,
    },

    /// A frame with a zero-length payload carries no opcode.
    #[error("empty frame")]
    EmptyFrame,

    /// Socket I/O failed.
    #[error("socket i/o failed")]
    Io(#[from] io::Error),
}

/// Reads one frame. Returns `None` on clean end-of-stream (peer closed
/// between frames).
///
/// # Errors
///
/// [`ProtocolError`] on I/O failure, an oversized prefix, or an empty
/// payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<BytesMut>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let size = u32::from_le_bytes(prefix) as usize;
    if size == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = BytesMut::zeroed(size);
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Writes one frame.
///
/// # Errors
///
/// [`ProtocolError`] on I/O failure or a payload above [`MAX_FRAME_SIZE`].
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, b"hello").await.unwrap();
        let frame = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(&frame[..], b"hello");
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_prefix_rejected_before_reading_payload() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let huge = (MAX_FRAME_SIZE as u32 + 1).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut client, &huge)
            .await
            .unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn zero_length_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut client, &0u32.to_le_bytes())
            .await
            .unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error_not_a_clean_eof() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut client, &10u32.to_le_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"abc")
            .await
            .unwrap();
        drop(client);
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
