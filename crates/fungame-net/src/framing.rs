//! Length-prefixed framing for the TCP fallback link.
//!
//! ```text
//! +-------------------+--------------------------+
//! | length (4 bytes)  |   JSON envelope          |
//! | u32 little-endian |   (length bytes)         |
//! +-------------------+--------------------------+
//! ```
//!
//! The length does not include the prefix itself. A zero-length frame is a
//! keepalive and carries no envelope.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::envelope::{self, Envelope, MessageError};

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// The frame did not hold a valid envelope.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closed_or_io(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Read a single length-prefixed frame and return its payload.
///
/// Zero-length keepalive frames are returned as an empty vector.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(closed_or_io)?;

    let payload_len = u32::from_le_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(closed_or_io)?;
    }
    Ok(payload)
}

/// Write a single length-prefixed frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: config.max_payload_size,
        });
    }

    writer.write_all(&len.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read frames until one carries an envelope, skipping keepalives.
pub async fn read_envelope<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Envelope, FrameError> {
    loop {
        let payload = read_frame(reader, config).await?;
        if payload.is_empty() {
            continue;
        }
        return Ok(envelope::decode(&payload)?);
    }
}

/// Encode and write one envelope as a frame.
pub async fn write_envelope<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let payload = envelope::encode(envelope)?;
    write_frame(writer, &payload, config).await
}

/// Write a zero-length keepalive frame.
pub async fn write_keepalive<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
) -> Result<(), FrameError> {
    writer.write_all(&0u32.to_le_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
