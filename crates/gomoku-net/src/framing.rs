//! Frames carrying encoded gomoku packets.
//!
//! The biggest packet the server ever sends is a board snapshot or join
//! payload for a 40x40 board: 1600 cells at one postcard byte each plus a
//! handful of names. A 64 KiB cap leaves ample room for that and still stops
//! a bad length prefix from making the reader allocate without limit.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Default cap on a single frame payload.
pub const DEFAULT_MAX_PAYLOAD: u32 = 64 * 1024;

/// Framing limits.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload accepted in either direction.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Errors from reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or supplied payload is over the limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Offending size.
        size: u32,
        /// Configured limit.
        max: u32,
    },

    /// The peer closed the stream, possibly mid-frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn map_eof(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Reads one frame (`u32` little-endian length, then payload) and returns
/// the payload.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(map_eof)?;

    let payload_len = u32::from_le_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(map_eof)?;
    }
    Ok(payload)
}

/// Writes one frame and flushes.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let size = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if size > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: config.max_payload_size,
        });
    }

    writer.write_all(&size.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}
