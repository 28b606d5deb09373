//! Native-messaging framing
//!
//! Each message is a 4-byte length in native byte order followed by that
//! many bytes of UTF-8 JSON. Oversized inbound frames are drained and
//! reported so the stream stays in sync.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Browsers cap host-to-extension messages at 1 MiB.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {len} bytes exceeds {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel closed")]
    Closed,
}

/// Read one frame. `None` when the browser closed the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, BridgeError> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_FRAME_BYTES {
        let mut rest = (&mut *reader).take(len as u64);
        tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
        return Err(BridgeError::FrameTooLarge {
            len,
            max: MAX_FRAME_BYTES,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), BridgeError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(BridgeError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Drain queued frames to `writer` until every sender is gone.
pub async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<(), BridgeError> {
    while let Some(frame) = frames.recv().await {
        write_frame(&mut writer, &frame).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_frame(&mut a, br#"{"type":"hello"}"#).await.unwrap();
        let frame = read_frame(&mut b).await.unwrap().unwrap();

        assert_eq!(frame, br#"{"type":"hello"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_header_is_native_endian() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"{}").await.unwrap();

        let mut raw = [0u8; 6];
        b.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[..4], &2u32.to_ne_bytes());
        assert_eq!(&raw[4..], b"{}");
    }

    #[tokio::test]
    async fn test_eof_is_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_drained() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        let writer = tokio::spawn(async move {
            let len = (MAX_FRAME_BYTES + 1) as u32;
            a.write_all(&len.to_ne_bytes()).await.unwrap();
            a.write_all(&vec![b' '; MAX_FRAME_BYTES + 1]).await.unwrap();
            write_frame(&mut a, b"{}").await.unwrap();
        });

        assert!(matches!(
            read_frame(&mut b).await,
            Err(BridgeError::FrameTooLarge { .. })
        ));
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"{}".to_vec());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_refuses_to_write_oversized() {
        let (mut a, _b) = tokio::io::duplex(64);
        let big = vec![b'x'; MAX_FRAME_BYTES + 1];
        assert!(matches!(
            write_frame(&mut a, &big).await,
            Err(BridgeError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_loop_ends_with_senders() {
        let (a, mut b) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(a, rx));

        tx.send(b"{\"n\":1}".to_vec()).unwrap();
        drop(tx);

        task.await.unwrap().unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"{\"n\":1}".to_vec());
    }
}
