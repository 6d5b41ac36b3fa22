use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Default ceiling for a single frame body (64 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one frame: a 4-byte big-endian length prefix followed by the body
pub(crate) async fn write_frame<W>(writer: &mut W, bytes: &[u8], max_len: usize) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if bytes.len() > max_len {
        return Err(Error::InvalidFrame(format!(
            "Message too large: {} bytes",
            bytes.len()
        )));
    }
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::InvalidFrame(format!("Message too large: {} bytes", bytes.len())))?;

    writer.write_u32(len).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
pub(crate) async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let len = reader.read_u32().await.map_err(eof_as_closed)? as usize;

    if len > max_len {
        return Err(Error::InvalidFrame(format!(
            "Message too large: {} bytes",
            len
        )));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(eof_as_closed)?;
    Ok(buf)
}

/// Run `op`, failing with [`Error::Timeout`] if `timeout` elapses first
pub(crate) async fn with_timeout<T>(
    timeout: Option<Duration>,
    what: &'static str,
    op: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| Error::Timeout(what))?,
        None => op.await,
    }
}

fn eof_as_closed(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, b"abc", DEFAULT_MAX_FRAME_LEN).await.unwrap();
        write_frame(&mut a, b"", DEFAULT_MAX_FRAME_LEN).await.unwrap();

        assert_eq!(read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap(), b"abc");
        assert!(read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_frame_reports_closed() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_u32(10).await.unwrap();
        a.write_all(b"short").await.unwrap();
        drop(a);

        assert!(matches!(
            read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn writer_refuses_oversized_body() {
        let (mut a, _b) = tokio::io::duplex(1024);
        let err = write_frame(&mut a, &[0u8; 16], 8).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(_)));
    }
}
