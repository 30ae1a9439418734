use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default maximum accepted frame size (16 MiB). Checkpoints travel in a single frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("bincode encode error: {0}")]
    BincodeEncode(bincode::error::EncodeError),
    #[error("bincode decode error: {0}")]
    BincodeDecode(bincode::error::DecodeError),
}

pub fn encode_payload<T>(value: &T) -> Result<Vec<u8>, FrameError>
where
    T: Serialize,
{
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(FrameError::BincodeEncode)
}

pub fn decode_payload<T>(bytes: &[u8]) -> Result<T, FrameError>
where
    T: DeserializeOwned,
{
    let (value, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(FrameError::BincodeDecode)?;
    Ok(value)
}

/// Send a length-prefixed (u32, big-endian) frame with a bincode-serialized payload.
///
/// Layout:
/// - 4 bytes: payload length (u32, big-endian)
/// - N bytes: payload
pub async fn send_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = encode_payload(value)?;
    send_frame_bytes(writer, &payload).await
}

/// Receive a length-prefixed frame and deserialize its payload with bincode.
///
/// `max_frame_size` guards against malicious or accidental large allocations.
pub async fn recv_frame<R, T>(reader: &mut R, max_frame_size: usize) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = recv_frame_bytes(reader, max_frame_size).await?;
    decode_payload(&payload)
}

/// Low-level helper: send a raw length-prefixed frame.
pub async fn send_frame_bytes<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Low-level helper: receive a raw length-prefixed frame.
///
/// EOF before the length prefix is reported as [`FrameError::Closed`].
pub async fn recv_frame_bytes<R>(reader: &mut R, max_frame_size: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    if let Err(err) = reader.read_exact(&mut len_buf).await {
        return Err(if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Closed
        } else {
            FrameError::Io(err)
        });
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(FrameError::TooLarge {
            len,
            max: max_frame_size,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tokio::io::duplex;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestMsg {
        id: u32,
        values: Vec<f64>,
    }

    #[tokio::test]
    async fn frame_survives_duplex_pipe() {
        let (mut client, mut server) = duplex(64 * 1024);

        let msg = TestMsg {
            id: 42,
            values: vec![0.25, -1.5],
        };

        let send_task = tokio::spawn(async move {
            send_frame(&mut client, &msg).await.unwrap();
        });
        let recv_task = tokio::spawn(async move {
            recv_frame::<_, TestMsg>(&mut server, DEFAULT_MAX_FRAME_SIZE)
                .await
                .unwrap()
        });

        send_task.await.unwrap();
        let got = recv_task.await.unwrap();
        assert_eq!(got.id, 42);
        assert_eq!(got.values, vec![0.25, -1.5]);
    }

    #[tokio::test]
    async fn rejects_too_large_frame() {
        let (mut client, mut server) = duplex(64 * 1024);

        let send_task = tokio::spawn(async move {
            send_frame_bytes(&mut client, &[0u8; 65]).await.unwrap();
        });
        let res = recv_frame_bytes(&mut server, 64).await;
        send_task.await.unwrap();

        assert!(matches!(res, Err(FrameError::TooLarge { len: 65, max: 64 })));
    }

    #[tokio::test]
    async fn eof_before_prefix_is_closed() {
        let (client, mut server) = duplex(64);
        drop(client);

        let res = recv_frame_bytes(&mut server, DEFAULT_MAX_FRAME_SIZE).await;
        assert!(matches!(res, Err(FrameError::Closed)));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        let res = decode_payload::<TestMsg>(&[0xff, 0xff, 0xff]);
        assert!(matches!(res, Err(FrameError::BincodeDecode(_))));
    }
}
