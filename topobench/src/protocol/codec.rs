use crate::error::{BenchError, Result};
use crate::protocol::header::{HEADER_SIZE, Header, Lane};
use crate::protocol::message::BenchMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted from the wire (64 MiB). Every message the harness
/// sends is a few hundred bytes at most; anything bigger is a corrupt stream.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Encode a `BenchMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &BenchMessage, lane: Lane) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| BenchError::EncodeFailed(e.to_string()))?;

    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(BenchError::EncodeFailed(format!(
            "payload of {} bytes exceeds frame limit {MAX_MESSAGE_SIZE}",
            payload.len()
        )));
    }

    let header = Header {
        payload_length: payload.len() as u32,
        lane,
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// rkyv requires the archive to be aligned; socket buffers are not.
fn decode_payload(payload: &[u8]) -> Result<BenchMessage> {
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<BenchMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| BenchError::DecodeFailed(e.to_string()))
}

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, msg: &BenchMessage, lane: Lane) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_message(msg, lane)?;
    writer
        .write_all(&buf)
        .await
        .map_err(|e| BenchError::transport_with_source("write frame", e))?;
    writer
        .flush()
        .await
        .map_err(|e| BenchError::transport_with_source("flush frame", e))?;
    Ok(())
}

/// Read exactly one framed message.
///
/// A clean end-of-stream before the first header byte is reported as
/// `Ok(None)`; a stream cut mid-frame is a transport error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<(Header, BenchMessage)>>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(BenchError::transport_with_source("read frame header", e)),
    }

    let header = Header::decode(&header_buf)
        .ok_or_else(|| BenchError::DecodeFailed("invalid header: unknown lane".into()))?;
    let len = header.payload_length as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(BenchError::DecodeFailed(format!(
            "frame of {len} bytes exceeds limit {MAX_MESSAGE_SIZE}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| BenchError::transport_with_source("read frame payload", e))?;

    Ok(Some((header, decode_payload(&payload)?)))
}

/// Read one message and fail if the stream ended.
pub async fn expect_message<R>(reader: &mut R, context: &str) -> Result<BenchMessage>
where
    R: AsyncRead + Unpin,
{
    match read_message(reader).await? {
        Some((_, msg)) => Ok(msg),
        None => Err(BenchError::transport(format!(
            "connection closed while waiting for {context}"
        ))),
    }
}
