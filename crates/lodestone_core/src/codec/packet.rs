//! Packet framing: one kind byte, a varint payload length, then the payload.

use super::varint;
use crate::error::CodecError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A framed message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: u8, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Size of the framed packet in bytes.
    pub fn framed_len(&self) -> usize {
        1 + varint::encoded_len(self.payload.len() as u32) + self.payload.len()
    }

    /// Appends the framed packet to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.framed_len());
        buf.push(self.kind);
        varint::encode_u32(self.payload.len() as u32, buf);
        buf.extend_from_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.framed_len());
        self.encode(&mut buf);
        buf
    }
}

/// Reads one packet.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame. End of
/// stream inside a frame is [`CodecError::Truncated`]; a declared length above
/// `max_payload` is rejected before any payload is read.
pub async fn read_packet<R>(reader: &mut R, max_payload: usize) -> Result<Option<Packet>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut kind = [0u8; 1];
    if reader.read(&mut kind).await? == 0 {
        return Ok(None);
    }

    let len = varint::read_u32(reader).await? as usize;
    if len > max_payload {
        return Err(CodecError::PayloadTooLarge { len, max: max_payload });
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(Packet::new(kind[0], payload))),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(CodecError::Truncated),
        Err(e) => Err(e.into()),
    }
}

/// Writes one framed packet. Does not flush.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&packet.to_bytes()).await?;
    Ok(())
}
