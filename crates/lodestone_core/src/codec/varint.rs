//! Unsigned LEB128-style variable-length integers.
//!
//! Seven value bits per byte, least significant group first, high bit set on
//! every byte except the last. A `u32` takes at most five bytes; a continuation
//! bit on the fifth byte is malformed.

use crate::error::CodecError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest encoding of a `u32`.
pub const MAX_VARINT_LEN: usize = 5;

const CONTINUATION: u8 = 0x80;
const GROUP: u8 = 0x7f;

/// Appends the encoding of `value` to `buf`.
pub fn encode_u32(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let group = (value & GROUP as u32) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(group);
            return;
        }
        buf.push(group | CONTINUATION);
    }
}

/// Number of bytes `encode_u32` writes for `value`.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

/// Decodes a varint at the start of `buf`, returning the value and the bytes used.
pub fn decode_u32(buf: &[u8]) -> Result<(u32, usize), CodecError> {
    let mut value = 0u32;
    for (index, byte) in buf.iter().copied().enumerate() {
        value |= accumulate(index, byte)?;
        if byte & CONTINUATION == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(CodecError::Truncated)
}

/// Reads a varint from `reader`. End of stream inside the varint is `Truncated`.
pub async fn read_u32<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32, CodecError> {
    let mut value = 0u32;
    for index in 0..MAX_VARINT_LEN {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(CodecError::Truncated),
            Err(e) => return Err(e.into()),
        };
        value |= accumulate(index, byte)?;
        if byte & CONTINUATION == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::MalformedLength)
}

fn accumulate(index: usize, byte: u8) -> Result<u32, CodecError> {
    if index == MAX_VARINT_LEN - 1 && (byte & CONTINUATION != 0 || byte & GROUP > 0x0f) {
        return Err(CodecError::MalformedLength);
    }
    Ok(((byte & GROUP) as u32) << (7 * index))
}
