//! Field-level payload encoding used by message types.
//!
//! Integers are varints, floats are little-endian IEEE 754, strings are a
//! varint byte length followed by UTF-8.

use super::varint;
use crate::error::CodecError;

/// Appends fields to a payload buffer.
pub struct FieldWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        varint::encode_u32(value, self.buf);
        self
    }

    pub fn put_f32(&mut self, value: f32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        varint::encode_u32(value.len() as u32, self.buf);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }
}

/// Reads fields from a payload in the order they were written.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u32(&mut self, field: &str) -> Result<u32, CodecError> {
        let (value, used) = varint::decode_u32(self.rest())
            .map_err(|_| CodecError::InvalidField(format!("{field}: bad varint")))?;
        self.pos += used;
        Ok(value)
    }

    pub fn f32(&mut self, field: &str) -> Result<f32, CodecError> {
        let bytes = self.take(4, field)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn string(&mut self, field: &str) -> Result<String, CodecError> {
        let len = self.u32(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidField(format!("{field}: not UTF-8")))
    }

    /// Fails if unread bytes remain.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.buf.len() - self.pos {
            0 => Ok(()),
            extra => Err(CodecError::InvalidField(format!("{extra} trailing bytes"))),
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], CodecError> {
        let rest = self.rest();
        if rest.len() < len {
            return Err(CodecError::InvalidField(format!(
                "{field}: needs {len} bytes, {} left",
                rest.len()
            )));
        }
        self.pos += len;
        Ok(&rest[..len])
    }
}
