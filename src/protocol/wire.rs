//! Payload field helpers
//!
//! Big-endian field access shared by every request and answer type.
//! String fields are encoded as `len (4) + utf8 bytes`, string lists as
//! `count (4)` followed by that many strings.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, SkirmishError};

/// Sequential reader over a payload
///
/// A short or malformed payload is a protocol violation: a conforming
/// client never sends one.
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(payload: Bytes) -> Self {
        Self { buf: payload }
    }

    fn ensure(&self, needed: usize, field: &str) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(SkirmishError::wrong_protocol(format!(
                "Payload too short for {}: need {} bytes, {} left",
                field,
                needed,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8> {
        self.ensure(1, field)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i32(&mut self, field: &str) -> Result<i32> {
        self.ensure(4, field)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_string(&mut self, field: &str) -> Result<String> {
        self.ensure(4, field)?;
        let len = self.buf.get_u32() as usize;
        self.ensure(len, field)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map_err(|_| SkirmishError::wrong_protocol(format!("{} is not valid UTF-8", field)))
    }

    pub fn read_string_list(&mut self, field: &str) -> Result<Vec<String>> {
        let count = self.read_i32(field)?;
        let count = usize::try_from(count)
            .map_err(|_| SkirmishError::wrong_protocol(format!("Negative count for {}", field)))?;
        // Every string takes at least its length prefix
        self.ensure(count.saturating_mul(4), field)?;
        (0..count).map(|_| self.read_string(field)).collect()
    }

    /// Take everything that is left
    pub fn read_rest(&mut self) -> Bytes {
        self.buf.split_to(self.buf.remaining())
    }

    /// Fail if unread bytes remain
    pub fn finish(self, what: &str) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(SkirmishError::wrong_protocol(format!(
                "{}: unexpected trailing {} bytes",
                what,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}

/// Builder for a payload
#[derive(Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_i32(mut self, value: i32) -> Self {
        self.buf.put_i32(value);
        self
    }

    pub fn put_string(mut self, value: &str) -> Self {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn put_string_list(self, values: &[String]) -> Self {
        let writer = self.put_i32(values.len() as i32);
        values.iter().fold(writer, |writer, value| writer.put_string(value))
    }

    pub fn put_slice(mut self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
