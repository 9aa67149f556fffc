//! Byte-level encoding and decoding utilities
//!
//! The JVM class file format is big-endian throughout, so every primitive
//! here reads and writes network byte order.

use thiserror::Error;

/// Errors that can occur while decoding a class file
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of data
    #[error("Unexpected end of class file at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 in a constant pool string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown constant pool tag
    #[error("Unknown constant pool tag {0} at offset {1}")]
    UnknownTag(u8, usize),

    /// A constant pool index referred to a slot of the wrong kind
    #[error("Constant pool index {index} is not a {expected}")]
    BadPoolIndex {
        /// The offending index
        index: u16,
        /// The kind of entry that was expected there
        expected: &'static str,
    },

    /// Invalid magic number
    #[error("Invalid magic number {0:#010x} (expected 0xCAFEBABE)")]
    InvalidMagic(u32),

    /// Truncated or malformed code attribute
    #[error("Malformed code attribute: {0}")]
    MalformedCode(String),
}

/// Big-endian reader over a byte slice
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a new reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Remaining bytes
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Whether any bytes remain
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.position >= self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Read a 16-bit unsigned integer
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        if self.position + 2 > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = [self.buffer[self.position], self.buffer[self.position + 1]];
        self.position += 2;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        if self.position + 4 > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = [
            self.buffer[self.position],
            self.buffer[self.position + 1],
            self.buffer[self.position + 2],
            self.buffer[self.position + 3],
        ];
        self.position += 4;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read a 64-bit unsigned integer
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok((hi << 32) | lo)
    }

    /// Read a fixed number of bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.position + count > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let slice = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Skip over bytes without reading them
    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        if self.position + count > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        self.position += count;
        Ok(())
    }

    /// Read a length-prefixed UTF-8 string (u16 length)
    pub fn read_utf8(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        // Class files use "modified UTF-8"; real code points outside the
        // basic plane are rare in symbol names, so plain UTF-8 decoding with
        // an explicit error covers what the checker needs.
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }
}

/// Big-endian writer producing a byte buffer
pub struct ByteWriter {
    pub(crate) buffer: Vec<u8>,
}

impl ByteWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Current offset (length of output so far)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the writer and return the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a u16-length-prefixed UTF-8 string
    pub fn emit_utf8(&mut self, value: &str) {
        self.emit_u16(value.len() as u16);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Patch a u32 at a previously reserved offset
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}
