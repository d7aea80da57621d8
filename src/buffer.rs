use crate::error::TransportError;

/// Sequential reader over a borrowed byte buffer.
///
/// All multi-byte integers are read little-endian. Every read is
/// bounds-checked: reading past the end returns
/// [`TransportError::TruncatedPacket`] and leaves the offset unmodified, so a
/// failed read never partially consumes the buffer.
pub struct BufferReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The unread tail of the buffer.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], TransportError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(TransportError::TruncatedPacket)?;

        if end > self.buf.len() {
            return Err(TransportError::TruncatedPacket);
        }

        let bytes = &self.buf[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, TransportError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, TransportError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, TransportError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, TransportError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a `u16` length prefix followed by that many bytes of UTF-8.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_string_u16(&mut self) -> Result<String, TransportError> {
        let start = self.offset;
        let len = self.read_u16()? as usize;

        match self.read_bytes(len) {
            Ok(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Err(e) => {
                self.offset = start;
                Err(e)
            }
        }
    }

    /// Reads bytes up to (not including) a NUL terminator and advances past
    /// the terminator. If no terminator exists before the end of the buffer
    /// the offset is left unmodified.
    pub fn read_terminated_string(&mut self) -> Result<String, TransportError> {
        let tail = &self.buf[self.offset..];

        match tail.iter().position(|&b| b == 0) {
            Some(end) => {
                let text = String::from_utf8_lossy(&tail[..end]).into_owned();
                self.offset += end + 1;
                Ok(text)
            }
            None => Err(TransportError::MissingTerminator),
        }
    }
}

/// Append-only writer over a growable byte buffer.
///
/// The inverse of [`BufferReader`]: multi-byte integers are written
/// little-endian.
#[derive(Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `u16` length prefix followed by the string bytes. Strings
    /// longer than `u16::MAX` bytes are truncated at the prefix limit.
    pub fn write_string_u16(&mut self, text: &str) {
        let len = text.len().min(u16::MAX as usize);
        self.write_u16(len as u16);
        self.write_bytes(&text.as_bytes()[..len]);
    }

    /// Writes the string bytes followed by a NUL terminator. Interior NUL
    /// bytes would corrupt the framing, so everything after the first NUL is
    /// dropped.
    pub fn write_terminated_string(&mut self, text: &str) {
        let bytes = text.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.write_bytes(&bytes[..end]);
        self.write_u8(0);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
