use crate::buffer::{BufferReader, BufferWriter};
use crate::error::TransportError;

/// The application's leading message-type tag.
///
/// The transport treats payloads as opaque except for one value: the signal
/// the application designates as its acknowledgement marker. Each call site
/// defines its own signal enumeration, so the sorter and processor are
/// generic over this trait rather than a concrete type.
pub trait Signal: Copy + Eq + std::fmt::Debug {
    fn write(&self, writer: &mut BufferWriter);
    fn read(reader: &mut BufferReader) -> Result<Self, TransportError>;
}

impl Signal for u8 {
    fn write(&self, writer: &mut BufferWriter) {
        writer.write_u8(*self);
    }

    fn read(reader: &mut BufferReader) -> Result<Self, TransportError> {
        reader.read_u8()
    }
}

impl Signal for u16 {
    fn write(&self, writer: &mut BufferWriter) {
        writer.write_u16(*self);
    }

    fn read(reader: &mut BufferReader) -> Result<Self, TransportError> {
        reader.read_u16()
    }
}
