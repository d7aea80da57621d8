use crate::error::TransportError;

/// Delivery policy for an outgoing packet.
///
/// The wire encoding of this tag is the first byte of every packet and
/// determines how the rest of the header is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reliability {
    /// Fire and forget. No sequencing, no retransmission.
    Unreliable = 0,
    /// Packets older than the newest received one are dropped, never resent.
    UnreliableSequenced = 1,
    /// Every packet arrives exactly once, in any order.
    Reliable = 2,
    /// Every packet arrives exactly once, in send order. Delivery stalls
    /// until gaps are filled.
    ReliableOrdered = 3,
    /// Reliable delivery of a payload split into chunks that each fit within
    /// the configured maximum datagram size.
    BigData = 4,
}

impl Reliability {
    pub fn from_u8(value: u8) -> Result<Self, TransportError> {
        match value {
            0 => Ok(Reliability::Unreliable),
            1 => Ok(Reliability::UnreliableSequenced),
            2 => Ok(Reliability::Reliable),
            3 => Ok(Reliability::ReliableOrdered),
            4 => Ok(Reliability::BigData),
            _ => Err(TransportError::UnknownReliability(value)),
        }
    }

    /// True for classes that are acknowledged and retransmitted.
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Reliability::Reliable | Reliability::ReliableOrdered | Reliability::BigData
        )
    }

    /// True for classes that carry a sequence id in their header.
    pub fn needs_sequencing(self) -> bool {
        self != Reliability::Unreliable
    }
}

/// Header length for sequenced classes: tag + u64 sequence id.
pub const SEQUENCED_HEADER_LEN: usize = 1 + 8;

/// Header length for `BigData` chunks: tag + sequence id + fragment range.
pub const BIG_DATA_HEADER_LEN: usize = SEQUENCED_HEADER_LEN + 8 + 8;
