use thiserror::Error;

/// Errors that can occur while parsing inbound packets.
///
/// Parse failures are local to a single datagram. Callers treat them as
/// discardable noise rather than connection-fatal conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("packet truncated")]
    TruncatedPacket,
    #[error("unknown reliability tag: {0}")]
    UnknownReliability(u8),
    #[error("string terminator not found")]
    MissingTerminator,
    #[error("unknown signal value: {0}")]
    UnknownSignal(u64),
}
