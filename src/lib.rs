//! # reliable-dgram
//!
//! A reliability layer built atop unreliable datagrams, supporting multiple
//! delivery guarantees, fragmentation of oversized payloads,
//! acknowledgement-driven retransmission, latency estimation, and timeout
//! detection.
//!
//! ## Architecture
//!
//! - **Outbound**: [`PacketShipper`] frames, sequences, and fragments
//!   payloads, retaining reliable packets for retry until acknowledged.
//! - **Inbound**: [`PacketSorter`] de-duplicates, reorders, reassembles, and
//!   emits acks; [`PacketAssembler`] rebuilds chunked transmissions.
//! - **Composition**: [`PacketProcessor`] binds one shipper/sorter pair to a
//!   shared socket and application callbacks, one instance per remote peer.
//!
//! The raw socket is owned externally: a manager polls it non-blocking,
//! routes each datagram to the processor registered for the sender address,
//! then ticks every processor once per frame. Nothing in this crate blocks or
//! spawns threads.
//!
//! All multi-byte integers on the wire are little-endian.

pub mod assembler;
pub mod buffer;
pub mod config;
pub mod error;
pub mod latency;
pub mod processor;
pub mod reliability;
pub mod shipper;
pub mod signal;
pub mod socket;
pub mod sorter;

pub use assembler::PacketAssembler;
pub use buffer::{BufferReader, BufferWriter};
pub use config::Config;
pub use error::TransportError;
pub use latency::LatencyEstimator;
pub use processor::{KickCallback, PacketBodyCallback, PacketProcessor};
pub use reliability::Reliability;
pub use shipper::PacketShipper;
pub use signal::Signal;
pub use socket::DatagramSocket;
pub use sorter::PacketSorter;
