use crate::assembler::PacketAssembler;
use crate::buffer::{BufferReader, BufferWriter};
use crate::config::Config;
use crate::error::TransportError;
use crate::reliability::Reliability;
use crate::signal::Signal;
use crate::socket::DatagramSocket;
use smallvec::SmallVec;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on tracked skipped-over reliable ids. An id that has been
/// missing longer than the sender's retry window is permanently lost, so the
/// oldest entries are evicted once the set fills.
pub const MAX_TRACKED_MISSING: usize = 4096;

struct BackedUpOrderedPacket {
    id: u64,
    data: Vec<u8>,
}

/// Inbound path for one connection: de-duplication, reordering, fragment
/// reassembly, and ack emission.
///
/// Generic over the application's [`Signal`] type so acks carry the tag the
/// call site designates for acknowledgements.
pub struct PacketSorter<S: Signal> {
    addr: SocketAddr,
    ack_signal: S,
    next_reliable: u64,
    next_unreliable_sequenced: u64,
    next_reliable_ordered: u64,
    /// Ascending ids known to be skipped over but not yet received.
    missing_reliable: SmallVec<[u64; 8]>,
    /// Sorted by id; held until all lower ids have been delivered.
    backed_up_ordered: Vec<BackedUpOrderedPacket>,
    assembler: PacketAssembler,
    last_message_time: Instant,
    stale_startup_guard: bool,
}

impl<S: Signal> PacketSorter<S> {
    pub fn new(addr: SocketAddr, ack_signal: S, config: &Config, now: Instant) -> Self {
        Self {
            addr,
            ack_signal,
            next_reliable: 0,
            next_unreliable_sequenced: 0,
            next_reliable_ordered: 0,
            missing_reliable: SmallVec::new(),
            backed_up_ordered: Vec::new(),
            assembler: PacketAssembler::new(),
            last_message_time: now,
            stale_startup_guard: config.stale_startup_guard,
        }
    }

    /// Last time a packet was successfully parsed through this sorter. The
    /// owning processor compares against this for timeout detection.
    pub fn last_message_time(&self) -> Instant {
        self.last_message_time
    }

    /// Discards incomplete `BigData` transmissions older than `max_age`.
    pub fn prune_assembly(&mut self, now: Instant, max_age: Duration) {
        self.assembler.prune(now, max_age);
    }

    /// Strips the transport header and applies the class's de-duplication and
    /// ordering rules. Returns zero or more payloads now deliverable to the
    /// application, in delivery order.
    ///
    /// Reliable classes are acked before any duplicate check: the sender
    /// cannot know an earlier ack was lost, so acks must flow even for
    /// packets received twice.
    pub fn sort_packet(
        &mut self,
        socket: &dyn DatagramSocket,
        packet: &[u8],
        now: Instant,
    ) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut reader = BufferReader::new(packet);

        let reliability = Reliability::from_u8(reader.read_u8()?)?;

        let id = if reliability.needs_sequencing() {
            reader.read_u64()?
        } else {
            0
        };

        // counters start at zero and a sender would need 2^64 packets to
        // reach this id, so it can only be forged; accepting it would wrap
        // the next-expected counters
        if id == u64::MAX {
            debug!("ignoring {reliability:?} packet with forged id from {}", self.addr);
            return Ok(Vec::new());
        }

        if self.stale_startup_guard
            && reliability.needs_sequencing()
            && self.expected_id(reliability) == 0
            && id != 0
        {
            // a previous connection on this address is still retrying into
            // this freshly constructed sorter
            debug!("ignoring stale {reliability:?} packet {id} from {}", self.addr);
            return Ok(Vec::new());
        }

        self.last_message_time = now;

        match reliability {
            Reliability::Unreliable => Ok(vec![reader.remaining().to_vec()]),
            Reliability::UnreliableSequenced => {
                if id < self.next_unreliable_sequenced {
                    // stale, drop it
                    return Ok(Vec::new());
                }

                self.next_unreliable_sequenced = id + 1;
                Ok(vec![reader.remaining().to_vec()])
            }
            Reliability::Reliable | Reliability::BigData => {
                // the whole header must parse before the id is acked or
                // consumed; a truncated chunk has to stay retryable
                let range = if reliability == Reliability::BigData {
                    Some((reader.read_u64()?, reader.read_u64()?))
                } else {
                    None
                };

                self.send_ack(socket, reliability, id);

                if !self.accept_reliable(id) {
                    return Ok(Vec::new());
                }

                let Some((range_start, range_end)) = range else {
                    return Ok(vec![reader.remaining().to_vec()]);
                };

                Ok(self
                    .assembler
                    .process(range_start, range_end, id, reader.remaining().to_vec(), now)
                    .into_iter()
                    .collect())
            }
            Reliability::ReliableOrdered => {
                self.send_ack(socket, reliability, id);
                Ok(self.sort_ordered(id, reader.remaining()))
            }
        }
    }

    /// Applies the unordered-reliable acceptance rules. Returns false for
    /// duplicates.
    fn accept_reliable(&mut self, id: u64) -> bool {
        if id == self.next_reliable {
            self.next_reliable += 1;
            return true;
        }

        if id > self.next_reliable {
            // skipped over ids: track the gap for late arrivals, but only
            // its newest MAX_TRACKED_MISSING entries ever survive eviction,
            // so a forged far-future id must not materialize the whole range
            let gap_start = self
                .next_reliable
                .max(id.saturating_sub(MAX_TRACKED_MISSING as u64));
            self.missing_reliable.extend(gap_start..id);
            self.next_reliable = id + 1;

            if self.missing_reliable.len() > MAX_TRACKED_MISSING {
                let excess = self.missing_reliable.len() - MAX_TRACKED_MISSING;
                self.missing_reliable.drain(..excess);
            }

            return true;
        }

        // old id: deliverable only if it fills a tracked gap
        if let Some(index) = self.missing_reliable.iter().position(|&missing| missing == id) {
            self.missing_reliable.remove(index);
            true
        } else {
            false
        }
    }

    fn sort_ordered(&mut self, id: u64, data: &[u8]) -> Vec<Vec<u8>> {
        if id < self.next_reliable_ordered {
            // duplicate of an already delivered packet
            return Vec::new();
        }

        if id > self.next_reliable_ordered {
            self.insert_backed_up_ordered(id, data.to_vec());
            return Vec::new();
        }

        self.next_reliable_ordered += 1;

        // release the contiguous run this packet unblocks
        let mut releasable = 0;

        for backed_up in &self.backed_up_ordered {
            if backed_up.id != self.next_reliable_ordered {
                break;
            }

            self.next_reliable_ordered += 1;
            releasable += 1;
        }

        let mut packets = Vec::with_capacity(releasable + 1);
        packets.push(data.to_vec());

        for backed_up in self.backed_up_ordered.drain(..releasable) {
            packets.push(backed_up.data);
        }

        packets
    }

    fn insert_backed_up_ordered(&mut self, id: u64, data: Vec<u8>) {
        match self
            .backed_up_ordered
            .binary_search_by_key(&id, |backed_up| backed_up.id)
        {
            // already buffered, drop the duplicate
            Ok(_) => {}
            Err(index) => {
                self.backed_up_ordered
                    .insert(index, BackedUpOrderedPacket { id, data });
            }
        }
    }

    fn expected_id(&self, reliability: Reliability) -> u64 {
        match reliability {
            Reliability::Unreliable => 0,
            Reliability::UnreliableSequenced => self.next_unreliable_sequenced,
            Reliability::Reliable | Reliability::BigData => self.next_reliable,
            Reliability::ReliableOrdered => self.next_reliable_ordered,
        }
    }

    /// Sends `[ack signal][original reliability][original id]` back to the
    /// sender, framed `Unreliable`.
    fn send_ack(&self, socket: &dyn DatagramSocket, reliability: Reliability, id: u64) {
        let mut writer = BufferWriter::with_capacity(16);
        writer.write_u8(Reliability::Unreliable as u8);
        self.ack_signal.write(&mut writer);
        writer.write_u8(reliability as u8);
        writer.write_u64(id);

        if let Err(e) = socket.send_to(&writer.into_vec(), self.addr) {
            if e.kind() != io::ErrorKind::WouldBlock {
                warn!("ack to {} failed: {e}", self.addr);
            }
        }
    }
}
