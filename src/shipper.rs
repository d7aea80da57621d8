use crate::buffer::BufferWriter;
use crate::config::Config;
use crate::latency::LatencyEstimator;
use crate::reliability::{BIG_DATA_HEADER_LEN, Reliability};
use crate::socket::DatagramSocket;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::warn;

/// A sent reliable packet retained for possible retransmission.
///
/// Holds the exact framed bytes so a resend is byte-identical to the
/// original: same tag, same sequence id, no re-framing.
struct BackedUpPacket {
    id: u64,
    creation: Instant,
    data: Vec<u8>,
}

/// Outbound path for one connection: framing, sequencing, fragmentation,
/// retry buffering, and latency tracking.
///
/// Sequence counters never reset for the lifetime of the connection.
/// `Reliable` and `BigData` share one counter; `UnreliableSequenced` and
/// `ReliableOrdered` each have their own.
pub struct PacketShipper {
    addr: SocketAddr,
    next_unreliable_sequenced: u64,
    next_reliable: u64,
    next_reliable_ordered: u64,
    backed_up_reliable: VecDeque<BackedUpPacket>,
    backed_up_reliable_ordered: VecDeque<BackedUpPacket>,
    latency: LatencyEstimator,
    retry_delay: Duration,
    mtu: usize,
    failed: bool,
}

impl PacketShipper {
    pub fn new(addr: SocketAddr, config: &Config) -> Self {
        Self {
            addr,
            next_unreliable_sequenced: 0,
            next_reliable: 0,
            next_reliable_ordered: 0,
            backed_up_reliable: VecDeque::new(),
            backed_up_reliable_ordered: VecDeque::new(),
            latency: LatencyEstimator::new(config.latency_window),
            retry_delay: config.retry_delay,
            mtu: config.mtu,
            failed: false,
        }
    }

    /// Set after a send fails with anything other than backpressure. The
    /// owning processor should stop sending and tear the connection down.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Total packets currently awaiting acknowledgement.
    pub fn backed_up_count(&self) -> usize {
        self.backed_up_reliable.len() + self.backed_up_reliable_ordered.len()
    }

    /// One-way latency estimate. Acks measure a round trip, so the moving
    /// average is halved.
    pub fn avg_latency(&self) -> Duration {
        self.latency.average() / 2
    }

    /// Frames and sends `body` under the given delivery policy.
    ///
    /// Returns the assigned sequence id (the first chunk's id for `BigData`)
    /// for caller bookkeeping such as matching a handshake ack. Socket errors
    /// never propagate out of this call; see [`Self::has_failed`].
    pub fn send(
        &mut self,
        socket: &dyn DatagramSocket,
        reliability: Reliability,
        body: &[u8],
        now: Instant,
    ) -> (Reliability, u64) {
        match reliability {
            Reliability::Unreliable => {
                let mut writer = BufferWriter::with_capacity(1 + body.len());
                writer.write_u8(Reliability::Unreliable as u8);
                writer.write_bytes(body);

                self.send_safe(socket, &writer.into_vec());

                (reliability, 0)
            }
            Reliability::UnreliableSequenced => {
                let id = self.next_unreliable_sequenced;
                self.next_unreliable_sequenced += 1;

                let data = Self::frame_sequenced(reliability, id, body);
                self.send_safe(socket, &data);

                (reliability, id)
            }
            Reliability::Reliable | Reliability::ReliableOrdered => {
                let id = match reliability {
                    Reliability::Reliable => {
                        let id = self.next_reliable;
                        self.next_reliable += 1;
                        id
                    }
                    _ => {
                        let id = self.next_reliable_ordered;
                        self.next_reliable_ordered += 1;
                        id
                    }
                };

                let data = Self::frame_sequenced(reliability, id, body);
                self.send_safe(socket, &data);

                let backed_up = BackedUpPacket {
                    id,
                    creation: now,
                    data,
                };

                match reliability {
                    Reliability::Reliable => self.backed_up_reliable.push_back(backed_up),
                    _ => self.backed_up_reliable_ordered.push_back(backed_up),
                }

                (reliability, id)
            }
            Reliability::BigData => self.send_big_data(socket, body, now),
        }
    }

    fn frame_sequenced(reliability: Reliability, id: u64, body: &[u8]) -> Vec<u8> {
        let mut writer = BufferWriter::with_capacity(1 + 8 + body.len());
        writer.write_u8(reliability as u8);
        writer.write_u64(id);
        writer.write_bytes(body);
        writer.into_vec()
    }

    fn send_big_data(
        &mut self,
        socket: &dyn DatagramSocket,
        body: &[u8],
        now: Instant,
    ) -> (Reliability, u64) {
        let max_chunk_size = self.mtu.saturating_sub(BIG_DATA_HEADER_LEN).max(1);

        // an empty body still ships as a single empty chunk so the receiver
        // observes the message
        let chunk_count = body.len().div_ceil(max_chunk_size).max(1) as u64;

        let start_id = self.next_reliable;
        let end_id = start_id + chunk_count - 1;

        let mut chunks = body.chunks(max_chunk_size);

        for _ in 0..chunk_count {
            let chunk = chunks.next().unwrap_or(&[]);

            let id = self.next_reliable;
            self.next_reliable += 1;

            let mut writer = BufferWriter::with_capacity(BIG_DATA_HEADER_LEN + chunk.len());
            writer.write_u8(Reliability::BigData as u8);
            writer.write_u64(id);
            writer.write_u64(start_id);
            writer.write_u64(end_id);
            writer.write_bytes(chunk);

            let data = writer.into_vec();
            self.send_safe(socket, &data);

            // each chunk is retried independently, not the whole message
            self.backed_up_reliable.push_back(BackedUpPacket {
                id,
                creation: now,
                data,
            });
        }

        (Reliability::BigData, start_id)
    }

    /// Resends every backed-up packet older than the retry delay, oldest
    /// first, byte-identical to the original transmission.
    ///
    /// The deques are insertion-ordered, so once an entry is younger than the
    /// delay every later entry is too and the scan stops. Ack removal leaving
    /// id gaps does not disturb that ordering.
    pub fn resend_backed_up(&mut self, socket: &dyn DatagramSocket, now: Instant) {
        let mut resend = Vec::new();

        for deque in [&self.backed_up_reliable, &self.backed_up_reliable_ordered] {
            for backed_up in deque {
                if now.duration_since(backed_up.creation) < self.retry_delay {
                    break;
                }

                resend.push(backed_up.data.clone());
            }
        }

        for data in resend {
            self.send_safe(socket, &data);
        }
    }

    /// Releases the backed-up packet matching an acknowledgement and feeds
    /// the round trip into the latency estimate. Duplicate acks are a no-op.
    pub fn acknowledged(&mut self, reliability: Reliability, id: u64, now: Instant) {
        match reliability {
            Reliability::Unreliable | Reliability::UnreliableSequenced => {
                warn!("peer acknowledged an unreliable packet? id: {id}");
            }
            Reliability::Reliable | Reliability::BigData => {
                Self::acknowledge_in(&mut self.backed_up_reliable, &mut self.latency, id, now);
            }
            Reliability::ReliableOrdered => {
                Self::acknowledge_in(
                    &mut self.backed_up_reliable_ordered,
                    &mut self.latency,
                    id,
                    now,
                );
            }
        }
    }

    fn acknowledge_in(
        deque: &mut VecDeque<BackedUpPacket>,
        latency: &mut LatencyEstimator,
        id: u64,
        now: Instant,
    ) {
        let Some(index) = deque.iter().position(|backed_up| backed_up.id == id) else {
            return;
        };

        let backed_up = deque.remove(index).unwrap();
        latency.update(now.duration_since(backed_up.creation));
    }

    fn send_safe(&mut self, socket: &dyn DatagramSocket, data: &[u8]) {
        if let Err(e) = socket.send_to(data, self.addr) {
            if e.kind() == io::ErrorKind::WouldBlock {
                // transient backpressure, the retry mechanism covers it
                return;
            }

            warn!("send to {} failed: {e}", self.addr);
            self.failed = true;
        }
    }
}
