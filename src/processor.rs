use crate::buffer::BufferReader;
use crate::config::Config;
use crate::reliability::Reliability;
use crate::shipper::PacketShipper;
use crate::signal::Signal;
use crate::socket::DatagramSocket;
use crate::sorter::PacketSorter;
use smallvec::SmallVec;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Handler for application payloads: `(leading signal, remaining bytes)`.
pub type PacketBodyCallback<S> = Box<dyn FnMut(S, &[u8])>;

/// Invoked exactly once when the connection times out or a send fails
/// unrecoverably.
pub type KickCallback = Box<dyn FnMut()>;

struct Keepalive {
    interval: Duration,
    payload: Vec<u8>,
    next_at: Option<Instant>,
}

/// One logical connection: a [`PacketShipper`] and [`PacketSorter`] pair
/// bound to a shared raw socket and a remote address.
///
/// The owning manager routes inbound datagrams here via [`Self::on_packet`]
/// and ticks [`Self::update`] once per frame. A processor is either active or
/// failed; once failed it sends nothing and the kick callback has fired.
pub struct PacketProcessor<S: Signal> {
    socket: Rc<dyn DatagramSocket>,
    addr: SocketAddr,
    ack_signal: S,
    shipper: PacketShipper,
    sorter: PacketSorter<S>,
    retry_delay: Duration,
    timeout: Duration,
    assembly_timeout: Duration,
    next_resend: Instant,
    keepalive: Option<Keepalive>,
    heavy_signals: SmallVec<[S; 4]>,
    backgrounded: bool,
    /// Latest deferred heavy payload per signal, replayed on foreground.
    deferred: Vec<(S, Vec<u8>)>,
    handshake: Option<(Reliability, u64)>,
    handshake_acked: bool,
    failed: bool,
    on_packet_body: Option<PacketBodyCallback<S>>,
    on_kick: Option<KickCallback>,
}

impl<S: Signal> PacketProcessor<S> {
    pub fn new(
        socket: Rc<dyn DatagramSocket>,
        addr: SocketAddr,
        ack_signal: S,
        config: &Config,
        now: Instant,
    ) -> Self {
        Self {
            addr,
            ack_signal,
            shipper: PacketShipper::new(addr, config),
            sorter: PacketSorter::new(addr, ack_signal, config, now),
            socket,
            retry_delay: config.retry_delay,
            timeout: config.timeout,
            assembly_timeout: config.assembly_timeout,
            next_resend: now + config.retry_delay,
            keepalive: None,
            heavy_signals: SmallVec::new(),
            backgrounded: false,
            deferred: Vec::new(),
            handshake: None,
            handshake_acked: false,
            failed: false,
            on_packet_body: None,
            on_kick: None,
        }
    }

    pub fn set_packet_body_callback(&mut self, callback: impl FnMut(S, &[u8]) + 'static) {
        self.on_packet_body = Some(Box::new(callback));
    }

    pub fn set_kick_callback(&mut self, callback: impl FnMut() + 'static) {
        self.on_kick = Some(Box::new(callback));
    }

    /// Periodically sends `payload` as an `Unreliable` packet, keeping the
    /// connection warm while the application has nothing to say (including
    /// while backgrounded).
    pub fn set_keepalive(&mut self, interval: Duration, payload: Vec<u8>) {
        self.keepalive = Some(Keepalive {
            interval,
            payload,
            next_at: None,
        });
    }

    /// Marks payloads with this signal as heavyweight: while backgrounded
    /// only the latest one is retained for processing on foreground.
    pub fn register_heavy_signal(&mut self, signal: S) {
        if !self.heavy_signals.contains(&signal) {
            self.heavy_signals.push(signal);
        }
    }

    /// While backgrounded, heavy payloads are retained instead of dispatched.
    /// Returning to the foreground replays the latest retained payload per
    /// signal, in arrival order.
    pub fn set_backgrounded(&mut self, backgrounded: bool) {
        self.backgrounded = backgrounded;

        if backgrounded {
            return;
        }

        let Some(on_packet_body) = &mut self.on_packet_body else {
            self.deferred.clear();
            return;
        };

        for (signal, body) in self.deferred.drain(..) {
            on_packet_body(signal, &body);
        }
    }

    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded
    }

    /// Registers the distinguished reliable packet whose acknowledgement
    /// completes the handshake. Pass the pair returned by
    /// [`Self::send_packet`].
    pub fn track_handshake(&mut self, reliability: Reliability, id: u64) {
        self.handshake = Some((reliability, id));
        self.handshake_acked = false;
    }

    pub fn handshake_acked(&self) -> bool {
        self.handshake_acked
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn avg_latency(&self) -> Duration {
        self.shipper.avg_latency()
    }

    pub fn last_message_time(&self) -> Instant {
        self.sorter.last_message_time()
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        now.duration_since(self.sorter.last_message_time()) > self.timeout
    }

    /// Entry point for datagrams the socket owner routed to this connection.
    ///
    /// Acks are consumed internally; every other payload reaches the packet
    /// body callback (or the deferred list while backgrounded).
    pub fn on_packet(&mut self, packet: &[u8], now: Instant) {
        if self.failed {
            return;
        }

        let sorted = match self.sorter.sort_packet(&*self.socket, packet, now) {
            Ok(sorted) => sorted,
            Err(e) => {
                // noise, not a connection failure
                debug!("dropping malformed packet from {}: {e}", self.addr);
                return;
            }
        };

        for body in sorted {
            if let Err(e) = self.handle_body(&body, now) {
                debug!("dropping malformed message from {}: {e}", self.addr);
            }
        }

        if self.shipper.has_failed() {
            self.fail();
        }
    }

    fn handle_body(&mut self, body: &[u8], now: Instant) -> Result<(), crate::TransportError> {
        let mut reader = BufferReader::new(body);
        let signal = S::read(&mut reader)?;

        if signal == self.ack_signal {
            let reliability = Reliability::from_u8(reader.read_u8()?)?;
            let id = reader.read_u64()?;

            self.shipper.acknowledged(reliability, id, now);

            if self.handshake == Some((reliability, id)) {
                self.handshake_acked = true;
            }

            return Ok(());
        }

        if self.backgrounded && self.heavy_signals.contains(&signal) {
            self.defer_body(signal, reader.remaining());
            return Ok(());
        }

        if let Some(on_packet_body) = &mut self.on_packet_body {
            on_packet_body(signal, reader.remaining());
        }

        Ok(())
    }

    fn defer_body(&mut self, signal: S, body: &[u8]) {
        if let Some((_, existing)) = self
            .deferred
            .iter_mut()
            .find(|(deferred_signal, _)| *deferred_signal == signal)
        {
            *existing = body.to_vec();
        } else {
            self.deferred.push((signal, body.to_vec()));
        }
    }

    /// Periodic tick: retransmission, keepalive, reassembly pruning, and
    /// timeout detection.
    pub fn update(&mut self, now: Instant) {
        if self.failed {
            return;
        }

        if now >= self.next_resend {
            self.shipper.resend_backed_up(&*self.socket, now);
            self.sorter.prune_assembly(now, self.assembly_timeout);
            self.next_resend = now + self.retry_delay;
        }

        if let Some(keepalive) = &mut self.keepalive {
            let due = match keepalive.next_at {
                Some(next_at) => now >= next_at,
                None => true,
            };

            if due {
                keepalive.next_at = Some(now + keepalive.interval);
                let payload = keepalive.payload.clone();
                self.shipper
                    .send(&*self.socket, Reliability::Unreliable, &payload, now);
            }
        }

        if self.timed_out(now) || self.shipper.has_failed() {
            self.fail();
        }
    }

    /// Thin forward to [`PacketShipper::send`]. Returns `None` once the
    /// processor has failed.
    pub fn send_packet(
        &mut self,
        reliability: Reliability,
        body: &[u8],
        now: Instant,
    ) -> Option<(Reliability, u64)> {
        if self.failed {
            return None;
        }

        let result = self.shipper.send(&*self.socket, reliability, body, now);

        if self.shipper.has_failed() {
            self.fail();
        }

        Some(result)
    }

    fn fail(&mut self) {
        if self.failed {
            return;
        }

        self.failed = true;

        if let Some(mut on_kick) = self.on_kick.take() {
            on_kick();
        }
    }
}
