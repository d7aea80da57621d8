#![allow(dead_code)]

use reliable_dgram::DatagramSocket;
use std::cell::{Cell, RefCell};
use std::io;
use std::net::SocketAddr;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Sends land in the outbox.
    Deliver,
    /// Sends fail with `WouldBlock` (transient backpressure).
    WouldBlock,
    /// Sends fail unrecoverably.
    Broken,
}

/// In-memory stand-in for the raw datagram socket. Captures everything the
/// transport sends so tests can inspect frames or shuttle them to a peer.
pub struct TestSocket {
    outbox: RefCell<Vec<(Vec<u8>, SocketAddr)>>,
    mode: Cell<SendMode>,
}

impl TestSocket {
    pub fn new() -> Self {
        Self {
            outbox: RefCell::new(Vec::new()),
            mode: Cell::new(SendMode::Deliver),
        }
    }

    pub fn set_mode(&self, mode: SendMode) {
        self.mode.set(mode);
    }

    /// Drains and returns every captured datagram.
    pub fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    /// Drains captured datagrams, dropping the addresses.
    pub fn take_payloads(&self) -> Vec<Vec<u8>> {
        self.take_sent().into_iter().map(|(bytes, _)| bytes).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.outbox.borrow().len()
    }
}

impl DatagramSocket for TestSocket {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match self.mode.get() {
            SendMode::Deliver => {
                self.outbox.borrow_mut().push((bytes.to_vec(), addr));
                Ok(bytes.len())
            }
            SendMode::WouldBlock => Err(io::Error::new(io::ErrorKind::WouldBlock, "send buffer full")),
            SendMode::Broken => Err(io::Error::other("socket closed")),
        }
    }
}

pub fn test_addr() -> SocketAddr {
    "127.0.0.1:3000".parse().unwrap()
}

pub fn peer_addr() -> SocketAddr {
    "127.0.0.1:4000".parse().unwrap()
}
