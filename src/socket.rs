use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;

/// The externally-owned raw datagram socket.
///
/// The transport never reads from the socket itself; the owning manager polls
/// for datagrams and routes them to the right processor by sender address.
/// Sends must be non-blocking: a `WouldBlock` error is treated as transient
/// backpressure and absorbed by the retry mechanism.
pub trait DatagramSocket {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl DatagramSocket for std::net::UdpSocket {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        std::net::UdpSocket::send_to(self, bytes, addr)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for &T {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        (**self).send_to(bytes, addr)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for Rc<T> {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        (**self).send_to(bytes, addr)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for Arc<T> {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        (**self).send_to(bytes, addr)
    }
}
