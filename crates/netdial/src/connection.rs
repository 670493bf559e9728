//! Established connection handed back by a successful dial.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::handle::InterruptibleHandle;

/// A connected stream plus the handle it was dialed under.
///
/// The handle stays in the pending registry after a successful dial; the
/// caller removes it once it has taken ownership of the connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    handle: InterruptibleHandle,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, handle: InterruptibleHandle) -> Self {
        Self { stream, handle }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn handle(&self) -> &InterruptibleHandle {
        &self.handle
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn into_parts(self) -> (TcpStream, InterruptibleHandle) {
        (self.stream, self.handle)
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}
