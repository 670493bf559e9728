//! Network stack seam: how a dial worker actually opens a TCP connection.
//!
//! The dialer never talks to sockets directly. It calls a `Connector`, which
//! lets tests gate or fail connects and lets platforms decide whether they
//! can honour device binding.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::Instant;

/// Binds a socket to a specific network device before it connects.
///
/// Typical use is keeping tunnel traffic off a VPN interface that would
/// otherwise route it back into the tunnel.
pub trait DeviceBinder: Send + Sync {
    fn bind(&self, socket: &TcpSocket) -> io::Result<()>;
}

/// Binds sockets to a named interface (`SO_BINDTODEVICE`).
#[derive(Debug, Clone)]
pub struct InterfaceBinder {
    interface: String,
}

impl InterfaceBinder {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl DeviceBinder for InterfaceBinder {
    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    fn bind(&self, socket: &TcpSocket) -> io::Result<()> {
        socket.bind_device(Some(self.interface.as_bytes()))
    }

    #[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
    fn bind(&self, _socket: &TcpSocket) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot bind to device {} on this platform", self.interface),
        ))
    }
}

/// Opens one TCP connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `addr` (`host:port`) within `timeout`.
    async fn connect(
        &self,
        addr: &str,
        timeout: Duration,
        device_binder: Option<&dyn DeviceBinder>,
    ) -> io::Result<TcpStream>;

    /// Whether `connect` honours a device binder on this platform.
    fn supports_device_binding(&self) -> bool {
        false
    }
}

/// Connector backed by the tokio network stack.
///
/// Resolves the host, then tries each resolved address in order until one
/// connects. The timeout is a single deadline covering resolution and every
/// attempt; expiry is reported as `ErrorKind::TimedOut`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }

    async fn connect_one(
        target: SocketAddr,
        device_binder: Option<&dyn DeviceBinder>,
    ) -> io::Result<TcpStream> {
        let socket = if target.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(binder) = device_binder {
            binder.bind(&socket)?;
        }
        socket.connect(target).await
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        addr: &str,
        timeout: Duration,
        device_binder: Option<&dyn DeviceBinder>,
    ) -> io::Result<TcpStream> {
        // A timeout past what `Instant` can represent means no deadline at all.
        let deadline = Instant::now().checked_add(timeout);

        let targets = before(deadline, tokio::net::lookup_host(addr))
            .await
            .ok_or_else(|| timed_out(timeout))??;

        let mut last_err = None;
        for target in targets {
            match before(deadline, Self::connect_one(target, device_binder)).await {
                Some(Ok(stream)) => return Ok(stream),
                Some(Err(e)) => {
                    tracing::trace!(%target, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
                None => return Err(timed_out(timeout)),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {addr}"),
            )
        }))
    }

    fn supports_device_binding(&self) -> bool {
        cfg!(any(
            target_os = "android",
            target_os = "fuchsia",
            target_os = "linux"
        ))
    }
}

/// Run `fut` until `deadline`; `None` if the deadline passed first.
async fn before<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

pub(crate) fn timed_out(timeout: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("connect timed out after {timeout:?}"),
    )
}
