//! TCP transport.
//!
//! Each service identifier maps to a fixed port. Listeners are created with
//! `SO_REUSEADDR` so a fresh data listener can be bound on the same port
//! right after the previous run closed its own.

use super::{Listener, ServiceId, Transport, CONTROL_SERVICE, DATA_SERVICE, LISTEN_BACKLOG};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Default port for the control service.
pub const DEFAULT_CONTROL_PORT: u16 = 50197;

/// Default port for the data service.
pub const DEFAULT_DATA_PORT: u16 = 50198;

/// TCP transport bound to one host.
///
/// For a server the host is the local address to bind; for a client it is
/// the peer to connect to.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    control_port: u16,
    data_port: u16,
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, control_port: u16, data_port: u16) -> Self {
        Self {
            host: host.into(),
            control_port,
            data_port,
            timeout: None,
        }
    }

    /// Apply a read/write deadline to every stream. `None` blocks forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn port_for(&self, service: ServiceId) -> io::Result<u16> {
        if service == CONTROL_SERVICE {
            Ok(self.control_port)
        } else if service == DATA_SERVICE {
            Ok(self.data_port)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no TCP port mapped for service {service}"),
            ))
        }
    }

    /// Every address the host resolves to for `service`, in resolver order.
    fn resolve(&self, service: ServiceId) -> io::Result<Vec<SocketAddr>> {
        let port = self.port_for(service)?;
        let addrs: Vec<SocketAddr> = (self.host.as_str(), port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve to an address", self.host),
            ));
        }
        Ok(addrs)
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;
    type Listener = TcpServiceListener;

    fn name(&self) -> &'static str {
        "tcp"
    }

    fn listen(&self, service: ServiceId) -> io::Result<TcpServiceListener> {
        let addr = self.resolve(service)?[0];
        let inner = create_listener(addr)?;
        debug!(%service, addr = %addr, "Listening");
        Ok(TcpServiceListener {
            inner,
            timeout: self.timeout,
        })
    }

    fn connect(&self, service: ServiceId) -> io::Result<TcpStream> {
        let addrs = self.resolve(service)?;
        // First address that accepts wins.
        let stream = TcpStream::connect(&addrs[..])?;
        configure_stream(&stream, self.timeout)?;
        debug!(%service, peer = %stream.peer_addr()?, "Connected");
        Ok(stream)
    }
}

/// Listening TCP socket for one service.
pub struct TcpServiceListener {
    inner: TcpListener,
    timeout: Option<Duration>,
}

impl Listener for TcpServiceListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> io::Result<TcpStream> {
        let (stream, peer) = self.inner.accept()?;
        configure_stream(&stream, self.timeout)?;
        debug!(peer = %peer, "Accepted connection");
        Ok(stream)
    }
}

fn configure_stream(stream: &TcpStream, timeout: Option<Duration>) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(())
}

/// Create a blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
