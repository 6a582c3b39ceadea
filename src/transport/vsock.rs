//! vsock transport (Linux host/guest sockets).
//!
//! A service identifier maps to the vsock port formed by its first 32 bits.
//! The server listens on any context id; the client connects to the
//! configured peer context id.

use super::{Listener, ServiceId, Transport, LISTEN_BACKLOG};
use socket2::{Domain, SockAddr, Socket, Type};
use std::io;
use std::time::Duration;
use tracing::debug;

/// Bind to every context id.
pub const CID_ANY: u32 = libc::VMADDR_CID_ANY;

/// vsock transport for one peer context id.
#[derive(Debug, Clone)]
pub struct VsockTransport {
    cid: u32,
    timeout: Option<Duration>,
}

impl VsockTransport {
    pub fn new(cid: u32) -> Self {
        Self { cid, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// vsock port used for `service`.
pub fn port_for(service: ServiceId) -> u32 {
    service.leading_u32()
}

impl Transport for VsockTransport {
    type Stream = Socket;
    type Listener = VsockListener;

    fn name(&self) -> &'static str {
        "vsock"
    }

    fn listen(&self, service: ServiceId) -> io::Result<VsockListener> {
        let socket = Socket::new(Domain::VSOCK, Type::STREAM, None)?;
        socket.bind(&SockAddr::vsock(CID_ANY, port_for(service)))?;
        socket.listen(LISTEN_BACKLOG)?;
        debug!(%service, port = port_for(service), "Listening");
        Ok(VsockListener {
            inner: socket,
            timeout: self.timeout,
        })
    }

    fn connect(&self, service: ServiceId) -> io::Result<Socket> {
        let socket = Socket::new(Domain::VSOCK, Type::STREAM, None)?;
        socket.connect(&SockAddr::vsock(self.cid, port_for(service)))?;
        configure(&socket, self.timeout)?;
        debug!(%service, cid = self.cid, port = port_for(service), "Connected");
        Ok(socket)
    }
}

/// Listening vsock socket for one service.
pub struct VsockListener {
    inner: Socket,
    timeout: Option<Duration>,
}

impl Listener for VsockListener {
    type Stream = Socket;

    fn accept(&mut self) -> io::Result<Socket> {
        let (socket, peer) = self.inner.accept()?;
        configure(&socket, self.timeout)?;
        debug!(peer = ?peer.as_vsock_address(), "Accepted connection");
        Ok(socket)
    }
}

fn configure(socket: &Socket, timeout: Option<Duration>) -> io::Result<()> {
    socket.set_read_timeout(timeout)?;
    socket.set_write_timeout(timeout)?;
    Ok(())
}
