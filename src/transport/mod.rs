//! Stream transports.
//!
//! The benchmark only needs a handful of blocking primitives: listen on a
//! well-known service, accept one connection, connect to a service, and
//! read/write bytes. Closing is dropping the handle.
//!
//! Backends:
//! - `tcp`: each service maps to a TCP port (all platforms)
//! - `vsock`: host/guest sockets (Linux only)

use std::fmt;
use std::io::{self, Read, Write};

pub mod tcp;
#[cfg(target_os = "linux")]
pub mod vsock;

pub use tcp::TcpTransport;
#[cfg(target_os = "linux")]
pub use vsock::VsockTransport;

/// Pending-connection queue length for every listener.
#[cfg(unix)]
pub(crate) const LISTEN_BACKLOG: i32 = libc::SOMAXCONN;
#[cfg(not(unix))]
pub(crate) const LISTEN_BACKLOG: i32 = 128;

/// 128-bit rendezvous identifier for a listening service.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(u128);

/// Control channel service: 3049197C-9A4E-4FBF-9367-97F792F16994
pub const CONTROL_SERVICE: ServiceId = ServiceId::from_u128(0x3049197c_9a4e_4fbf_9367_97f792f16994);

/// Data channel service: 9DC644A1-9F8F-4EE6-AF95-BF9E31D46D9D
pub const DATA_SERVICE: ServiceId = ServiceId::from_u128(0x9dc644a1_9f8f_4ee6_af95_bf9e31d46d9d);

impl ServiceId {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// The first 32 bits of the identifier.
    pub const fn leading_u32(&self) -> u32 {
        (self.0 >> 96) as u32
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({self})")
    }
}

/// A bound, listening endpoint.
pub trait Listener {
    type Stream: Read + Write;

    /// Block until a peer connects.
    fn accept(&mut self) -> io::Result<Self::Stream>;
}

/// Blocking stream-socket capability consumed by both roles.
pub trait Transport {
    type Stream: Read + Write;
    type Listener: Listener<Stream = Self::Stream>;

    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Open a listener for `service`.
    fn listen(&self, service: ServiceId) -> io::Result<Self::Listener>;

    /// Connect to `service` on the configured peer.
    fn connect(&self, service: ServiceId) -> io::Result<Self::Stream>;
}
