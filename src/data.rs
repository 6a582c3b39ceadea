//! Data channel setup.
//!
//! Every run gets a brand-new data connection:
//!
//! ```text
//! server                         client
//!   listen(DATA)
//!   READY  ───── control ──────▶  expect READY
//!   accept ◀──── data ──────────  connect(DATA)
//! ```
//!
//! The connection is dropped when the run ends and never reused.

use crate::control::ControlChannel;
use crate::error::BenchError;
use crate::protocol::Command;
use crate::transport::{Listener, Transport, DATA_SERVICE};
use std::io::{Read, Write};

/// Server side: open the data listener and announce it with `READY`.
pub fn open<T, S>(transport: &T, control: &mut ControlChannel<S>) -> Result<T::Listener, BenchError>
where
    T: Transport,
    S: Read + Write,
{
    let listener = transport
        .listen(DATA_SERVICE)
        .map_err(|e| BenchError::setup("data listen", e))?;
    control
        .send(Command::ready())
        .map_err(|e| BenchError::setup("send READY", e))?;
    Ok(listener)
}

/// Server side: wait for the client's data connection.
pub fn accept<L: Listener>(listener: &mut L) -> Result<L::Stream, BenchError> {
    listener
        .accept()
        .map_err(|e| BenchError::setup("data accept", e))
}

/// Client side: wait for `READY`, then connect the data channel.
pub fn connect<T, S>(transport: &T, control: &mut ControlChannel<S>) -> Result<T::Stream, BenchError>
where
    T: Transport,
    S: Read + Write,
{
    control.expect_ready()?;
    transport
        .connect(DATA_SERVICE)
        .map_err(|e| BenchError::setup("data connect", e))
}
