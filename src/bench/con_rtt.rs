//! Connection round trip time.
//!
//! Measures the cost of setting up and tearing down a data connection
//! rather than moving payload. One iteration on the client:
//!
//! 1. send `READY` on the control channel to release the next cycle
//! 2. start the clock
//! 3. connect to the data service
//! 4. read the 4-byte `READY` word the server writes on every accepted
//!    connection (the connection counts as established only then)
//! 5. close the connection and stop the clock
//!
//! The server keeps one data listener open for the whole run. It reads one
//! `READY` from the control channel before every accept, so a client that
//! gives up part way closes control instead of leaving the server parked in
//! `accept`.

use crate::control::ControlChannel;
use crate::error::{BenchError, ProtocolError};
use crate::protocol::{Command, Opcode, COMMAND_WORD_LEN};
use crate::transport::{Listener, Transport, DATA_SERVICE};
use crate::wire::{read_full, read_some, write_full};
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::trace;

/// Connection cycles per run.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Accept `iterations` connections, greeting and draining each one.
///
/// Each accept waits for the client's `READY` on `control`. A control close
/// part way ends the run with `BenchError::Io`, as do failures on an
/// accepted connection. Accept failures are setup errors.
pub fn serve<L, S>(
    listener: &mut L,
    control: &mut ControlChannel<S>,
    iterations: usize,
) -> Result<usize, BenchError>
where
    L: Listener,
    S: Read + Write,
{
    let greeting = Command::ready().to_bytes();
    let mut scratch = [0u8; 64];

    for i in 0..iterations {
        control.expect_ready()?;
        let mut stream = listener
            .accept()
            .map_err(|e| BenchError::setup("data accept", e))?;
        write_full(&mut stream, &greeting)?;
        while read_some(&mut stream, &mut scratch)? != 0 {}
        trace!(iteration = i, "Connection cycle complete");
    }
    Ok(iterations)
}

/// Time `iterations` connect/greet/close cycles.
pub fn measure<T, S>(
    transport: &T,
    control: &mut ControlChannel<S>,
    iterations: usize,
) -> Result<Vec<Duration>, BenchError>
where
    T: Transport,
    S: Read + Write,
{
    let mut samples = Vec::with_capacity(iterations);
    let mut greeting = [0u8; COMMAND_WORD_LEN];

    for _ in 0..iterations {
        control.send(Command::ready())?;
        let start = Instant::now();
        let mut stream = transport.connect(DATA_SERVICE)?;
        read_full(&mut stream, &mut greeting)?;
        let command = Command::from_bytes(greeting)?;
        if command.opcode() != Opcode::Ready {
            return Err(ProtocolError::UnexpectedCommand {
                expected: Opcode::Ready,
                got: command,
            }
            .into());
        }
        drop(stream);
        samples.push(start.elapsed());
    }
    Ok(samples)
}
