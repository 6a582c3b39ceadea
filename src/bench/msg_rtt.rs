//! Message round trip time.
//!
//! The server echoes whatever arrives on the data connection until the
//! client closes it. The client sends a fixed-size message, waits for the
//! complete echo, and records the elapsed time, for a fixed number of
//! iterations. There is no pipelining: iteration N+1 is not sent before
//! iteration N's echo has fully arrived.

use crate::wire::{read_full, read_some, write_full};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Iterations per message size.
pub const DEFAULT_ITERATIONS: usize = 5000;

/// Message sizes swept, in order.
pub const DEFAULT_SIZES: [usize; 11] = [4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096];

/// What the server echoed during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    pub reads: usize,
    pub bytes: usize,
}

/// Echo until the peer shuts down.
///
/// Each read takes at most `buf.len()` bytes; exactly what was read is
/// written back. A zero-length read ends the run successfully.
pub fn echo<S: Read + Write>(stream: &mut S, buf: &mut [u8]) -> io::Result<EchoStats> {
    let mut stats = EchoStats::default();
    loop {
        let received = read_some(stream, buf)?;
        if received == 0 {
            return Ok(stats);
        }
        write_full(stream, &buf[..received])?;
        stats.reads += 1;
        stats.bytes += received;
    }
}

/// Time `iterations` request/echo exchanges of `buf.len()` bytes.
///
/// Any error aborts the run and the samples gathered so far are dropped.
pub fn measure<S: Read + Write>(
    stream: &mut S,
    buf: &mut [u8],
    iterations: usize,
) -> io::Result<Vec<Duration>> {
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        write_full(stream, buf)?;
        read_full(stream, buf)?;
        samples.push(start.elapsed());
    }
    Ok(samples)
}
