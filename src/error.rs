//! Error types shared by both roles.

use std::io;
use thiserror::Error;

use crate::protocol::{Command, CommandError, Opcode};

/// Violations of the control protocol. These close the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("short command word ({received} of 4 bytes)")]
    ShortCommand { received: usize },

    #[error("expected {expected}, got {got}")]
    UnexpectedCommand { expected: Opcode, got: Command },

    #[error("command {0} is not valid in this direction")]
    Misdirected(Command),

    #[error("message size {size} outside 1..={max}")]
    BadMessageSize { size: usize, max: usize },

    #[error("iteration count must be non-zero")]
    ZeroIterations,
}

/// Benchmark errors.
///
/// `Setup` covers opening, binding and accepting endpoints and is fatal to
/// the process. `Io` is a failure in the middle of a run.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{op} failed: {source}")]
    Setup {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl BenchError {
    pub fn setup(op: &'static str, source: io::Error) -> Self {
        BenchError::Setup { op, source }
    }
}
