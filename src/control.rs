//! Control channel.
//!
//! A single long-lived connection on the control service. The client sends
//! one command word per run; the server answers with `READY` once the data
//! listener for that run is open.

use crate::error::{BenchError, ProtocolError};
use crate::protocol::{Command, Opcode, COMMAND_WORD_LEN};
use crate::wire::{read_some, write_full};
use std::io::{self, Read, Write};
use tracing::trace;

/// Command-word framing over a control stream.
pub struct ControlChannel<S> {
    stream: S,
}

impl<S: Read + Write> ControlChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send one command word.
    pub fn send(&mut self, command: Command) -> io::Result<()> {
        trace!(%command, "Sending command");
        write_full(&mut self.stream, &command.to_bytes())
    }

    /// Receive one command word.
    ///
    /// Returns `Ok(None)` when the peer closed before a new word started.
    /// A close part way through a word is a protocol violation.
    pub fn recv(&mut self) -> Result<Option<Command>, BenchError> {
        let mut word = [0u8; COMMAND_WORD_LEN];
        let mut received = 0;

        while received < COMMAND_WORD_LEN {
            match read_some(&mut self.stream, &mut word[received..])? {
                0 if received == 0 => return Ok(None),
                0 => return Err(ProtocolError::ShortCommand { received }.into()),
                n => received += n,
            }
        }

        let command = Command::from_bytes(word)?;
        trace!(%command, "Received command");
        Ok(Some(command))
    }

    /// Wait for the server's `READY`.
    pub fn expect_ready(&mut self) -> Result<(), BenchError> {
        match self.recv()? {
            Some(command) if command.opcode() == Opcode::Ready => Ok(()),
            Some(command) => Err(ProtocolError::UnexpectedCommand {
                expected: Opcode::Ready,
                got: command,
            }
            .into()),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control channel closed while waiting for READY",
            )
            .into()),
        }
    }
}
