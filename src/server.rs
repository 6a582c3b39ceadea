//! Benchmark server.
//!
//! Accepts exactly one control connection, then processes command words
//! strictly in the order received until the client closes the channel or
//! violates the protocol. Each command sets up a fresh data channel, runs
//! the server half of the selected benchmark, and tears the data channel
//! down again.
//!
//! A run that fails part way (the client reset its data connection, say)
//! is logged and the server goes back to waiting for the next command.
//! Failing to open, announce or accept a data endpoint is fatal.

use crate::bench::{con_rtt, msg_rtt};
use crate::buffer::TransferBuffer;
use crate::control::ControlChannel;
use crate::data;
use crate::error::{BenchError, ProtocolError};
use crate::protocol::{Command, Opcode};
use crate::transport::{Listener, Transport, CONTROL_SERVICE};
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Why the control channel closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the control connection between commands.
    PeerClosed,
    /// The client sent something the server cannot act on.
    ProtocolViolation(ProtocolError),
}

/// Outcome of one control session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSummary {
    pub runs_completed: usize,
    pub runs_aborted: usize,
    pub close_reason: CloseReason,
}

/// Server instance
pub struct Server<T: Transport> {
    transport: T,
    buffer: TransferBuffer,
}

impl<T: Transport> Server<T> {
    /// Create a server able to echo messages up to `max_message_size` bytes.
    pub fn new(transport: T, max_message_size: usize) -> Self {
        Self {
            transport,
            buffer: TransferBuffer::new(max_message_size),
        }
    }

    /// Serve one control session to completion.
    pub fn run(&mut self) -> Result<ServeSummary, BenchError> {
        let mut listener = self
            .transport
            .listen(CONTROL_SERVICE)
            .map_err(|e| BenchError::setup("control listen", e))?;
        info!(
            transport = self.transport.name(),
            service = %CONTROL_SERVICE,
            "Waiting for control connection"
        );

        let stream = listener
            .accept()
            .map_err(|e| BenchError::setup("control accept", e))?;
        info!("Control connection established");

        let mut control = ControlChannel::new(stream);
        let mut runs_completed = 0;
        let mut runs_aborted = 0;

        let close_reason = loop {
            let command = match control.recv() {
                Ok(Some(command)) => command,
                Ok(None) => break CloseReason::PeerClosed,
                Err(BenchError::Protocol(e)) => break CloseReason::ProtocolViolation(e),
                Err(e) => return Err(e),
            };

            info!(%command, "Dispatching");
            match self.dispatch(&mut control, command) {
                Ok(()) => runs_completed += 1,
                Err(BenchError::Io(e)) => {
                    warn!(%command, error = %e, "Run aborted");
                    runs_aborted += 1;
                }
                Err(BenchError::Protocol(e)) => break CloseReason::ProtocolViolation(e),
                Err(e) => return Err(e),
            }
        };

        match &close_reason {
            CloseReason::PeerClosed => info!(runs_completed, runs_aborted, "Client closed control channel"),
            CloseReason::ProtocolViolation(e) => {
                warn!(error = %e, runs_completed, runs_aborted, "Closing control channel")
            }
        }

        Ok(ServeSummary {
            runs_completed,
            runs_aborted,
            close_reason,
        })
    }

    fn dispatch<S: Read + Write>(
        &mut self,
        control: &mut ControlChannel<S>,
        command: Command,
    ) -> Result<(), BenchError> {
        match command.opcode() {
            Opcode::MsgRtt => self.serve_msg_rtt(control, command.argument() as usize),
            Opcode::ConRtt => self.serve_con_rtt(control, command.argument() as usize),
            Opcode::Ready => Err(ProtocolError::Misdirected(command).into()),
        }
    }

    fn serve_msg_rtt<S: Read + Write>(
        &mut self,
        control: &mut ControlChannel<S>,
        size: usize,
    ) -> Result<(), BenchError> {
        let buf = self.buffer.get_mut(size)?;
        let mut listener = data::open(&self.transport, control)?;
        let mut stream = data::accept(&mut listener)?;
        drop(listener);

        let stats = msg_rtt::echo(&mut stream, buf)?;
        debug!(size, reads = stats.reads, bytes = stats.bytes, "Echo run complete");
        Ok(())
    }

    fn serve_con_rtt<S: Read + Write>(
        &mut self,
        control: &mut ControlChannel<S>,
        iterations: usize,
    ) -> Result<(), BenchError> {
        if iterations == 0 {
            return Err(ProtocolError::ZeroIterations.into());
        }
        let mut listener = data::open(&self.transport, control)?;
        let served = con_rtt::serve(&mut listener, control, iterations)?;
        debug!(connections = served, "Connection run complete");
        Ok(())
    }
}
