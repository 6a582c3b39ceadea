//! Benchmark control protocol.
//!
//! The client selects and parametrizes a benchmark by sending a single
//! 32-bit command word to the server. The top 4 bits carry the opcode and
//! the low 28 bits carry an argument:
//!
//! ```text
//!  31    28 27                                0
//! +--------+-----------------------------------+
//! | opcode |             argument              |
//! +--------+-----------------------------------+
//! ```
//!
//! Words travel little-endian on the wire.

use std::fmt;
use thiserror::Error;

use crate::error::ProtocolError;

/// Size of one command word on the wire.
pub const COMMAND_WORD_LEN: usize = 4;

const OPCODE_MASK: u32 = 0xf;
const OPCODE_SHIFT: u32 = 28;

/// Largest argument that fits in a command word.
pub const ARGUMENT_MASK: u32 = 0x0fff_ffff;

/// Benchmark opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Message round trip time; argument is the message size in bytes.
    MsgRtt = 0x1,
    /// Connection round trip time; argument is the iteration count.
    ConRtt = 0x2,
    /// Sent by the server once its data listener is open.
    Ready = 0xf,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::MsgRtt => "MSG_RTT",
            Opcode::ConRtt => "CON_RTT",
            Opcode::Ready => "READY",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(Opcode::MsgRtt),
            0x2 => Ok(Opcode::ConRtt),
            0xf => Ok(Opcode::Ready),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pack an opcode and argument into a command word.
///
/// The opcode is clamped to 4 bits and the argument silently masked to
/// 28 bits. Use [`Command::new`] to reject oversized arguments instead.
pub fn encode_word(opcode: u8, argument: u32) -> u32 {
    ((u32::from(opcode) & OPCODE_MASK) << OPCODE_SHIFT) | (argument & ARGUMENT_MASK)
}

/// Split a command word into its raw opcode and argument.
///
/// Total over all inputs; whether the opcode is assigned is up to the caller.
pub fn decode_word(word: u32) -> (u8, u32) {
    (((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8, word & ARGUMENT_MASK)
}

/// Errors building a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("argument {0} does not fit in 28 bits")]
    ArgumentTooWide(u64),
}

/// A validated command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    argument: u32,
}

impl Command {
    /// Create a command, rejecting arguments wider than 28 bits.
    pub fn new(opcode: Opcode, argument: u32) -> Result<Self, CommandError> {
        if argument > ARGUMENT_MASK {
            return Err(CommandError::ArgumentTooWide(u64::from(argument)));
        }
        Ok(Self { opcode, argument })
    }

    /// `MSG_RTT` for a message of `size` bytes.
    pub fn msg_rtt(size: usize) -> Result<Self, CommandError> {
        Self::new(Opcode::MsgRtt, narrow(size)?)
    }

    /// `CON_RTT` for `iterations` connection cycles.
    pub fn con_rtt(iterations: usize) -> Result<Self, CommandError> {
        Self::new(Opcode::ConRtt, narrow(iterations)?)
    }

    pub fn ready() -> Self {
        Self {
            opcode: Opcode::Ready,
            argument: 0,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn argument(&self) -> u32 {
        self.argument
    }

    pub fn to_word(self) -> u32 {
        encode_word(self.opcode as u8, self.argument)
    }

    /// Decode a word received from the peer.
    pub fn from_word(word: u32) -> Result<Self, ProtocolError> {
        let (opcode, argument) = decode_word(word);
        Ok(Self {
            opcode: Opcode::try_from(opcode)?,
            argument,
        })
    }

    pub fn to_bytes(self) -> [u8; COMMAND_WORD_LEN] {
        self.to_word().to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; COMMAND_WORD_LEN]) -> Result<Self, ProtocolError> {
        Self::from_word(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Opcode::Ready => write!(f, "{}", self.opcode),
            _ => write!(f, "{}({})", self.opcode, self.argument),
        }
    }
}

fn narrow(value: usize) -> Result<u32, CommandError> {
    u32::try_from(value).map_err(|_| CommandError::ArgumentTooWide(value as u64))
}
