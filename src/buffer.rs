//! Transfer buffer for benchmark payloads.
//!
//! One buffer is allocated up front, sized to the largest message the
//! process will handle, and reused by every iteration of every run so that
//! allocation never shows up in the measured latency.

use crate::error::ProtocolError;

/// Default transfer buffer size (2 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Pre-allocated payload buffer owned by a client or server.
pub struct TransferBuffer {
    data: Vec<u8>,
}

impl TransferBuffer {
    /// Allocate a buffer of `capacity` bytes.
    ///
    /// The contents are a repeating byte pattern rather than zeros so that
    /// echoed payloads are distinguishable from an untouched buffer.
    pub fn new(capacity: usize) -> Self {
        let data = (0..capacity).map(|i| (i % 251) as u8).collect();
        Self { data }
    }

    /// Maximum message size this buffer can carry.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Borrow the first `len` bytes for one run.
    pub fn get_mut(&mut self, len: usize) -> Result<&mut [u8], ProtocolError> {
        if len == 0 || len > self.data.len() {
            return Err(ProtocolError::BadMessageSize {
                size: len,
                max: self.data.len(),
            });
        }
        Ok(&mut self.data[..len])
    }
}
