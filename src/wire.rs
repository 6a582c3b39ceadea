//! Blocking read/write loops.
//!
//! Stream transports may accept or deliver fewer bytes than requested on
//! any call. These helpers resume at the unsent/unfilled offset until the
//! whole buffer has been transferred.

use std::io::{self, ErrorKind, Read, Write};

/// Write all of `buf`, looping on partial writes.
pub fn write_full<W: Write + ?Sized>(stream: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match stream.write(&buf[sent..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    format!("peer stopped accepting data after {sent} of {} bytes", buf.len()),
                ))
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fill all of `buf`, looping on partial reads.
///
/// A peer close before the buffer is full is an `UnexpectedEof` error.
pub fn read_full<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> io::Result<()> {
    let mut received = 0;
    while received < buf.len() {
        match read_some(stream, &mut buf[received..])? {
            0 => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("peer closed after {received} of {} bytes", buf.len()),
                ))
            }
            n => received += n,
        }
    }
    Ok(())
}

/// Single read into `buf`. Returns 0 on orderly peer shutdown.
pub fn read_some<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
