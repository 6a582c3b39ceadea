//! In-memory streams and transports for tests.

use crate::transport::{Listener, ServiceId, Transport};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpListener;
use std::rc::Rc;

/// Pick a currently unused loopback port.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap()
}

/// Stream that reads from a fixed script and records everything written.
pub struct ScriptedStream {
    input: VecDeque<u8>,
    output: Rc<RefCell<Vec<u8>>>,
    chunk: usize,
    write_chunk: usize,
    write_capacity: Option<usize>,
    fail_read_after: Option<usize>,
    fail_write_after: Option<usize>,
    interrupt_next_read: bool,
    reads: usize,
    writes: usize,
}

impl ScriptedStream {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: input.into(),
            output: Rc::new(RefCell::new(Vec::new())),
            chunk: usize::MAX,
            write_chunk: usize::MAX,
            write_capacity: None,
            fail_read_after: None,
            fail_write_after: None,
            interrupt_next_read: false,
            reads: 0,
            writes: 0,
        }
    }

    /// Transfer at most `chunk` bytes per call.
    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self.write_chunk = chunk;
        self
    }

    /// Accept at most `chunk` bytes per write call.
    pub fn write_chunked(mut self, chunk: usize) -> Self {
        self.write_chunk = chunk;
        self
    }

    /// Accept at most `capacity` bytes in total, then return `Ok(0)`.
    pub fn write_capacity(mut self, capacity: usize) -> Self {
        self.write_capacity = Some(capacity);
        self
    }

    /// Fail every read after `reads` successful ones.
    pub fn fail_read_after(mut self, reads: usize) -> Self {
        self.fail_read_after = Some(reads);
        self
    }

    /// Fail every write after `writes` successful ones.
    pub fn fail_write_after(mut self, writes: usize) -> Self {
        self.fail_write_after = Some(writes);
        self
    }

    pub fn interrupt_first_read(mut self) -> Self {
        self.interrupt_next_read = true;
        self
    }

    /// Shared handle on the bytes written so far.
    pub fn output(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.output)
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupt_next_read {
            self.interrupt_next_read = false;
            return Err(ErrorKind::Interrupted.into());
        }
        if self.fail_read_after.is_some_and(|n| self.reads >= n) {
            return Err(io::Error::new(ErrorKind::ConnectionReset, "injected read failure"));
        }
        let n = buf.len().min(self.chunk).min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        self.reads += 1;
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_write_after.is_some_and(|n| self.writes >= n) {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "injected write failure"));
        }
        let mut output = self.output.borrow_mut();
        let room = self
            .write_capacity
            .map_or(usize::MAX, |cap| cap.saturating_sub(output.len()));
        let n = buf.len().min(self.write_chunk).min(room);
        output.extend_from_slice(&buf[..n]);
        self.writes += 1;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stream whose reads return whatever was previously written: a perfect
/// echo peer.
pub struct LoopbackStream {
    queue: VecDeque<u8>,
    chunk: usize,
    fail_read_after: Option<usize>,
    reads: usize,
}

impl LoopbackStream {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            chunk: usize::MAX,
            fail_read_after: None,
            reads: 0,
        }
    }

    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn fail_read_after(mut self, reads: usize) -> Self {
        self.fail_read_after = Some(reads);
        self
    }
}

impl Read for LoopbackStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_read_after.is_some_and(|n| self.reads >= n) {
            return Err(io::Error::new(ErrorKind::ConnectionReset, "injected read failure"));
        }
        let n = buf.len().min(self.chunk).min(self.queue.len());
        for (slot, byte) in buf.iter_mut().zip(self.queue.drain(..n)) {
            *slot = byte;
        }
        self.reads += 1;
        Ok(n)
    }
}

impl Write for LoopbackStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.queue.extend(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Either kind of in-memory stream.
pub enum MockStream {
    Scripted(ScriptedStream),
    Loopback(LoopbackStream),
}

impl From<ScriptedStream> for MockStream {
    fn from(stream: ScriptedStream) -> Self {
        MockStream::Scripted(stream)
    }
}

impl From<LoopbackStream> for MockStream {
    fn from(stream: LoopbackStream) -> Self {
        MockStream::Loopback(stream)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MockStream::Scripted(s) => s.read(buf),
            MockStream::Loopback(s) => s.read(buf),
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MockStream::Scripted(s) => s.write(buf),
            MockStream::Loopback(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Listener handing out pre-built streams.
pub struct MockListener {
    streams: VecDeque<MockStream>,
}

impl MockListener {
    pub fn new(streams: Vec<MockStream>) -> Self {
        Self {
            streams: streams.into(),
        }
    }
}

impl Listener for MockListener {
    type Stream = MockStream;

    fn accept(&mut self) -> io::Result<MockStream> {
        self.streams
            .pop_front()
            .ok_or_else(|| io::Error::new(ErrorKind::ConnectionAborted, "no more connections"))
    }
}

/// Transport serving queued listeners and connections in order.
#[derive(Default)]
pub struct MockTransport {
    listeners: RefCell<VecDeque<MockListener>>,
    connections: RefCell<VecDeque<MockStream>>,
    services: RefCell<Vec<ServiceId>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(self, listener: MockListener) -> Self {
        self.listeners.borrow_mut().push_back(listener);
        self
    }

    pub fn with_connection(self, stream: impl Into<MockStream>) -> Self {
        self.connections.borrow_mut().push_back(stream.into());
        self
    }

    /// Services passed to `listen`/`connect`, in call order.
    pub fn services(&self) -> Vec<ServiceId> {
        self.services.borrow().clone()
    }
}

impl Transport for MockTransport {
    type Stream = MockStream;
    type Listener = MockListener;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn listen(&self, service: ServiceId) -> io::Result<MockListener> {
        self.services.borrow_mut().push(service);
        self.listeners
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| io::Error::new(ErrorKind::AddrInUse, "no listener queued"))
    }

    fn connect(&self, service: ServiceId) -> io::Result<MockStream> {
        self.services.borrow_mut().push(service);
        self.connections
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| io::Error::new(ErrorKind::ConnectionRefused, "no connection queued"))
    }
}
