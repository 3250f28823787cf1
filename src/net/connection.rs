use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Instant;

/// Per-client state. The multiplexer closes after every response (see
/// `net::multiplexer`), so there is no `KeepAlive` state to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Reading,
    Routing,
    Writing,
    Closing,
}

/// A buffer growing past this before the header terminator arrives is
/// treated as an oversized request rather than grown without bound.
const MAX_BUFFERED_REQUEST: usize = 1024 * 1024;

pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    listening_port: u16,
    state: ConnState,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    write_pos: usize,
    last_activity: Instant,
}

pub enum ReadOutcome {
    /// No more data available right now; stay in `Reading`.
    WouldBlock,
    /// The peer closed the connection.
    Eof,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, listening_port: u16) -> Self {
        Connection {
            stream,
            addr,
            listening_port,
            state: ConnState::Reading,
            read_buffer: Vec::with_capacity(4096),
            write_buffer: Vec::new(),
            write_pos: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn listening_port(&self) -> u16 {
        self.listening_port
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn buffered(&self) -> &[u8] {
        &self.read_buffer
    }

    /// Drains everything read so far. Since at most one response is ever
    /// outstanding per connection, a fully parsed request clears the buffer.
    pub fn clear_read_buffer(&mut self) {
        self.read_buffer.clear();
    }

    pub fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    /// Reads everything immediately available into the client buffer.
    /// Returns `Eof` if the peer closed, `WouldBlock` once drained.
    pub fn read_more(&mut self) -> io::Result<ReadOutcome> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(n) => {
                    self.read_buffer.extend_from_slice(&chunk[..n]);
                    self.touch();
                    if self.read_buffer.len() > MAX_BUFFERED_REQUEST {
                        return Err(io::Error::new(ErrorKind::InvalidData, "request too large"));
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn queue_response(&mut self, bytes: Vec<u8>) {
        self.write_buffer = bytes;
        self.write_pos = 0;
        self.state = ConnState::Writing;
    }

    /// Drains as much of the queued response as the socket will currently
    /// accept. Returns `true` once the whole response has been written.
    pub fn flush(&mut self) -> io::Result<bool> {
        while self.write_pos < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[self.write_pos..]) {
                Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "write returned zero")),
                Ok(n) => {
                    self.write_pos += n;
                    self.touch();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    pub fn set_nonblocking(&self) -> io::Result<()> {
        self.stream.set_nonblocking(true)
    }
}
