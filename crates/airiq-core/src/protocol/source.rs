//! Byte sources
//!
//! A [`ByteSource`] is the only thing the decoders know about the transport.
//! Reads are bounded by a timeout and may come back short; that is how a
//! stalled or silent sensor shows up to the frame layer.

use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Abstraction over a serial transport
pub trait ByteSource: Send {
    /// Read up to `n` bytes, giving up when `timeout` elapses.
    ///
    /// A short (possibly empty) result means the timeout expired; it is not an
    /// error. Errors are reserved for the link itself failing.
    fn read_bytes(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Write a complete command buffer
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard anything already received but not yet read
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing [`ByteSource`]
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    baud_rate: u32,
}

impl SerialChannel {
    /// Wrap an open, configured port
    pub fn new(port: Box<dyn SerialPort>, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }

    /// Name of the underlying device, if the driver reports one
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    /// Time the UART needs to shift `len` bytes out at 8N1 framing
    fn transmit_time(&self, len: usize) -> Duration {
        let baud = if self.baud_rate == 0 {
            tracing::warn!("baud rate is 0, assuming 9600 for transmit timing");
            9600
        } else {
            self.baud_rate
        };
        // 10 bits per byte: start + 8 data + stop
        let bits = (len * 10) as u64;
        Duration::from_micros(bits * 1_000_000 / baud as u64)
    }
}

impl ByteSource for SerialChannel {
    fn read_bytes(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        let deadline = Instant::now() + timeout;

        while filled < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port
                .set_timeout(remaining)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        // flush() ends in tcdrain, which can block indefinitely on some USB
        // adapters; wait out the transmit time instead.
        self.port.write_all(data)?;
        let wait = self.transmit_time(data.len()) + Duration::from_millis(5);
        tracing::trace!(
            bytes = data.len(),
            wait_ms = wait.as_millis() as u64,
            "wrote command"
        );
        std::thread::sleep(wait);
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// In-memory byte source.
///
/// Serves a preloaded receive stream, optionally appending a scripted reply
/// every time a command is written. Reads never block: when the stream runs
/// dry they return short, exactly like a serial read hitting its timeout.
#[derive(Debug, Default)]
pub struct MockSource {
    rx: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    failure: Option<io::ErrorKind>,
}

impl MockSource {
    /// Empty source; every read comes back short
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose receive stream starts with `bytes`
    pub fn with_stream(bytes: impl AsRef<[u8]>) -> Self {
        let mut source = Self::new();
        source.push_stream(bytes);
        source
    }

    /// Append bytes to the receive stream
    pub fn push_stream(&mut self, bytes: impl AsRef<[u8]>) {
        self.rx.extend(bytes.as_ref().iter().copied());
    }

    /// Queue a reply delivered after the next write
    pub fn push_reply(&mut self, reply: impl Into<Vec<u8>>) {
        self.replies.push_back(reply.into());
    }

    /// Make every subsequent read fail with `kind`
    pub fn fail_reads(&mut self, kind: io::ErrorKind) {
        self.failure = Some(kind);
    }

    /// Everything written to the source so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Bytes still waiting to be read
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl ByteSource for MockSource {
    fn read_bytes(&mut self, n: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
        if let Some(kind) = self.failure {
            return Err(io::Error::new(kind, "mock read failure"));
        }
        let count = n.min(self.rx.len());
        Ok(self.rx.drain(..count).collect())
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(data);
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }
}
