//! The byte pipe between the host and the DUT.
//!
//! The protocol needs only two primitives from the link: send all of these
//! bytes, and block until exactly `n` bytes came back. Anything implementing
//! [`Read`] and [`Write`] provides them, in particular the boxed
//! [`SerialPort`](serialport::SerialPort) returned when opening a device and
//! the in-memory [`MockTransport`] used by tests.
//!
//! Serial ports are opened with a short read timeout. A timeout only means
//! the DUT has not said anything yet: reads and writes simply try again,
//! which leaves cancellation to the operator.

use std::{
    io::{self, Read, Write},
    thread,
    time::Duration,
};

use log::trace;

mod mock;

pub use mock::{MockTransport, Sent};

/// Reliable, ordered byte duplex.
pub trait Transport {
    /// Sends every byte of `bytes` or fails.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Blocks until exactly `count` bytes have been received.
    fn receive(&mut self, count: usize) -> io::Result<Vec<u8>>;

    fn receive_byte(&mut self) -> io::Result<u8> {
        self.receive(1)?
            .first()
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no byte received"))
    }
}

impl<P: Read + Write + ?Sized> Transport for P {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            match self.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "link stopped accepting bytes",
                    ))
                }
                Ok(count) => {
                    trace!("{} bytes written to the link", count);
                    written += count;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(e),
            }
        }
        self.flush()
    }

    fn receive(&mut self, count: usize) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; count];
        let mut filled = 0;
        while filled < count {
            match self.read(&mut buffer[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("link closed after {} of {} bytes", filled, count),
                    ))
                }
                Ok(received) => {
                    trace!("{} bytes read from the link", received);
                    filled += received;
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(buffer)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn receive_assembles_fragmented_reads() {
    let mut link = MockTransport::new((0..16).collect::<Vec<u8>>()).with_read_limit(3);
    let data = link.receive(16).unwrap();
    assert_eq!(data, (0..16).collect::<Vec<u8>>());
    assert_eq!(link.consumed(), 16);
}

#[test]
fn receive_waits_through_timeouts() {
    let mut link = MockTransport::new(b"AY").with_stalls(5);
    assert_eq!(link.receive_byte().unwrap(), b'A');
    assert_eq!(link.receive_byte().unwrap(), b'Y');
}

#[test]
fn receive_fails_when_link_closes() {
    let mut link = MockTransport::new(b"abc");
    let err = link.receive(4).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn send_completes_partial_writes() {
    let mut link = MockTransport::new(b"").with_write_limit(2);
    link.send(b"GOBEARS!").unwrap();
    assert_eq!(link.sent_bytes(), b"GOBEARS!".to_vec());
    assert_eq!(link.sent().len(), 1);
}

#[test]
fn send_reports_broken_link() {
    let mut link = MockTransport::new(b"").failing_writes_after(4);
    let err = link.send(b"GOBEARS!").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}
