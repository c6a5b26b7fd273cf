//! An in-memory stand-in for a DUT on the other end of a serial cable.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

/// One logical write from the host, i.e. everything written between two
/// flushes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Sent {
    /// How many scripted bytes the host had consumed when this was flushed.
    pub after_reading: usize,
    pub bytes: Vec<u8>,
}

/// Scripted link: the bytes the DUT "sends" are queued up front and every
/// host write is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    incoming: VecDeque<u8>,
    consumed: usize,
    pending: Vec<u8>,
    sent: Vec<Sent>,
    written: usize,
    read_limit: Option<usize>,
    write_limit: Option<usize>,
    fail_writes_after: Option<usize>,
    stalls: usize,
}
impl MockTransport {
    pub fn new(incoming: impl AsRef<[u8]>) -> Self {
        MockTransport {
            incoming: incoming.as_ref().iter().copied().collect(),
            ..Default::default()
        }
    }

    /// Hand out at most `limit` bytes per read call.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit.max(1));
        self
    }

    /// Accept at most `limit` bytes per write call.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit.max(1));
        self
    }

    /// Time out `count` times before delivering anything.
    pub fn with_stalls(mut self, count: usize) -> Self {
        self.stalls = count;
        self
    }

    /// Break the link once `count` bytes have been written.
    pub fn failing_writes_after(mut self, count: usize) -> Self {
        self.fail_writes_after = Some(count);
        self
    }

    pub fn push_incoming(&mut self, bytes: impl AsRef<[u8]>) {
        self.incoming.extend(bytes.as_ref().iter().copied());
    }

    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    /// Every flushed byte, concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent.iter().flat_map(|s| s.bytes.iter().copied()).collect()
    }

    /// Bytes accepted by the mock, flushed or not.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.incoming.len()
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.stalls > 0 {
            self.stalls -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "nothing yet"));
        }
        let count = buf
            .len()
            .min(self.incoming.len())
            .min(self.read_limit.unwrap_or(usize::MAX));
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..count)) {
            *slot = byte;
        }
        self.consumed += count;
        Ok(count)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut count = buf.len().min(self.write_limit.unwrap_or(usize::MAX));
        if let Some(limit) = self.fail_writes_after {
            if self.written >= limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
            }
            count = count.min(limit - self.written);
        }
        self.pending.extend_from_slice(&buf[..count]);
        self.written += count;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.sent.push(Sent {
                after_reading: self.consumed,
                bytes: std::mem::take(&mut self.pending),
            });
        }
        Ok(())
    }
}
