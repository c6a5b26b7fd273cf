//! Commands sent to the bootloader once the handshake is done.
//!
//! The protocol is strictly request then response: a frame is sent, and the
//! session blocks on its answer before anything else goes out. Writes and
//! jumps are answered with one acknowledgment byte, reads with the requested
//! memory content.
//!
//! Large writes are split into chunks of at most [`MAX_CHUNK`] bytes, each
//! framed and acknowledged on its own. The session keeps a cursor into the
//! DUT's memory which starts at the requested address and moves forward with
//! every acknowledged chunk. Reads and jumps use the cursor but leave it
//! alone, and so do immediate writes.

use std::{
    convert::TryFrom,
    fmt,
    fs::File,
    io::Read,
    path::Path,
};

use hexplay::HexViewBuilder;
use indicatif::ProgressBar;
use log::{debug, error, info, log_enabled, trace, warn, Level::Trace};

use crate::{
    error::{ErrorKind, Stage},
    link::{Link, Phase},
    settings::Operations,
    transport::Transport,
    wire::{immediate_payload, Frame, Response, MAX_CHUNK},
    Error,
};

// =============================================================================
// Public Interface
// =============================================================================

/// What a successful write covered.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WriteSummary {
    pub start: u64,
    pub chunks: usize,
    pub bytes: u64,
}
impl WriteSummary {
    /// First address past the written data, `None` when the data ends on the
    /// last byte of the address space.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.bytes)
    }
}

/// The operations `Session::execute` knows about, in execution order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    WriteSource,
    WriteImmediate,
    Read,
    Jump,
}
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::WriteSource => f.write_str("write"),
            Operation::WriteImmediate => f.write_str("immediate write"),
            Operation::Read => f.write_str("read"),
            Operation::Jump => f.write_str("jump"),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Written(WriteSummary),
    Read { address: u64, data: Vec<u8> },
    Jumped(u64),
    /// Rejected before anything was sent.
    Skipped(Error),
    Failed(Error),
}

/// The outcome of every operation that was attempted, in order.
#[derive(Debug, Default)]
pub struct Report {
    pub entries: Vec<(Operation, Outcome)>,
}
impl Report {
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    pub fn failure(&self) -> Option<&Error> {
        self.entries.iter().find_map(|(_, outcome)| match outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn exit_code(&self) -> i8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Records the result of `operation` and tells whether the next one may
    /// run.
    fn record(&mut self, operation: Operation, result: Result<Outcome, Error>) -> bool {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.kind() == ErrorKind::Usage => {
                warn!("{} skipped: {}", operation, e);
                Outcome::Skipped(e)
            }
            Err(e) => {
                error!("{} failed: {}", operation, e);
                Outcome::Failed(e)
            }
        };
        let proceed = !matches!(outcome, Outcome::Failed(_));
        self.entries.push((operation, outcome));
        proceed
    }
}

/// Runs commands over an established [`Link`].
pub struct Session<'a, T> {
    link: &'a mut Link<T>,
    /// `None` once a write reached the top of the address space.
    cursor: Option<u64>,
    chunk_size: usize,
    progress: ProgressBar,
}
impl<'a, T: Transport> Session<'a, T> {
    /// Opens a session at `address`. The link must be established.
    pub fn new(link: &'a mut Link<T>, address: u64) -> Result<Self, Error> {
        if link.phase() != Phase::Established {
            return Err(Error::Phase {
                expected: Phase::Established,
                actual: link.phase(),
            });
        }
        Ok(Session {
            link,
            cursor: Some(address),
            chunk_size: MAX_CHUNK,
            progress: ProgressBar::hidden(),
        })
    }

    /// Lowers the largest payload sent in one frame. Clamped to
    /// `1..=MAX_CHUNK`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK);
        self
    }

    /// Progress bar advanced as file writes are acknowledged.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// The current address, `None` after a write ending on the last byte of
    /// the address space.
    pub fn address(&self) -> Option<u64> {
        self.cursor
    }

    /// Runs the requested operations in their fixed order: write from file,
    /// immediate write, read, jump.
    ///
    /// A rejected operation is skipped and the next one runs. A failed one
    /// stops everything: chunks acknowledged so far stay written on the DUT.
    pub fn execute(&mut self, operations: &Operations) -> Report {
        let mut report = Report::default();

        if let Some(path) = &operations.write_file {
            let result = self.write_file(path).map(Outcome::Written);
            if !report.record(Operation::WriteSource, result) {
                return report;
            }
        }

        if let Some(immediate) = operations.write_value {
            let result = self
                .write_immediate(immediate.value, immediate.length)
                .map(Outcome::Written);
            if !report.record(Operation::WriteImmediate, result) {
                return report;
            }
        }

        if let Some(length) = operations.read_length {
            let result = self.position().and_then(|address| {
                let data = self.read(length)?;
                Ok(Outcome::Read { address, data })
            });
            if !report.record(Operation::Read, result) {
                return report;
            }
        }

        if operations.jump {
            let result = self.jump().map(Outcome::Jumped);
            report.record(Operation::Jump, result);
        }

        report
    }

    /// Writes the whole content of the file at `path`.
    pub fn write_file(&mut self, path: &Path) -> Result<WriteSummary, Error> {
        let file = File::open(path).map_err(|source| Error::Source {
            path: path.to_owned(),
            source,
        })?;
        if let Ok(metadata) = file.metadata() {
            // A file that cannot fit is refused before the first chunk.
            let length = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
            next_address(self.position()?, length)?;
            self.progress.set_length(metadata.len());
        }
        self.progress.set_position(0);

        match self.write_from(file) {
            Ok(summary) => {
                self.progress.finish_with_message("done");
                Ok(summary)
            }
            Err(e) => {
                self.progress.abandon();
                Err(e)
            }
        }
    }

    /// Writes everything `source` yields, one chunk at a time, each chunk
    /// acknowledged before the next one is read.
    ///
    /// An unexpected response aborts the remaining chunks. The ones already
    /// acknowledged are not rolled back and the cursor stays past them. A
    /// chunk that would not fit below the top of the address space is refused
    /// as [`Error::PartialWrite`] when earlier chunks already went out.
    pub fn write_from<R: Read>(&mut self, mut source: R) -> Result<WriteSummary, Error> {
        let mut summary = WriteSummary {
            start: self.position()?,
            chunks: 0,
            bytes: 0,
        };
        let mut chunk = Vec::with_capacity(self.chunk_size);

        loop {
            chunk.clear();
            source
                .by_ref()
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .map_err(Error::Input)?;
            if chunk.is_empty() {
                break;
            }

            let (address, next) = match self
                .position()
                .and_then(|address| Ok((address, next_address(address, chunk.len())?)))
            {
                Ok(span) => span,
                Err(e) if summary.chunks > 0 => {
                    return Err(Error::PartialWrite {
                        written: summary.bytes,
                        source: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            };
            info!("write {:#x}, len {}...", address, chunk.len());
            self.transmit(&Frame::write_payload(address, &chunk)?)?;
            self.expect_ack(Stage::Write)?;

            self.cursor = next;
            summary.chunks += 1;
            summary.bytes += chunk.len() as u64;
            self.progress.inc(chunk.len() as u64);
        }

        info!("OK");
        Ok(summary)
    }

    /// Writes the `length` low-order bytes of `value` at the cursor, without
    /// moving it. Nothing is sent unless `length` is within 1 to 8.
    pub fn write_immediate(&mut self, value: u64, length: usize) -> Result<WriteSummary, Error> {
        let payload = immediate_payload(value, length)?;
        let address = self.position()?;
        next_address(address, length)?;

        info!("write {:#x}={:#x}, len {}...", address, value, length);
        self.transmit(&Frame::write_payload(address, &payload)?)?;
        self.expect_ack(Stage::Write)?;
        info!("OK");

        Ok(WriteSummary {
            start: address,
            chunks: 1,
            bytes: length as u64,
        })
    }

    /// Reads `length` bytes at the cursor. There is no acknowledgment, the
    /// data is the answer.
    pub fn read(&mut self, length: u32) -> Result<Vec<u8>, Error> {
        let address = self.position()?;
        info!("read {:#x}, len {}...", address, length);
        self.transmit(&Frame::read(length, address))?;

        let count = usize::try_from(length).map_err(|_| Error::PayloadTooLarge(usize::MAX))?;
        let data = self.link.transport().receive(count)?;
        debug!("{} bytes read", data.len());
        Ok(data)
    }

    /// Makes the DUT jump to the cursor. Returns the address jumped to.
    pub fn jump(&mut self) -> Result<u64, Error> {
        let address = self.position()?;
        info!("jump {:#x}...", address);
        self.transmit(&Frame::jump(address))?;
        self.expect_ack(Stage::Jump)?;
        info!("OK");
        Ok(address)
    }

    fn transmit(&mut self, frame: &Frame<'_>) -> Result<(), Error> {
        let bytes = frame.encode();
        debug!(
            "sending {:?} frame, {} payload bytes",
            frame.tag(),
            frame.payload().len()
        );
        if log_enabled!(Trace) {
            let view = HexViewBuilder::new(&bytes)
                .address_offset(0)
                .row_width(16)
                .finish();
            trace!("\n{}", view);
        }
        self.link.transport().send(&bytes)?;
        Ok(())
    }

    fn position(&self) -> Result<u64, Error> {
        self.cursor.ok_or(Error::EndOfAddressSpace)
    }

    fn expect_ack(&mut self, stage: Stage) -> Result<(), Error> {
        let byte = self.link.transport().receive_byte()?;
        match Response::from(byte) {
            Response::Ack => Ok(()),
            response => Err(Error::Protocol { stage, response }),
        }
    }
}

/// First address past `length` bytes written at `address`, `None` when they
/// end on the last byte of the address space. Fails if they do not fit.
fn next_address(address: u64, length: usize) -> Result<Option<u64>, Error> {
    if length == 0 {
        return Ok(Some(address));
    }
    let last = u64::try_from(length - 1)
        .ok()
        .and_then(|span| address.checked_add(span))
        .ok_or(Error::AddressOverflow { address, length })?;
    Ok(last.checked_add(1))
}

// =============================================================================
// Unit Tests
// =============================================================================
