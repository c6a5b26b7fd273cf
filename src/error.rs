//! Errors raised while talking to the BEBE bootloader.
//!
//! Every failure falls in one of three classes, see [`ErrorKind`]:
//!
//! * **transport** failures come from the serial link (or the file being
//!   pushed) and abort the whole invocation,
//! * **protocol** violations happen when the DUT answers with anything but an
//!   acknowledgment where one is expected, or when a chunked write has to
//!   stop after part of it reached the DUT,
//! * **usage** errors are detected before a single byte is sent.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::{link::Phase, wire::Response};

/// The protocol step during which the DUT answered unexpectedly.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    Nock,
    Write,
    Jump,
}
impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Nock => f.write_str("nock"),
            Stage::Write => f.write_str("write"),
            Stage::Jump => f.write_str("jump"),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Usage,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The link failed to carry bytes in either direction.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The data source of a chunked write could not be opened.
    #[error("cannot open `{}`: {source}", .path.display())]
    Source { path: PathBuf, source: io::Error },

    /// Reading the data to write failed midway.
    #[error("cannot read the data to write: {0}")]
    Input(io::Error),

    /// The DUT did not acknowledge.
    #[error("unexpected response {response} from DUT during {stage}")]
    Protocol { stage: Stage, response: Response },

    #[error("immediate write length {0} is not allowed, use 1 to 8 bytes or write from a file")]
    ImmediateLength(usize),

    #[error("payload of {actual} bytes does not match the declared length {declared}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("payload of {0} bytes does not fit the 32-bit length field")]
    PayloadTooLarge(usize),

    #[error("writing {length} bytes at {address:#x} runs past the end of the address space")]
    AddressOverflow { address: u64, length: usize },

    /// Earlier writes ended on the last byte of memory, there is no address
    /// left to use.
    #[error("the address space is exhausted")]
    EndOfAddressSpace,

    /// A chunked write was cut short after `written` bytes were acknowledged.
    #[error("write stopped after {written} acknowledged bytes: {source}")]
    PartialWrite { written: u64, source: Box<Error> },

    #[error("link is {actual}, expected {expected}")]
    Phase { expected: Phase, actual: Phase },

    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::Serial(_) | Error::Source { .. } | Error::Input(_) => {
                ErrorKind::Transport
            }
            Error::Protocol { .. } | Error::PartialWrite { .. } => ErrorKind::Protocol,
            Error::ImmediateLength(_)
            | Error::LengthMismatch { .. }
            | Error::PayloadTooLarge(_)
            | Error::AddressOverflow { .. }
            | Error::EndOfAddressSpace
            | Error::Phase { .. }
            | Error::InvalidNumber(_) => ErrorKind::Usage,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn classifies_errors() {
    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "closed");
    assert_eq!(Error::from(eof).kind(), ErrorKind::Transport);
    assert_eq!(
        Error::Protocol {
            stage: Stage::Jump,
            response: Response::Nack,
        }
        .kind(),
        ErrorKind::Protocol
    );
    assert_eq!(Error::ImmediateLength(9).kind(), ErrorKind::Usage);

    let overflow = Error::AddressOverflow {
        address: u64::MAX,
        length: 4,
    };
    assert_eq!(overflow.kind(), ErrorKind::Usage);
    let partial = Error::PartialWrite {
        written: 4,
        source: Box::new(overflow),
    };
    assert_eq!(partial.kind(), ErrorKind::Protocol);
}

#[test]
fn protocol_error_message() {
    let err = Error::Protocol {
        stage: Stage::Write,
        response: Response::Other(0x00),
    };
    assert_eq!(
        err.to_string(),
        "unexpected response 0x00 from DUT during write"
    );
}
