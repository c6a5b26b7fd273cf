//! Host side of the BEBE bootloader protocol.
//!
//! BEBE is a tiny bootloader used to bring up boards before their own
//! firmware runs. It listens on a serial line and lets the host read and
//! write the device's memory and jump to an address. This crate drives it
//! from the host: wake the device-under-test (DUT), greet it, then run the
//! requested operations.
//!
//! The layers, leaves first:
//!
//! * [`wire`]: byte layouts of commands and markers, no I/O,
//! * [`transport`]: the byte pipe, any [`Read`](std::io::Read) +
//!   [`Write`](std::io::Write) will do,
//! * [`handshake`]: the state machine taking the link from "unknown" to
//!   established,
//! * [`Session`]: reads, chunked writes and jumps over an established
//!   [`Link`],
//! * [`run`]: opens the port and puts everything together.
//!
//! The handshake is implemented as a state machine with the following
//! characteristics:
//!
//! * It can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Transitions between states are triggered via typed **events** and
//!   follow defined semantics.
//! * Transitioning from one state to another consumes the original state.
//! * Data is transferred from one state to the next by attaching it to the
//!   transition event.
//!
//! The implementation of state transitions leverages `rust`'s `From` and
//! `Into` pattern: only transitions for which `From<Event> for State` is
//! implemented are possible, anything else is rejected at compile-time.
//!
//! The protocol is strictly synchronous: one request, then block on its
//! answer. Nothing in it times out; a DUT that never shows up is waited for
//! until the operator gives up.

mod driver;
mod error;
pub mod handshake;
mod link;
mod session;
mod settings;
pub mod transport;
mod utils;
pub mod wire;

pub use driver::{run, run_on};
pub use error::{Error, ErrorKind, Stage};
pub use link::{Link, Phase};
pub use session::{Operation, Outcome, Report, Session, WriteSummary};
pub use settings::{
    parse_count, parse_hex_u64, parse_read_length, DataBits, FlowControl, Immediate, Operations,
    Parity, Settings, SettingsBuilder, StopBits,
};
