//! The "wake and greet" handshake with the BEBE bootloader.
//!
//! **Example** - Establishing a session over an already opened port:
//! ```ignore
//! use crate::handshake::{self, Start};
//!
//! let mut phase = Phase::Idle;
//! handshake::factory(Start::AwaitDut).run(&mut port, &mut phase)?;
//! assert_eq!(phase, Phase::Established);
//! ```
//!
//! Most callers go through [`Link::establish`](crate::Link::establish),
//! which keeps track of the phase for them.

mod events;
mod state_machine;
mod states;

pub use state_machine::{factory, Handshake, Start};
