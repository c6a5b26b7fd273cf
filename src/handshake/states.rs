//! States for the handshake state machine.
//!
//! This modules is private and restricted to the
//! [`handshake`](crate::handshake) scope. The public interface of the
//! handshake is provided by [`handshake`](crate::handshake).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use log::{debug, info, trace};

use super::events::*;

use crate::{
    error::Stage,
    transport::Transport,
    wire::{Response, NOCK_MAGIC, READY},
    Error,
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// Does the work of the state over `link`, then requests a transition to
    /// a new state by returning the appropriate `event`. The event is consumed
    /// to create the new state through the corresponding [`From`]
    /// implementation.
    fn run<T: Transport + ?Sized>(&mut self, link: &mut T) -> Event;
}

// AwaitingDut State ===========================================================

/// The DUT's bootloader cannot be assumed to be listening when the host
/// starts. In this state the host listens, one byte at a time and for as long
/// as it takes, until the ready byte shows up. Anything else is dropped.
///
///  * **[`DutReadyEvent`] => [`NockingState`]** once the ready byte is read,
///  * **[`FailEvent`] => [`FailedState`]** if the link breaks.
#[derive(Debug)]
pub(crate) struct AwaitingDutState {}
impl Runnable for AwaitingDutState {
    fn run<T: Transport + ?Sized>(&mut self, link: &mut T) -> Event {
        info!("=> AwaitingDut");
        info!("Waiting for DUT...");

        let mut discarded = 0;
        loop {
            match link.receive_byte() {
                Ok(READY) => {
                    info!("DUT found!");
                    return Event::DutReady(DutReadyEvent { discarded });
                }
                Ok(byte) => {
                    trace!("ignoring {:#04x} while waiting for the DUT", byte);
                    discarded += 1;
                }
                Err(e) => return Error::from(e).into(),
            }
        }
    }
}

// Nocking State ===============================================================

/// The host sends the magic exactly once, then waits for the acknowledgment.
///
/// The DUT may keep sending ready bytes for a little while after the magic
/// arrived (buffering on both ends), those are skipped. The first byte that
/// is not a ready byte must be an acknowledgment.
///
///  * **[`AckEvent`] => [`EstablishedState`]** on acknowledgment,
///  * **[`FailEvent`] => [`FailedState`]** on any other byte, or if the link
///    breaks.
#[derive(Debug)]
pub(crate) struct NockingState {
    pub discarded: usize,
}
impl Runnable for NockingState {
    fn run<T: Transport + ?Sized>(&mut self, link: &mut T) -> Event {
        info!("=> Nocking");
        if self.discarded > 0 {
            debug!("{} stray bytes dropped before the DUT was ready", self.discarded);
        }
        info!("Trying to nock...");

        if let Err(e) = link.send(&NOCK_MAGIC) {
            return Error::from(e).into();
        }

        let mut trailing_ready = 0;
        loop {
            match link.receive_byte() {
                Ok(READY) => trailing_ready += 1,
                Ok(byte) => {
                    return match Response::from(byte) {
                        Response::Ack => Event::Ack(AckEvent { trailing_ready }),
                        response => Error::Protocol {
                            stage: Stage::Nock,
                            response,
                        }
                        .into(),
                    };
                }
                Err(e) => return Error::from(e).into(),
            }
        }
    }
}

// Established State ===========================================================

/// Terminal success: the DUT is ready for commands.
#[derive(Debug)]
pub(crate) struct EstablishedState {
    pub trailing_ready: usize,
}

// Failed State ================================================================

/// Terminal failure. There is no way out of it: retrying means running the
/// whole driver again.
#[derive(Debug)]
pub(crate) struct FailedState {
    pub error: Error,
}
