//! Handshake state machine.
//!
//! The host first waits for the DUT to advertise itself, then "nocks": it
//! sends the magic and waits for the acknowledgment. When the operator
//! already knows the DUT is awake, the machine starts directly at `Nocking`.
//!
//! ```text
//!                     START
//!                       |
//!          AwaitDut     |     Nock
//!         .------------( )------------.
//!         |                           |
//!         v                           |
//!  .-------------.                    |
//!  | AwaitingDut |--- ready byte ---. |
//!  '-------------'                  | |
//!     ^  |                          v v
//!     '--' other byte          .---------.  ready byte
//!                              | Nocking |<-----------.
//!                              '---------'------------'
//!                                 |   |
//!                           ACK   |   | other byte
//!                                 v   v
//!                 .-------------.   .--------.
//!                 | Established |   | Failed |<--- link error (any state)
//!                 '-------------'   '--------'
//! ```

use log::debug;

use super::events::*;
use super::states::*;
use crate::{link::Phase, transport::Transport, Error};

// =============================================================================
// Public Interface
// =============================================================================

/// Where the handshake begins.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Start {
    /// Wait for the DUT's ready byte before nocking.
    AwaitDut,
    /// The DUT is known to be awake, nock right away.
    Nock,
}
impl Start {
    pub fn skipping_wait(skip_wait: bool) -> Self {
        if skip_wait {
            Start::Nock
        } else {
            Start::AwaitDut
        }
    }
}

/// Represents the handshake state machine. Use the `factory()` function to
/// get an instance then run it by calling its `run()` method.
#[derive(Debug)]
pub struct Handshake {
    sm: HandshakeStates,
}
impl Handshake {
    pub fn phase(&self) -> Phase {
        self.sm.phase()
    }

    /// Runs the machine over `link` until it reaches `Established` or
    /// `Failed`, mirroring every phase it goes through into `phase`.
    ///
    /// This blocks for as long as the DUT stays silent.
    pub fn run<T: Transport + ?Sized>(self, link: &mut T, phase: &mut Phase) -> Result<(), Error> {
        let mut sm = self.sm;
        loop {
            *phase = sm.phase();
            sm = match sm.step(link) {
                HandshakeStates::Established(state) => {
                    *phase = Phase::Established;
                    debug!(
                        "{} ready bytes received after the magic",
                        state.trailing_ready
                    );
                    return Ok(());
                }
                HandshakeStates::Failed(state) => {
                    *phase = Phase::Failed;
                    return Err(state.error);
                }
                sm => sm,
            };
        }
    }
}

/// Factory function for the handshake state machine. The starting state is
/// picked here, the transitions do not care how the machine was started.
pub fn factory(start: Start) -> Handshake {
    let sm = match start {
        Start::AwaitDut => HandshakeStates::AwaitingDut(AwaitingDutState {}),
        Start::Nock => HandshakeStates::Nocking(NockingState { discarded: 0 }),
    };
    Handshake { sm }
}

// =============================================================================
// Private stuff
// =============================================================================

#[derive(Debug)]
enum HandshakeStates {
    AwaitingDut(AwaitingDutState),
    Nocking(NockingState),
    Established(EstablishedState),
    Failed(FailedState),
}
impl HandshakeStates {
    fn phase(&self) -> Phase {
        match self {
            HandshakeStates::AwaitingDut(_) => Phase::AwaitingDut,
            HandshakeStates::Nocking(_) => Phase::Nocking,
            HandshakeStates::Established(_) => Phase::Established,
            HandshakeStates::Failed(_) => Phase::Failed,
        }
    }

    /// The unit of work of the machine: run the current state and turn the
    /// event it fires into the next state. Terminal states stay put.
    fn step<T: Transport + ?Sized>(self, link: &mut T) -> Self {
        match self {
            HandshakeStates::AwaitingDut(mut state) => {
                let event = state.run(link);
                match event {
                    Event::DutReady(ev) => HandshakeStates::Nocking(ev.into()),
                    Event::Fail(ev) => HandshakeStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            HandshakeStates::Nocking(mut state) => {
                let event = state.run(link);
                match event {
                    Event::Ack(ev) => HandshakeStates::Established(ev.into()),
                    Event::Fail(ev) => HandshakeStates::Failed(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            terminal => terminal,
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<DutReadyEvent> for NockingState {
    fn from(event: DutReadyEvent) -> NockingState {
        NockingState {
            discarded: event.discarded,
        }
    }
}

impl From<AckEvent> for EstablishedState {
    fn from(event: AckEvent) -> EstablishedState {
        EstablishedState {
            trailing_ready: event.trailing_ready,
        }
    }
}

impl From<FailEvent> for FailedState {
    fn from(event: FailEvent) -> FailedState {
        FailedState { error: event.error }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Stage, transport::MockTransport, wire::Response};

    fn handshake(start: Start, dut: &[u8]) -> (Result<(), Error>, Phase, MockTransport) {
        let mut link = MockTransport::new(dut);
        let mut phase = Phase::Idle;
        let result = factory(start).run(&mut link, &mut phase);
        (result, phase, link)
    }

    #[test]
    fn starting_state_follows_skip_wait() {
        assert_eq!(factory(Start::skipping_wait(false)).phase(), Phase::AwaitingDut);
        assert_eq!(factory(Start::skipping_wait(true)).phase(), Phase::Nocking);
    }

    #[test]
    fn nocks_after_first_ready_byte() {
        let (result, phase, link) = handshake(Start::AwaitDut, b"AAAY");
        assert!(result.is_ok());
        assert_eq!(phase, Phase::Established);
        assert_eq!(link.sent().len(), 1);
        assert_eq!(link.sent()[0].bytes, b"GOBEARS!".to_vec());
        assert_eq!(link.sent()[0].after_reading, 1);
        assert_eq!(link.remaining(), 0);
    }

    #[test]
    fn ignores_noise_before_ready() {
        let (result, phase, link) = handshake(Start::AwaitDut, b"\x00zzN\xffAY");
        assert!(result.is_ok());
        assert_eq!(phase, Phase::Established);
        assert_eq!(link.sent()[0].after_reading, 6);
    }

    #[test]
    fn skip_wait_nocks_immediately() {
        let (result, phase, link) = handshake(Start::Nock, b"Y");
        assert!(result.is_ok());
        assert_eq!(phase, Phase::Established);
        assert_eq!(link.sent()[0].after_reading, 0);
    }

    #[test]
    fn nack_during_nock_fails() {
        let (result, phase, link) = handshake(Start::AwaitDut, b"AAN");
        match result {
            Err(Error::Protocol {
                stage: Stage::Nock,
                response: Response::Nack,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(phase, Phase::Failed);
        assert_eq!(link.sent().len(), 1);
    }

    #[test]
    fn first_non_ready_byte_decides() {
        // Nothing after the offending byte is looked at.
        let (result, phase, link) = handshake(Start::Nock, b"AAxY");
        assert!(matches!(
            result,
            Err(Error::Protocol {
                response: Response::Other(b'x'),
                ..
            })
        ));
        assert_eq!(phase, Phase::Failed);
        assert_eq!(link.remaining(), 1);
    }

    #[test]
    fn established_iff_ready_bytes_then_ack() {
        let cases: &[(&[u8], bool)] = &[
            (b"Y", true),
            (b"AY", true),
            (b"AAAAAAAAY", true),
            (b"N", false),
            (b"AN", false),
            (b"Ax", false),
            (b"\x00", false),
        ];
        for (after_magic, established) in cases {
            let (result, phase, _) = handshake(Start::Nock, after_magic);
            assert_eq!(result.is_ok(), *established, "{:?}", after_magic);
            let expected = if *established {
                Phase::Established
            } else {
                Phase::Failed
            };
            assert_eq!(phase, expected);
        }
    }

    #[test]
    fn link_closing_while_waiting_fails() {
        let (result, phase, link) = handshake(Start::AwaitDut, b"zz");
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(phase, Phase::Failed);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn broken_link_during_nock_fails() {
        let mut link = MockTransport::new(b"AY").failing_writes_after(3);
        let mut phase = Phase::Idle;
        let result = factory(Start::AwaitDut).run(&mut link, &mut phase);
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(phase, Phase::Failed);
    }
}
