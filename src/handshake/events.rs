//! Events for the handshake state machine.
//!
//! This modules is private and restricted to the
//! [`handshake`](crate::handshake) scope.
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::Error;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// DutReadyEvent ===============================================================

/// Event fired to trigger a transition to [`NockingState`].
///
/// Fired from the [`AwaitingDutState`] once the DUT has sent its ready byte.
///
/// [`NockingState`]: super::states::NockingState
/// [`AwaitingDutState`]: super::states::AwaitingDutState
#[derive(Debug)]
pub(crate) struct DutReadyEvent {
    /// Bytes seen and ignored before the ready byte showed up.
    pub discarded: usize,
}

// AckEvent ====================================================================

/// Event fired when the DUT acknowledged the nock. Triggers the transition to
/// [`EstablishedState`](super::states::EstablishedState).
#[derive(Debug)]
pub(crate) struct AckEvent {
    /// Ready bytes still in flight when the magic was received.
    pub trailing_ready: usize,
}

// FailEvent ===================================================================

/// Event fired from any state when the link breaks or the DUT does not
/// answer the nock with an acknowledgment. Triggers the transition to
/// [`FailedState`](super::states::FailedState).
#[derive(Debug)]
pub(crate) struct FailEvent {
    pub error: Error,
}

// Events enum =================================================================

#[derive(Debug)]
pub(crate) enum Event {
    DutReady(DutReadyEvent),
    Ack(AckEvent),
    Fail(FailEvent),
}
impl From<Error> for Event {
    fn from(error: Error) -> Self {
        Event::Fail(FailEvent { error })
    }
}
