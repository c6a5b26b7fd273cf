//! A transport together with the phase of the BEBE session running over it.

use std::fmt;

use crate::{
    handshake::{self, Start},
    transport::Transport,
    Error,
};

/// Where a [`Link`] stands in the handshake.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Nothing has been sent or received yet.
    Idle,
    AwaitingDut,
    Nocking,
    Established,
    Failed,
}
impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingDut => "awaiting the DUT",
            Phase::Nocking => "nocking",
            Phase::Established => "established",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Exclusive owner of the transport for the lifetime of one driver run.
#[derive(Debug)]
pub struct Link<T> {
    transport: T,
    phase: Phase,
}
impl<T: Transport> Link<T> {
    pub fn new(transport: T) -> Self {
        Link {
            transport,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the handshake. Only an idle link can be established; a failed
    /// link stays failed.
    pub fn establish(&mut self, start: Start) -> Result<(), Error> {
        if self.phase != Phase::Idle {
            return Err(Error::Phase {
                expected: Phase::Idle,
                actual: self.phase,
            });
        }
        handshake::factory(start).run(&mut self.transport, &mut self.phase)
    }

    pub(crate) fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn starts_idle() {
        let link = Link::new(MockTransport::new(b""));
        assert_eq!(link.phase(), Phase::Idle);
    }

    #[test]
    fn establishes_once() {
        let mut link = Link::new(MockTransport::new(b"AY"));
        link.establish(Start::AwaitDut).unwrap();
        assert_eq!(link.phase(), Phase::Established);
        assert!(matches!(
            link.establish(Start::Nock),
            Err(Error::Phase {
                expected: Phase::Idle,
                actual: Phase::Established,
            })
        ));
        assert_eq!(link.into_inner().sent().len(), 1);
    }

    #[test]
    fn failed_link_stays_failed() {
        let mut link = Link::new(MockTransport::new(b"N"));
        assert!(link.establish(Start::Nock).is_err());
        assert_eq!(link.phase(), Phase::Failed);
        assert!(link.establish(Start::Nock).is_err());
        assert_eq!(link.phase(), Phase::Failed);
    }
}
