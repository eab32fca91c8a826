//! Shared acceptor state implementation

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::core::{Accepted, AcceptorCore, Ballot, Message, ProtocolViolation};
use crate::messages::Value;

/// In-memory acceptor state shared by every connection to one acceptor.
///
/// Uses [`AcceptorCore`] for the state machine and serializes handler calls
/// through a mutex, so requests arriving on different connections are applied
/// one at a time.
#[derive(Clone, Debug, Default)]
pub struct SharedAcceptorState {
    core: Arc<Mutex<AcceptorCore<Value>>>,
}

impl SharedAcceptorState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a value already accepted under `ballot`.
    #[must_use]
    pub fn with_accepted(ballot: Ballot, value: Value) -> Self {
        let core = AcceptorCore {
            highest_seen: Some(ballot),
            accepted: Some(Accepted { ballot, value }),
        };
        Self {
            core: Arc::new(Mutex::new(core)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AcceptorCore<Value>> {
        // Core transitions cannot panic midway, so a poisoned lock still holds valid state.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one request and produce the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation`] when `request` is a response kind.
    pub fn handle(&self, request: Message<Value>) -> Result<Message<Value>, ProtocolViolation> {
        let mut core = self.lock();
        let response = core.handle_request(request)?;
        trace!(?request, ?response, highest_seen = ?core.highest_seen(), "handled");
        Ok(response)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AcceptorCore<Value> {
        self.lock().clone()
    }
}
