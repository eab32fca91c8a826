//! Paxos wire messages

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Accepted, Ack, Ballot, Message, MessageKind, Promise};

/// Application value agreed on by the cluster.
pub type Value = i64;

/// Flat wire record for one protocol message.
///
/// Every message has the same shape; which fields matter depends on `kind`:
///
/// | kind    | `ballot`                   | `value`        | flags                     |
/// |---------|----------------------------|----------------|---------------------------|
/// | Prepare | proposed                   | unused         | none                      |
/// | Promise | prior, or promised if rej. | prior value    | `no_prior_acceptance`, `rejected` |
/// | Accept  | proposed                   | proposed value | none                      |
/// | Ack     | promised when rejected     | unused         | `rejected`                |
///
/// Fields a kind does not use are ignored on receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireMessage {
    pub ballot: u64,
    pub value: Value,
    pub kind: MessageKind,
    pub no_prior_acceptance: bool,
    pub rejected: bool,
}

impl WireMessage {
    fn new(kind: MessageKind, ballot: Ballot, value: Value) -> Self {
        Self {
            ballot: ballot.0,
            value,
            kind,
            no_prior_acceptance: false,
            rejected: false,
        }
    }
}

/// A wire record that does not describe any valid message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedMessage {
    pub kind: MessageKind,
    pub reason: &'static str,
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {} message: {}", self.kind, self.reason)
    }
}

impl std::error::Error for MalformedMessage {}

impl From<Message<Value>> for WireMessage {
    fn from(message: Message<Value>) -> Self {
        match message {
            Message::Prepare { ballot } => Self::new(MessageKind::Prepare, ballot, 0),
            Message::Accept { ballot, value } => Self::new(MessageKind::Accept, ballot, value),
            Message::Promise(Promise::Granted { prior: Some(prior) }) => {
                Self::new(MessageKind::Promise, prior.ballot, prior.value)
            }
            Message::Promise(Promise::Granted { prior: None }) => Self {
                no_prior_acceptance: true,
                ..Self::new(MessageKind::Promise, Ballot::default(), 0)
            },
            Message::Promise(Promise::Rejected { promised }) => Self {
                rejected: true,
                ..Self::new(MessageKind::Promise, promised, 0)
            },
            Message::Ack(Ack::Granted) => Self::new(MessageKind::Ack, Ballot::default(), 0),
            Message::Ack(Ack::Rejected { promised }) => Self {
                rejected: true,
                ..Self::new(MessageKind::Ack, promised, 0)
            },
        }
    }
}

impl TryFrom<WireMessage> for Message<Value> {
    type Error = MalformedMessage;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let ballot = Ballot(wire.ballot);
        let malformed = |reason| MalformedMessage {
            kind: wire.kind,
            reason,
        };

        match wire.kind {
            MessageKind::Prepare | MessageKind::Accept if wire.rejected => {
                Err(malformed("requests cannot be rejections"))
            }
            MessageKind::Prepare => Ok(Message::Prepare { ballot }),
            MessageKind::Accept => Ok(Message::Accept {
                ballot,
                value: wire.value,
            }),
            MessageKind::Promise if wire.rejected => {
                Ok(Message::Promise(Promise::Rejected { promised: ballot }))
            }
            MessageKind::Promise if wire.no_prior_acceptance => {
                Ok(Message::Promise(Promise::Granted { prior: None }))
            }
            MessageKind::Promise => Ok(Message::Promise(Promise::Granted {
                prior: Some(Accepted {
                    ballot,
                    value: wire.value,
                }),
            })),
            MessageKind::Ack if wire.rejected => {
                Ok(Message::Ack(Ack::Rejected { promised: ballot }))
            }
            MessageKind::Ack => Ok(Message::Ack(Ack::Granted)),
        }
    }
}
