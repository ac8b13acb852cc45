//! Pure decoding of protocol event logs into affected-user/reserve tuples.
//! Unknown topics are safely ignored; malformed payloads are a logged no-op,
//! never a propagated error — this is a best-effort signal source.

use std::collections::HashMap;

use alloy_primitives::{Address, B256};
use interfaces::DecodedLog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Borrow,
    Repay,
    Supply,
    Withdraw,
    LiquidationCall,
    ReserveDataUpdated,
    AnswerUpdated,
}

/// Maps a log's `topic0` to the event kind it encodes. The real ABI
/// signature hashes are an out-of-scope concern of the protocol-specific
/// collaborator; this registry is populated once at boot.
#[derive(Clone, Debug, Default)]
pub struct TopicRegistry {
    by_topic: HashMap<B256, EventKind>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, topic: B256, kind: EventKind) -> Self {
        self.by_topic.insert(topic, kind);
        self
    }

    pub fn kind_for(&self, topic: &B256) -> Option<EventKind> {
        self.by_topic.get(topic).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffectedUser {
    pub user: Address,
    pub reserve: Option<Address>,
    pub kind: EventKind,
}

/// Decodes a single log. Returns zero tuples for unrecognized topics or logs
/// missing the addresses their kind requires.
pub fn decode(log: &DecodedLog, registry: &TopicRegistry) -> Vec<AffectedUser> {
    let Some(kind) = registry.kind_for(&log.topic0) else {
        return Vec::new();
    };

    match kind {
        EventKind::Borrow
        | EventKind::Repay
        | EventKind::Supply
        | EventKind::Withdraw
        | EventKind::LiquidationCall => {
            let Some(user) = log.user else {
                return Vec::new();
            };
            let mut out = vec![AffectedUser {
                user,
                reserve: log.reserve,
                kind,
            }];
            if let Some(on_behalf_of) = log.on_behalf_of {
                if on_behalf_of != user {
                    out.push(AffectedUser {
                        user: on_behalf_of,
                        reserve: log.reserve,
                        kind,
                    });
                }
            }
            out
        }
        EventKind::ReserveDataUpdated | EventKind::AnswerUpdated => {
            // Market-wide signals carry no specific user; callers fan these
            // out via the Candidate Store's reserve exposure index instead.
            Vec::new()
        }
    }
}
