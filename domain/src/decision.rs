use alloy_primitives::{Address, B256};

/// Outcome recorded for a single execution attempt, appended to the
/// per-user ring buffer the Miss Classifier and operators both read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionKind {
    Attempt,
    Skip,
    Revert,
}

#[derive(Clone, Debug)]
pub struct ExecutionDecision {
    pub user: Address,
    pub timestamp_ms: u64,
    pub block_number: u64,
    pub kind: DecisionKind,
    pub reason: Option<String>,
    pub gas_price_gwei: Option<f64>,
    pub profit_estimate_usd: Option<f64>,
    pub tx_hash: Option<B256>,
}

impl ExecutionDecision {
    pub fn skip(user: Address, timestamp_ms: u64, block_number: u64, reason: impl Into<String>) -> Self {
        Self {
            user,
            timestamp_ms,
            block_number,
            kind: DecisionKind::Skip,
            reason: Some(reason.into()),
            gas_price_gwei: None,
            profit_estimate_usd: None,
            tx_hash: None,
        }
    }
}

/// Fixed-capacity, insertion-order ring buffer of the last N execution
/// decisions across every watched user (§6: a single global ring, not one
/// per borrower), oldest overwritten first.
#[derive(Clone, Debug)]
pub struct DecisionHistory {
    entries: std::collections::VecDeque<ExecutionDecision>,
    capacity: usize,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: std::collections::VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, decision: ExecutionDecision) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(decision);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ExecutionDecision> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry older than `ttl_ms` relative to `now_ms`, oldest
    /// first. The ring's capacity bound alone doesn't retire stale evidence
    /// during a quiet period with few new decisions; this is the per-block
    /// cleanup pass's TTL half of that bound.
    pub fn expire(&mut self, now_ms: u64, ttl_ms: u64) {
        while let Some(front) = self.entries.front() {
            if now_ms.saturating_sub(front.timestamp_ms) > ttl_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
