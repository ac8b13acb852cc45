use alloy_primitives::Address;

use crate::hf::Hf;

/// Why a borrower was admitted to a priority queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryReason {
    HfBelowOne,
    ProjectedCritical,
    ManualRequeue,
}

/// Lexicographic priority key: lower HF bucket first, then higher debt first,
/// then earlier insertion first. `Ord` is derived directly off field order,
/// so queue entries sort exactly per the invariant this type exists to
/// enforce — callers never hand-roll a comparator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    hf_bucket: i128,
    neg_debt_base: i128,
    insertion_counter: u64,
}

impl PriorityKey {
    pub fn new(hf: Hf, debt_base: u128, insertion_counter: u64) -> Self {
        Self {
            hf_bucket: hf.priority_bucket(),
            neg_debt_base: -(debt_base as i128),
            insertion_counter,
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub user: Address,
    pub hf: Hf,
    pub block_number: u64,
    pub total_debt_base: u128,
    pub projected_hf: Option<Hf>,
    pub blocks_until_critical: Option<u64>,
    pub entry_reason: EntryReason,
    pub priority: PriorityKey,
}

impl QueueEntry {
    pub fn new(
        user: Address,
        hf: Hf,
        block_number: u64,
        total_debt_base: u128,
        entry_reason: EntryReason,
        insertion_counter: u64,
    ) -> Self {
        Self {
            user,
            hf,
            block_number,
            total_debt_base,
            projected_hf: None,
            blocks_until_critical: None,
            entry_reason,
            priority: PriorityKey::new(hf, total_debt_base, insertion_counter),
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority)
    }
}
