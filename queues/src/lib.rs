//! Two-tier priority queue: HotCritical is drained fully before
//! WarmProjected is consulted. Entries are weak references by address —
//! every pop is validated against the Candidate Store before being handed
//! out, since a borrower may have been evicted after admission.

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::Address;
use domain::hf::Hf;
use domain::queue_entry::{EntryReason, PriorityKey, QueueEntry};

#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    pub h_hot: Hf,
    pub h_warm: Hf,
    pub m_hot: usize,
    pub m_warm: usize,
    pub min_debt_base: u128,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            h_hot: Hf::from_f64(1.0012),
            h_warm: Hf::from_f64(1.03),
            m_hot: 1_000,
            m_warm: 1_000,
            min_debt_base: 0,
        }
    }
}

/// A single bounded priority queue, ordered by `PriorityKey`. Internally a
/// `BTreeSet` of `(priority, addr)` gives O(log n) insert/peek-max/pop-min
/// while `entries` holds the full `QueueEntry` for the winning address.
struct BoundedQueue {
    capacity: usize,
    order: BTreeSet<(PriorityKey, Address)>,
    entries: HashMap<Address, QueueEntry>,
}

impl BoundedQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: BTreeSet::new(),
            entries: HashMap::new(),
        }
    }

    /// Returns the evicted address, if the incoming entry displaced one.
    fn admit(&mut self, entry: QueueEntry) -> Option<Address> {
        if let Some(existing) = self.entries.get(&entry.user) {
            self.order.remove(&(existing.priority, entry.user));
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&entry.user) {
            let worst = self.order.iter().next_back().copied();
            match worst {
                Some((worst_priority, worst_addr)) if entry.priority < worst_priority => {
                    self.order.remove(&(worst_priority, worst_addr));
                    self.entries.remove(&worst_addr);
                    evicted = Some(worst_addr);
                }
                _ => return None, // queue full and new entry isn't urgent enough
            }
        }

        self.order.insert((entry.priority, entry.user));
        self.entries.insert(entry.user, entry);
        evicted
    }

    fn pop_valid(&mut self, is_live: &dyn Fn(Address) -> bool) -> Option<QueueEntry> {
        loop {
            let (priority, addr) = self.order.iter().next().copied()?;
            self.order.remove(&(priority, addr));
            let entry = self.entries.remove(&addr)?;
            if is_live(addr) {
                return Some(entry);
            }
            // Stale weak reference: drop and keep looking.
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct PriorityQueues {
    config: QueueConfig,
    hot: BoundedQueue,
    warm: BoundedQueue,
}

impl PriorityQueues {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            hot: BoundedQueue::new(config.m_hot),
            warm: BoundedQueue::new(config.m_warm),
            config,
        }
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    pub fn warm_len(&self) -> usize {
        self.warm.len()
    }

    /// Admits a freshly verified reading. Returns which tier it landed in,
    /// if any, and the address it displaced, if any.
    pub fn admit(
        &mut self,
        user: Address,
        hf: Hf,
        block_number: u64,
        total_debt_base: u128,
        projected_hf: Option<Hf>,
        blocks_until_critical: Option<u64>,
        insertion_counter: u64,
    ) -> Option<(Tier, Option<Address>)> {
        if total_debt_base < self.config.min_debt_base {
            return None;
        }

        let is_critical_projection = projected_hf
            .map(|p| p.is_liquidatable())
            .unwrap_or(false)
            && blocks_until_critical.map(|b| b <= 2).unwrap_or(false);

        if hf <= self.config.h_hot || is_critical_projection {
            let mut entry = QueueEntry::new(
                user,
                hf,
                block_number,
                total_debt_base,
                EntryReason::HfBelowOne,
                insertion_counter,
            );
            entry.projected_hf = projected_hf;
            entry.blocks_until_critical = blocks_until_critical;
            let evicted = self.hot.admit(entry);
            return Some((Tier::Hot, evicted));
        }

        if hf <= self.config.h_warm {
            let entry = QueueEntry::new(
                user,
                hf,
                block_number,
                total_debt_base,
                EntryReason::ProjectedCritical,
                insertion_counter,
            );
            let evicted = self.warm.admit(entry);
            return Some((Tier::Warm, evicted));
        }

        None
    }

    /// Pops HotCritical first; only consults WarmProjected once Hot is
    /// drained. `is_live` validates the weak reference against whatever
    /// owns ground truth (the Candidate Store).
    pub fn pop(&mut self, is_live: &dyn Fn(Address) -> bool) -> Option<QueueEntry> {
        self.hot
            .pop_valid(is_live)
            .or_else(|| self.warm.pop_valid(is_live))
    }

    /// Pops from HotCritical only, never falling back to WarmProjected.
    /// Used to exhaust the hot tier before spending any worker-pool budget
    /// on warm entries.
    pub fn pop_hot_only(&mut self, is_live: &dyn Fn(Address) -> bool) -> Option<QueueEntry> {
        self.hot.pop_valid(is_live)
    }

    /// Pops from WarmProjected only. Called once HotCritical is drained and
    /// worker-pool budget remains for the block.
    pub fn pop_warm_only(&mut self, is_live: &dyn Fn(Address) -> bool) -> Option<QueueEntry> {
        self.warm.pop_valid(is_live)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
}
