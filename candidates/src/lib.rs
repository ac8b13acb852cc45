//! Bounded `addr -> Borrower` map with capacity `N_cand`, grounded on the
//! teacher's session cache: same bounded-map-plus-eviction-key shape,
//! generalized from sessions to at-risk borrowers.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use domain::borrower::Borrower;
use parking_lot::RwLock;

/// Per-reserve exposure index is bounded: reads tolerate false negatives
/// (an exposed borrower dropped from the index) but never false positives.
const MAX_BORROWERS_PER_RESERVE: usize = 512;

struct Inner {
    borrowers: HashMap<Address, Borrower>,
    reserve_index: HashMap<Address, HashSet<Address>>,
}

pub struct CandidateStore {
    capacity: usize,
    reserve_cap_per_borrower: usize,
    inner: RwLock<Inner>,
}

impl CandidateStore {
    pub fn new(capacity: usize, reserve_cap_per_borrower: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            reserve_cap_per_borrower,
            inner: RwLock::new(Inner {
                borrowers: HashMap::new(),
                reserve_index: HashMap::new(),
            }),
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.inner.read().borrowers.contains_key(&addr)
    }

    pub fn len(&self) -> usize {
        self.inner.read().borrowers.len()
    }

    pub fn get(&self, addr: Address) -> Option<Borrower> {
        self.inner.read().borrowers.get(&addr).cloned()
    }

    /// Inserts (or returns the existing) borrower, evicting per §4.4 if the
    /// store is full and `addr` is not already present. `protected` names
    /// addresses that must never be evicted because they are currently
    /// referenced by a non-Idle executor state machine (invariant 8).
    pub fn insert_if_absent(
        &self,
        addr: Address,
        protected: &HashSet<Address>,
    ) -> Option<Address> {
        let mut inner = self.inner.write();
        if inner.borrowers.contains_key(&addr) {
            return None;
        }

        if inner.borrowers.len() >= self.capacity {
            let evicted = Self::evict_one(&mut inner, protected);
            if evicted.is_none() {
                // Every occupant is protected by an active state machine;
                // refuse the insertion rather than exceed capacity.
                return None;
            }
            inner
                .borrowers
                .insert(addr, Borrower::new(addr, self.reserve_cap_per_borrower));
            return evicted;
        }

        inner
            .borrowers
            .insert(addr, Borrower::new(addr, self.reserve_cap_per_borrower));
        None
    }

    fn evict_one(inner: &mut Inner, protected: &HashSet<Address>) -> Option<Address> {
        let victim = inner
            .borrowers
            .iter()
            .filter(|(addr, _)| !protected.contains(*addr))
            .max_by_key(|(_, b)| b.eviction_key())
            .map(|(addr, _)| *addr)?;

        if let Some(b) = inner.borrowers.remove(&victim) {
            for reserve in b.reserves() {
                if let Some(set) = inner.reserve_index.get_mut(reserve) {
                    set.remove(&victim);
                }
            }
        }
        Some(victim)
    }

    pub fn with_mut<R>(&self, addr: Address, f: impl FnOnce(&mut Borrower) -> R) -> Option<R> {
        let mut inner = self.inner.write();
        inner.borrowers.get_mut(&addr).map(f)
    }

    /// Unconditional removal, used on a terminal on-chain revert during
    /// verification (§7: evicted from the Candidate Store).
    pub fn remove(&self, addr: Address) -> Option<Borrower> {
        let mut inner = self.inner.write();
        let removed = inner.borrowers.remove(&addr)?;
        for reserve in removed.reserves() {
            if let Some(set) = inner.reserve_index.get_mut(reserve) {
                set.remove(&addr);
            }
        }
        Some(removed)
    }

    /// Clears `firstSeenLiquidatableBlock` for any borrower whose marker
    /// predates `current_block` by more than `horizon_blocks` (`K_first`).
    pub fn prune_stale_first_seen(&self, current_block: u64, horizon_blocks: u64) {
        let mut inner = self.inner.write();
        for borrower in inner.borrowers.values_mut() {
            if let Some(seen) = borrower.first_seen_liquidatable_block {
                if current_block.saturating_sub(seen) > horizon_blocks {
                    borrower.first_seen_liquidatable_block = None;
                }
            }
        }
    }

    /// Records that `addr` is exposed to `reserve`, keeping the inverted
    /// index in sync. Eviction of the borrower's own reserve LRU is handled
    /// inside `Borrower::touch_reserve`.
    pub fn touch_reserve(&self, addr: Address, reserve: Address) {
        let mut inner = self.inner.write();
        let Some(borrower) = inner.borrowers.get_mut(&addr) else {
            return;
        };
        borrower.touch_reserve(reserve);

        let set = inner.reserve_index.entry(reserve).or_default();
        if set.len() < MAX_BORROWERS_PER_RESERVE || set.contains(&addr) {
            set.insert(addr);
        }
    }

    /// Users currently known to be exposed to `reserve`. Lossy: may miss
    /// borrowers evicted from the per-reserve cap, never fabricates one.
    pub fn exposed_to(&self, reserve: Address) -> Vec<Address> {
        self.inner
            .read()
            .reserve_index
            .get(&reserve)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    #[test]
    fn insert_under_capacity_never_evicts() {
        let store = CandidateStore::new(2, 5);
        assert!(store.insert_if_absent(addr(1), &HashSet::new()).is_none());
        assert!(store.insert_if_absent(addr(2), &HashSet::new()).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn insert_at_capacity_evicts_highest_hf() {
        let store = CandidateStore::new(2, 5);
        store.insert_if_absent(addr(1), &HashSet::new());
        store.insert_if_absent(addr(2), &HashSet::new());

        store.with_mut(addr(1), |b| {
            b.apply_verified_hf(domain::hf::Hf::from_f64(0.8), 1, 100)
        });
        store.with_mut(addr(2), |b| {
            b.apply_verified_hf(domain::hf::Hf::from_f64(1.5), 1, 100)
        });

        let evicted = store.insert_if_absent(addr(3), &HashSet::new());
        assert_eq!(evicted, Some(addr(2)));
        assert!(store.contains(addr(1)));
        assert!(store.contains(addr(3)));
    }

    #[test]
    fn protected_addresses_are_never_evicted() {
        let store = CandidateStore::new(1, 5);
        store.insert_if_absent(addr(1), &HashSet::new());

        let mut protected = HashSet::new();
        protected.insert(addr(1));

        let evicted = store.insert_if_absent(addr(2), &protected);
        assert_eq!(evicted, None, "store stays over capacity rather than evict a protected user");
        assert!(store.contains(addr(1)));
        assert!(!store.contains(addr(2)));
    }

    #[test]
    fn touch_reserve_updates_inverted_index() {
        let store = CandidateStore::new(2, 5);
        store.insert_if_absent(addr(1), &HashSet::new());
        store.touch_reserve(addr(1), addr(100));

        assert_eq!(store.exposed_to(addr(100)), vec![addr(1)]);
    }

    #[test]
    fn eviction_prunes_victim_from_reserve_index() {
        let store = CandidateStore::new(1, 5);
        store.insert_if_absent(addr(1), &HashSet::new());
        store.touch_reserve(addr(1), addr(100));

        store.insert_if_absent(addr(2), &HashSet::new());
        assert!(store.exposed_to(addr(100)).is_empty());
    }

    #[test]
    fn remove_prunes_reserve_index_too() {
        let store = CandidateStore::new(2, 5);
        store.insert_if_absent(addr(1), &HashSet::new());
        store.touch_reserve(addr(1), addr(100));

        let removed = store.remove(addr(1));
        assert!(removed.is_some());
        assert!(!store.contains(addr(1)));
        assert!(store.exposed_to(addr(100)).is_empty());
    }

    #[test]
    fn prune_stale_first_seen_clears_only_past_horizon() {
        let store = CandidateStore::new(2, 5);
        store.insert_if_absent(addr(1), &HashSet::new());
        store.with_mut(addr(1), |b| {
            b.apply_verified_hf(domain::hf::Hf::from_f64(0.9), 10, 0)
        });

        store.prune_stale_first_seen(500, 1_000);
        assert_eq!(
            store.get(addr(1)).unwrap().first_seen_liquidatable_block,
            Some(10)
        );

        store.prune_stale_first_seen(2_000, 1_000);
        assert_eq!(store.get(addr(1)).unwrap().first_seen_liquidatable_block, None);
    }
}
