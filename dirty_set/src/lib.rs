//! Set-with-TTL of addresses awaiting re-verification. Disjoint from the
//! Candidate Store: a user may be dirty without being tracked there yet.

use std::collections::{HashMap, VecDeque};

use alloy_primitives::Address;
use domain::dirty::{DirtyEntry, Reason};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Address, DirtyEntry>,
    /// Round-robin scan cursor for the amortized expiry pass.
    scan_order: VecDeque<Address>,
}

pub struct DirtySet {
    ttl_ms: u64,
    inner: Mutex<Inner>,
}

impl DirtySet {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Idempotent union of `reason` into the entry for `addr`. Returns `true`
    /// if this was the first time this reason was recorded for the entry —
    /// the caller fires the `markedTotal` counter only in that case.
    pub fn mark(&self, addr: Address, reason: Reason, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        let is_new_addr = !inner.entries.contains_key(&addr);
        let entry = inner.entries.entry(addr).or_default();
        let before = entry.reasons().len();
        entry.mark(reason, now_ms);
        let newly_added = entry.reasons().len() > before;

        if is_new_addr {
            inner.scan_order.push_back(addr);
        }
        newly_added
    }

    /// Ordered application of `mark` for each address, per §4.3.
    pub fn mark_bulk(&self, addrs: &[Address], reason: Reason, now_ms: u64) {
        for addr in addrs {
            self.mark(*addr, reason, now_ms);
        }
    }

    /// Atomic removal, returning the entry if present. Callers invoke this
    /// exactly once per `(addr, processing pass)`.
    pub fn consume(&self, addr: Address) -> Option<DirtyEntry> {
        let mut inner = self.inner.lock();
        inner.entries.remove(&addr)
    }

    /// Subset of `addrs` currently present, for page-join scans.
    pub fn intersect(&self, addrs: &[Address]) -> Vec<Address> {
        let inner = self.inner.lock();
        addrs
            .iter()
            .copied()
            .filter(|a| inner.entries.contains_key(a))
            .collect()
    }

    pub fn is_dirty(&self, addr: Address) -> bool {
        self.inner.lock().entries.contains_key(&addr)
    }

    /// Up to `limit` currently-dirty addresses, ordered by reason-count
    /// descending (a proxy for reason strength) then by earliest mark time —
    /// the promotion order the Orchestrator's per-block step reads from.
    /// Non-consuming: callers still `consume` each promoted address.
    pub fn snapshot_candidates(&self, limit: usize) -> Vec<Address> {
        let inner = self.inner.lock();
        let mut entries: Vec<_> = inner
            .entries
            .iter()
            .map(|(addr, entry)| (*addr, entry.reasons().len(), entry.first_marked_at_ms))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries.into_iter().take(limit).map(|(addr, _, _)| addr).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Amortized expiry pass: scans at most `max_scan` entries in round-robin
    /// order, removing any whose `lastMarkedAt + ttl < now`. Bounded work per
    /// call; a full sweep takes multiple calls if the set is large.
    pub fn expire(&self, now_ms: u64, max_scan: usize) -> usize {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        let mut scanned = 0;

        while scanned < max_scan {
            let Some(addr) = inner.scan_order.pop_front() else {
                break;
            };
            scanned += 1;

            match inner.entries.get(&addr) {
                Some(entry) if now_ms.saturating_sub(entry.last_marked_at_ms) > self.ttl_ms => {
                    inner.entries.remove(&addr);
                    removed += 1;
                }
                Some(_) => {
                    inner.scan_order.push_back(addr);
                }
                None => {
                    // already consumed; drop from the scan order silently
                }
            }
        }

        removed
    }
}
