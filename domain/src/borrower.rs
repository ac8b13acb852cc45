use std::collections::VecDeque;

use alloy_primitives::Address;

use crate::hf::Hf;

/// A tracked at-risk borrower, owned exclusively by the Candidate Store.
#[derive(Clone, Debug)]
pub struct Borrower {
    pub address: Address,
    pub last_hf: Option<Hf>,
    pub last_hf_block: u64,
    pub last_hf_timestamp: u64,

    pub total_collateral_base: u128,
    pub total_debt_base: u128,

    reserve_set: VecDeque<Address>,
    reserve_cap: usize,

    pub cooldown_until_ms: u64,
    pub priority: i32,

    /// Block at which `hf < 1` was first observed for this borrower; cleared
    /// once `hf >= 1` or on final disposition (settled/failed/miss-classified).
    pub first_seen_liquidatable_block: Option<u64>,

    pub touched_at_ms: u64,
}

impl Borrower {
    pub fn new(address: Address, reserve_cap: usize) -> Self {
        Self {
            address,
            last_hf: None,
            last_hf_block: 0,
            last_hf_timestamp: 0,
            total_collateral_base: 0,
            total_debt_base: 0,
            reserve_set: VecDeque::new(),
            reserve_cap: reserve_cap.max(1),
            cooldown_until_ms: 0,
            priority: i32::MAX,
            first_seen_liquidatable_block: None,
            touched_at_ms: 0,
        }
    }

    /// Records exposure to `reserve`, evicting the least-recently-touched
    /// reserve if the bounded set is full. Insertion order is preserved so
    /// the oldest entry is always at the front.
    pub fn touch_reserve(&mut self, reserve: Address) {
        if let Some(pos) = self.reserve_set.iter().position(|r| *r == reserve) {
            self.reserve_set.remove(pos);
        } else if self.reserve_set.len() >= self.reserve_cap {
            self.reserve_set.pop_front();
        }
        self.reserve_set.push_back(reserve);
    }

    pub fn reserves(&self) -> impl Iterator<Item = &Address> {
        self.reserve_set.iter()
    }

    /// Applies a freshly verified health factor, updating the
    /// first-seen-liquidatable marker per the invariant in §3: set on the
    /// first block `hf < 1`, cleared as soon as `hf >= 1`.
    pub fn apply_verified_hf(&mut self, hf: Hf, block: u64, timestamp_ms: u64) {
        self.last_hf = Some(hf);
        self.last_hf_block = block;
        self.last_hf_timestamp = timestamp_ms;
        self.touched_at_ms = timestamp_ms;

        if hf.is_liquidatable() {
            if self.first_seen_liquidatable_block.is_none() {
                self.first_seen_liquidatable_block = Some(block);
            }
        } else {
            self.first_seen_liquidatable_block = None;
        }
    }

    /// Monotonically advances the cooldown; never moves it backwards.
    pub fn extend_cooldown(&mut self, until_ms: u64) {
        if until_ms > self.cooldown_until_ms {
            self.cooldown_until_ms = until_ms;
        }
    }

    /// Sort key for Candidate Store eviction: the entry with the **maximum**
    /// key is the victim. Prefers evicting the least risky entry (highest
    /// HF, `None` counts as most evictable), tie-broken by lowest debt, then
    /// oldest touch — the second and third components are negated so that
    /// "lowest debt" / "oldest touch" both compare as the maximum.
    pub fn eviction_key(&self) -> (i128, i128, i64) {
        let hf_key = self.last_hf.map(|h| h.scaled_1e18()).unwrap_or(i128::MAX);
        (
            hf_key,
            -(self.total_debt_base as i128),
            -(self.touched_at_ms as i64),
        )
    }
}
