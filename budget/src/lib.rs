//! Daily reversion budget: a UTC-midnight-resetting counter, authoritative
//! across worker threads. Optimistic execution is gated on `used < r_day`.

use common::clock::utc_day_index;
use parking_lot::Mutex;

#[derive(Debug)]
struct State {
    day_index: i64,
    used: u32,
}

pub struct ReversionBudget {
    r_day: u32,
    state: Mutex<State>,
}

impl ReversionBudget {
    pub fn new(r_day: u32, now_ms: u64) -> Self {
        Self {
            r_day,
            state: Mutex::new(State {
                day_index: utc_day_index(now_ms),
                used: 0,
            }),
        }
    }

    fn roll_if_new_day(&self, state: &mut State, now_ms: u64) {
        let today = utc_day_index(now_ms);
        if today != state.day_index {
            state.day_index = today;
            state.used = 0;
        }
    }

    /// Whether an optimistic (pre-verification) dispatch is currently
    /// permitted; does not itself consume budget.
    pub fn has_headroom(&self, now_ms: u64) -> bool {
        let mut state = self.state.lock();
        self.roll_if_new_day(&mut state, now_ms);
        state.used < self.r_day
    }

    /// Records one optimistic revert. Non-optimistic reverts never call
    /// this — they don't count against the budget.
    pub fn record_optimistic_revert(&self, now_ms: u64) {
        let mut state = self.state.lock();
        self.roll_if_new_day(&mut state, now_ms);
        state.used = state.used.saturating_add(1);
    }

    pub fn used_today(&self, now_ms: u64) -> u32 {
        let mut state = self.state.lock();
        self.roll_if_new_day(&mut state, now_ms);
        state.used
    }
}
