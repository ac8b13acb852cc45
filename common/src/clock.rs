use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotone wall-clock source for cooldowns, TTLs, and the daily reversion
/// budget reset. Production code uses `SystemClock`; tests inject
/// `ManualClock` so timing-sensitive assertions don't depend on real time.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock whose value is set explicitly. Never goes backwards: `set` clamps
/// to the current value plus the requested delta being non-negative.
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, value_ms: u64) {
        self.now_ms.store(value_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Returns the UTC-midnight day index for a millisecond timestamp, used by
/// the Reversion Budget's daily reset.
pub fn utc_day_index(now_ms: u64) -> i64 {
    (now_ms / 86_400_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(1_000);
        assert_eq!(c.now_ms(), 1_000);
        c.advance_ms(500);
        assert_eq!(c.now_ms(), 1_500);
    }

    #[test]
    fn utc_day_index_changes_at_midnight_boundary() {
        let one_day_ms = 86_400_000u64;
        assert_eq!(utc_day_index(0), 0);
        assert_eq!(utc_day_index(one_day_ms - 1), 0);
        assert_eq!(utc_day_index(one_day_ms), 1);
    }
}
