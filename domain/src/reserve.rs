use alloy_primitives::Address;

/// A reserve's market-wide view as read from the Oracle Feed / Reserve Data
/// Reader. Distinct from a borrower's exposure to that reserve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reserve {
    pub asset: Address,
    pub price_scaled_1e18: u128,
    pub updated_at_ms: u64,
    pub liquidation_threshold_bps: u32,
}

impl Reserve {
    pub fn price_age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.updated_at_ms)
    }

    pub fn is_stale(&self, now_ms: u64, max_age_ms: u64) -> bool {
        self.price_age_ms(now_ms) > max_age_ms
    }
}
