use alloy_primitives::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    VerifyingFresh,
    Planning,
    AwaitingFee,
    Signing,
    Submitting,
    Pending,
    Settled,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkipReason {
    CriticalSkippedHfRecovery,
    CriticalSkippedProfit,
    StalePrice,
    InvalidPlan,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::CriticalSkippedHfRecovery => "CRITICAL_SKIPPED_HF_RECOVERY",
            SkipReason::CriticalSkippedProfit => "CRITICAL_SKIPPED_PROFIT",
            SkipReason::StalePrice => "stale_price",
            SkipReason::InvalidPlan => "invalid_plan",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReserveExposure {
    pub asset: Address,
    pub debt_usd: f64,
    pub collateral_usd: f64,
    pub usage_as_collateral: bool,
    pub price_updated_at_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidationPlan {
    pub debt_asset: Address,
    pub collateral_asset: Address,
    pub debt_to_cover_base: u128,
    pub estimated_profit_usd: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionOutcome {
    Submitted {
        tx_hash: alloy_primitives::B256,
        gas_price_gwei: f64,
    },
    Skipped {
        reason: SkipReason,
    },
    Dropped,
}
