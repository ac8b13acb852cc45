//! Pure liquidation-plan construction, step 2 of the executor state machine
//! (§4.8). Kept free of I/O so it can be exhaustively unit tested.

use domain::hf::Hf;

use crate::types::{LiquidationPlan, ReserveExposure, SkipReason};

#[derive(Clone, Copy, Debug)]
pub struct PlanConfig {
    pub close_factor_threshold: f64,
    pub liquidation_bonus_pct: f64,
    pub s_price_ms: u64,
    pub profit_min_usd: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            close_factor_threshold: 0.95,
            liquidation_bonus_pct: 0.05,
            s_price_ms: 30_000,
            profit_min_usd: 0.10,
        }
    }
}

/// Prefers a configured asset if present among the borrower's exposures;
/// otherwise the largest-debt-USD reserve.
pub fn select_debt_reserve(
    configured: Option<alloy_primitives::Address>,
    exposures: &[ReserveExposure],
) -> Option<ReserveExposure> {
    if let Some(configured) = configured {
        if let Some(found) = exposures.iter().find(|e| e.asset == configured) {
            return Some(*found);
        }
    }
    exposures
        .iter()
        .copied()
        .max_by(|a, b| a.debt_usd.total_cmp(&b.debt_usd))
}

/// Largest-collateral-USD reserve with `usageAsCollateral` set.
pub fn select_collateral_reserve(exposures: &[ReserveExposure]) -> Option<ReserveExposure> {
    exposures
        .iter()
        .copied()
        .filter(|e| e.usage_as_collateral)
        .max_by(|a, b| a.collateral_usd.total_cmp(&b.collateral_usd))
}

/// `debtToCover`: 100% of outstanding debt if `hf < 0.95`, else 50%.
pub fn compute_debt_to_cover(hf: Hf, total_debt_base: u128, close_factor_threshold: f64) -> u128 {
    if hf.as_f64() < close_factor_threshold {
        total_debt_base
    } else {
        total_debt_base / 2
    }
}

/// Builds the full plan, or the `SkipReason` that should send the state
/// machine back to Idle.
pub fn build_plan(
    config: &PlanConfig,
    configured_debt_asset: Option<alloy_primitives::Address>,
    exposures: &[ReserveExposure],
    hf: Hf,
    total_debt_base: u128,
    now_ms: u64,
) -> Result<LiquidationPlan, SkipReason> {
    let debt_reserve =
        select_debt_reserve(configured_debt_asset, exposures).ok_or(SkipReason::InvalidPlan)?;
    let collateral_reserve = select_collateral_reserve(exposures).ok_or(SkipReason::InvalidPlan)?;

    if now_ms.saturating_sub(debt_reserve.price_updated_at_ms) > config.s_price_ms
        || now_ms.saturating_sub(collateral_reserve.price_updated_at_ms) > config.s_price_ms
    {
        return Err(SkipReason::StalePrice);
    }
    if debt_reserve.debt_usd <= 0.0 || collateral_reserve.collateral_usd <= 0.0 {
        return Err(SkipReason::StalePrice);
    }

    let debt_to_cover_base =
        compute_debt_to_cover(hf, total_debt_base, config.close_factor_threshold);
    let debt_to_cover_usd = debt_reserve.debt_usd
        * (debt_to_cover_base as f64 / total_debt_base.max(1) as f64);
    let estimated_profit_usd = debt_to_cover_usd * config.liquidation_bonus_pct;

    Ok(LiquidationPlan {
        debt_asset: debt_reserve.asset,
        collateral_asset: collateral_reserve.asset,
        debt_to_cover_base,
        estimated_profit_usd,
    })
}
