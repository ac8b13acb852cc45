//! Per-`(user, debtAsset, collateralAsset, planShape)` signed calldata
//! prefix cache. Reused while the observed `variableBorrowIndex` has drifted
//! by no more than `delta_idx_bps`; otherwise rebuilt. Also invalidated
//! wholesale for a reserve whenever its LTV/liquidation threshold/bonus
//! changes (REDESIGN FLAG, §9 open question 3) — the index-drift rule alone
//! under-specifies that case.

use std::collections::HashMap;

use alloy_primitives::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub user: Address,
    pub debt_asset: Address,
    pub collateral_asset: Address,
    pub plan_shape: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CachedTemplate {
    calldata_prefix: Vec<u8>,
    variable_borrow_index: u64,
}

pub struct CalldataTemplateCache {
    delta_idx_bps: u32,
    entries: HashMap<TemplateKey, CachedTemplate>,
}

impl CalldataTemplateCache {
    pub fn new(delta_idx_bps: u32) -> Self {
        Self {
            delta_idx_bps,
            entries: HashMap::new(),
        }
    }

    fn index_drift_bps(old: u64, new: u64) -> u64 {
        if old == 0 {
            return u64::MAX;
        }
        let diff = old.abs_diff(new);
        diff.saturating_mul(10_000) / old
    }

    /// Returns the cached prefix if present and the index hasn't drifted
    /// beyond the configured threshold.
    pub fn get(&self, key: &TemplateKey, current_index: u64) -> Option<&[u8]> {
        self.entries.get(key).and_then(|cached| {
            if Self::index_drift_bps(cached.variable_borrow_index, current_index)
                <= self.delta_idx_bps as u64
            {
                Some(cached.calldata_prefix.as_slice())
            } else {
                None
            }
        })
    }

    pub fn put(&mut self, key: TemplateKey, calldata_prefix: Vec<u8>, variable_borrow_index: u64) {
        self.entries.insert(
            key,
            CachedTemplate {
                calldata_prefix,
                variable_borrow_index,
            },
        );
    }

    /// Wholesale invalidation for every cached template touching `asset`,
    /// triggered by a `ReserveDataUpdated` event changing LTV, liquidation
    /// threshold, or bonus for that reserve.
    pub fn invalidate_asset(&mut self, asset: Address) {
        self.entries
            .retain(|key, _| key.debt_asset != asset && key.collateral_asset != asset);
    }
}
