//! Miss Classifier (C11): turns an observed competitor liquidation into
//! exactly one structured classification per watched user.

use alloy_primitives::Address;
use domain::decision::{DecisionKind, ExecutionDecision};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Ours,
    NotInWatchSet,
    Raced,
    ExecutionFiltered,
    InsufficientProfit,
    GasOutbid,
    Revert,
    HfTransient,
}

#[derive(Clone, Copy, Debug)]
pub struct CompetitorLiquidation {
    pub user: Address,
    pub competitor: Address,
    pub event_block: u64,
    pub event_ts_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissClassifierConfig {
    pub transient_blocks: u64,
    pub gas_outbid_threshold_gwei_x100: u32,
}

impl Default for MissClassifierConfig {
    fn default() -> Self {
        Self {
            transient_blocks: 3,
            gas_outbid_threshold_gwei_x100: 5_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissClassification {
    pub classification: Classification,
    pub blocks_since_first_seen: Option<u64>,
    /// Whether the caller should clear `firstSeenLiquidatableBlock` for
    /// this user now that a classification has been produced.
    pub should_clear_first_seen: bool,
}

fn gas_price_gwei_x100(decision: &ExecutionDecision) -> Option<u32> {
    decision.gas_price_gwei.map(|g| (g * 100.0).round() as u32)
}

/// Pure classification function. `our_signer` identifies our own address so
/// self-liquidations are recognized and skipped. `recent_decision` is the
/// most recent Execution Decision for `user` within the 5-minute TTL window,
/// if any.
pub fn classify(
    config: &MissClassifierConfig,
    our_signer: Address,
    event: &CompetitorLiquidation,
    in_watch_set: bool,
    first_seen_liquidatable_block: Option<u64>,
    recent_decision: Option<&ExecutionDecision>,
) -> MissClassification {
    if event.competitor == our_signer {
        return MissClassification {
            classification: Classification::Ours,
            blocks_since_first_seen: None,
            should_clear_first_seen: false,
        };
    }

    if !in_watch_set {
        return MissClassification {
            classification: Classification::NotInWatchSet,
            blocks_since_first_seen: None,
            should_clear_first_seen: true,
        };
    }

    let blocks_since_first_seen =
        first_seen_liquidatable_block.map(|seen| event.event_block.saturating_sub(seen));

    let mut classification = match recent_decision.map(|d| d.kind) {
        Some(DecisionKind::Attempt) => Classification::Raced,
        Some(DecisionKind::Revert) => Classification::Revert,
        Some(DecisionKind::Skip) => {
            let reason = recent_decision.and_then(|d| d.reason.as_deref()).unwrap_or("");
            if reason.contains("PROFIT") {
                Classification::InsufficientProfit
            } else {
                Classification::ExecutionFiltered
            }
        }
        None => {
            if blocks_since_first_seen.unwrap_or(u64::MAX) <= config.transient_blocks {
                Classification::HfTransient
            } else {
                Classification::Raced
            }
        }
    };

    if matches!(
        recent_decision.map(|d| d.kind),
        Some(DecisionKind::Attempt) | Some(DecisionKind::Skip)
    ) {
        if let Some(gas_price) = recent_decision.and_then(gas_price_gwei_x100) {
            if gas_price < config.gas_outbid_threshold_gwei_x100 {
                classification = Classification::GasOutbid;
            }
        }
    }

    MissClassification {
        classification,
        blocks_since_first_seen,
        should_clear_first_seen: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    fn event(user: Address, competitor: Address, block: u64) -> CompetitorLiquidation {
        CompetitorLiquidation {
            user,
            competitor,
            event_block: block,
            event_ts_ms: 0,
        }
    }

    #[test]
    fn self_liquidation_is_classified_as_ours() {
        let config = MissClassifierConfig::default();
        let us = addr(1);
        let result = classify(&config, us, &event(addr(9), us, 10), true, Some(5), None);
        assert_eq!(result.classification, Classification::Ours);
        assert!(!result.should_clear_first_seen);
    }

    #[test]
    fn user_not_in_watch_set() {
        let config = MissClassifierConfig::default();
        let result = classify(
            &config,
            addr(1),
            &event(addr(9), addr(2), 10),
            false,
            None,
            None,
        );
        assert_eq!(result.classification, Classification::NotInWatchSet);
    }

    #[test]
    fn gas_outbid_overlay_on_attempt() {
        let config = MissClassifierConfig::default();
        let decision = ExecutionDecision {
            user: addr(9),
            timestamp_ms: 0,
            block_number: 9,
            kind: DecisionKind::Attempt,
            reason: None,
            gas_price_gwei: Some(30.0),
            profit_estimate_usd: None,
            tx_hash: None,
        };
        let result = classify(
            &config,
            addr(1),
            &event(addr(9), addr(2), 10),
            true,
            Some(9),
            Some(&decision),
        );
        assert_eq!(result.classification, Classification::GasOutbid);
        assert_eq!(result.blocks_since_first_seen, Some(1));
    }

    #[test]
    fn no_decision_within_transient_window_is_hf_transient() {
        let config = MissClassifierConfig::default();
        let result = classify(
            &config,
            addr(1),
            &event(addr(9), addr(2), 10),
            true,
            Some(9),
            None,
        );
        assert_eq!(result.classification, Classification::HfTransient);
    }

    #[test]
    fn no_decision_beyond_transient_window_is_raced() {
        let config = MissClassifierConfig::default();
        let result = classify(
            &config,
            addr(1),
            &event(addr(9), addr(2), 100),
            true,
            Some(9),
            None,
        );
        assert_eq!(result.classification, Classification::Raced);
    }

    #[test]
    fn skip_with_profit_reason_is_insufficient_profit() {
        let config = MissClassifierConfig::default();
        let decision = ExecutionDecision {
            user: addr(9),
            timestamp_ms: 0,
            block_number: 9,
            kind: DecisionKind::Skip,
            reason: Some("CRITICAL_SKIPPED_PROFIT".to_string()),
            gas_price_gwei: Some(60.0),
            profit_estimate_usd: None,
            tx_hash: None,
        };
        let result = classify(
            &config,
            addr(1),
            &event(addr(9), addr(2), 10),
            true,
            Some(9),
            Some(&decision),
        );
        assert_eq!(result.classification, Classification::InsufficientProfit);
    }
}
