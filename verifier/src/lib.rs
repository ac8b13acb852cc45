//! HF Verifier (C6): the read-path heart of the pipeline. Owns the
//! per-block call budget, the verified-HF micro-cache, per-block and
//! per-user dedup, the near-band pre-filter, wave ordering, and batch/
//! fallback failure handling.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use domain::hf::Hf;
use interfaces::{HealthFactorOracle, HfQueryError, HfReading};

#[derive(Clone, Copy, Debug)]
pub struct VerifierConfig {
    pub q_block: u32,
    pub c_block: usize,
    pub i_min_ms: u64,
    pub t_cache_ms: u64,
    pub d_user_ms: u64,
    pub batch_size: usize,
    pub eps_band: f64,
    pub min_debt_base: u128,
    pub hf_pred_critical: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            q_block: 200,
            c_block: 60,
            i_min_ms: 150,
            t_cache_ms: 2_000,
            d_user_ms: 60_000,
            batch_size: 20,
            eps_band: 0.03,
            min_debt_base: 0,
            hf_pred_critical: 1.0008,
        }
    }
}

/// Input to a verification wave: what we knew about a candidate before
/// issuing a fresh call.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub addr: Address,
    pub last_hf: Option<Hf>,
    pub debt_base: u128,
    pub projected_hf: Option<Hf>,
    /// Strength of the signal that nominated this candidate for
    /// re-verification; a stronger signal can override the per-user
    /// dedup cooldown.
    pub signal_strength: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FailReason {
    Rpc,
    Revert,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VerifyOutcome {
    Verified(HfReading),
    Failed(FailReason),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AdmitReject {
    AlreadyVerifiedThisBlock,
    UserCooldown,
    BudgetExceeded,
    NearBandFiltered,
}

#[derive(Clone, Copy)]
struct CacheEntry {
    block_number: u64,
    reading: HfReading,
    cached_at_ms: u64,
}

struct UserDedup {
    last_verified_at_ms: u64,
    signal_strength: u8,
}

pub struct Verifier {
    config: VerifierConfig,
    current_block: u64,
    calls_used_this_block: u32,
    verified_this_block: HashSet<Address>,
    micro_cache: HashMap<Address, CacheEntry>,
    user_dedup: HashMap<Address, UserDedup>,
    last_wave_at_ms: Option<u64>,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            current_block: 0,
            calls_used_this_block: 0,
            verified_this_block: HashSet::new(),
            micro_cache: HashMap::new(),
            user_dedup: HashMap::new(),
            last_wave_at_ms: None,
        }
    }

    /// Resets per-block counters and dedup set. Per invariant 1/2.
    pub fn on_new_block(&mut self, block_number: u64) {
        self.current_block = block_number;
        self.calls_used_this_block = 0;
        self.verified_this_block.clear();
    }

    /// Invalidates cached readings for blocks at or beyond the reorg depth
    /// from the current tip.
    pub fn invalidate_reorg(&mut self, tip: u64, depth: u64) {
        let boundary = tip.saturating_sub(depth);
        self.micro_cache.retain(|_, entry| entry.block_number < boundary);
    }

    /// Periodic cleanup: drops per-user cooldown dedup entries whose window
    /// has long since closed, bounding the map's memory growth.
    pub fn prune_user_dedup(&mut self, now_ms: u64) {
        let horizon = self.config.d_user_ms;
        self.user_dedup
            .retain(|_, dedup| now_ms.saturating_sub(dedup.last_verified_at_ms) <= horizon);
    }

    pub fn cached(&self, addr: Address, now_ms: u64) -> Option<HfReading> {
        self.micro_cache.get(&addr).and_then(|entry| {
            if now_ms.saturating_sub(entry.cached_at_ms) <= self.config.t_cache_ms {
                Some(entry.reading)
            } else {
                None
            }
        })
    }

    fn near_band_reject(&self, c: &Candidate) -> bool {
        let Some(hf) = c.last_hf else {
            return false; // no prior reading: never pre-filtered
        };
        if hf.distance_from_one() <= self.config.eps_band {
            return false;
        }
        let qualifies_anyway = c.debt_base >= self.config.min_debt_base
            && (hf.is_liquidatable()
                || c.projected_hf
                    .map(|p| p.as_f64() <= self.config.hf_pred_critical)
                    .unwrap_or(false));
        !qualifies_anyway
    }

    fn is_on_cooldown(&self, addr: Address, now_ms: u64, signal_strength: u8) -> bool {
        match self.user_dedup.get(&addr) {
            Some(dedup) => {
                let elapsed = now_ms.saturating_sub(dedup.last_verified_at_ms);
                elapsed < self.config.d_user_ms && signal_strength <= dedup.signal_strength
            }
            None => false,
        }
    }

    /// Whether `candidate` should be admitted into the current wave, and if
    /// not, why. Does not mutate state — callers call `admit` once they've
    /// decided to actually issue the call.
    pub fn check_admission(&self, candidate: &Candidate, now_ms: u64) -> Result<(), AdmitReject> {
        if self.verified_this_block.contains(&candidate.addr) {
            return Err(AdmitReject::AlreadyVerifiedThisBlock);
        }
        if self.calls_used_this_block >= self.config.q_block {
            return Err(AdmitReject::BudgetExceeded);
        }
        if self.near_band_reject(candidate) {
            return Err(AdmitReject::NearBandFiltered);
        }
        if self.is_on_cooldown(candidate.addr, now_ms, candidate.signal_strength) {
            return Err(AdmitReject::UserCooldown);
        }
        Ok(())
    }

    /// Orders a wave ascending by last-known HF (unknown HF sorts first, as
    /// most urgent), ties broken by larger debt.
    pub fn order_wave(candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| {
            let hf_a = a.last_hf.map(Hf::scaled_1e18).unwrap_or(i128::MIN);
            let hf_b = b.last_hf.map(Hf::scaled_1e18).unwrap_or(i128::MIN);
            hf_a.cmp(&hf_b).then_with(|| b.debt_base.cmp(&a.debt_base))
        });
    }

    pub fn ready_for_wave(&self, now_ms: u64) -> bool {
        match self.last_wave_at_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.i_min_ms,
            None => true,
        }
    }

    /// Runs one verification wave: admits candidates up to the budget, in
    /// wave order, issuing per-address calls via `oracle` with a single
    /// retry to `fallback` on RPC failure. Reverts are terminal, not
    /// retried.
    pub async fn verify_wave(
        &mut self,
        mut candidates: Vec<Candidate>,
        block_tag: Option<u64>,
        now_ms: u64,
        oracle: &dyn HealthFactorOracle,
        fallback: Option<&dyn HealthFactorOracle>,
    ) -> Vec<(Address, VerifyOutcome)> {
        Self::order_wave(&mut candidates);
        self.last_wave_at_ms = Some(now_ms);

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.check_admission(&candidate, now_ms).is_err() {
                continue;
            }

            self.calls_used_this_block += 1;
            self.verified_this_block.insert(candidate.addr);

            let outcome = match oracle.get_user_account(candidate.addr, block_tag).await {
                Ok(reading) => VerifyOutcome::Verified(reading),
                Err(HfQueryError::Revert { .. }) => VerifyOutcome::Failed(FailReason::Revert),
                Err(_) => {
                    if let Some(fallback) = fallback {
                        match fallback.get_user_account(candidate.addr, block_tag).await {
                            Ok(reading) => VerifyOutcome::Verified(reading),
                            Err(HfQueryError::Revert { .. }) => {
                                VerifyOutcome::Failed(FailReason::Revert)
                            }
                            Err(_) => VerifyOutcome::Failed(FailReason::Rpc),
                        }
                    } else {
                        VerifyOutcome::Failed(FailReason::Rpc)
                    }
                }
            };

            if let VerifyOutcome::Verified(reading) = outcome {
                self.micro_cache.insert(
                    candidate.addr,
                    CacheEntry {
                        block_number: self.current_block,
                        reading,
                        cached_at_ms: now_ms,
                    },
                );
                self.user_dedup.insert(
                    candidate.addr,
                    UserDedup {
                        last_verified_at_ms: now_ms,
                        signal_strength: candidate.signal_strength,
                    },
                );
            }

            results.push((candidate.addr, outcome));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::health_factor_oracle::mock::MockHealthFactorOracle;

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    fn reading(hf: f64, debt: u128) -> HfReading {
        HfReading {
            hf: Hf::from_f64(hf),
            collateral_base: debt * 2,
            debt_base: debt,
            lt_bps_avg: 8_000,
        }
    }

    #[tokio::test]
    async fn verify_wave_caches_successful_reading() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(1);
        let oracle = MockHealthFactorOracle::new();
        oracle.seed(addr(1), reading(0.9, 100));

        let candidates = vec![Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.9)),
            debt_base: 100,
            projected_hf: None,
            signal_strength: 1,
        }];

        let results = verifier
            .verify_wave(candidates, None, 0, &oracle, None)
            .await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, VerifyOutcome::Verified(_)));
        assert!(verifier.cached(addr(1), 0).is_some());
    }

    #[tokio::test]
    async fn second_verification_same_block_is_deduped() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(1);
        let oracle = MockHealthFactorOracle::new();
        oracle.seed(addr(1), reading(0.9, 100));

        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.9)),
            debt_base: 100,
            projected_hf: None,
            signal_strength: 1,
        };

        verifier
            .verify_wave(vec![cand], None, 0, &oracle, None)
            .await;
        let second = verifier
            .verify_wave(vec![cand], None, 100, &oracle, None)
            .await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn prune_user_dedup_drops_entries_past_the_window() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(1);
        let oracle = MockHealthFactorOracle::new();
        oracle.seed(addr(1), reading(0.9, 100));

        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.9)),
            debt_base: 100,
            projected_hf: None,
            signal_strength: 1,
        };
        verifier
            .verify_wave(vec![cand], None, 0, &oracle, None)
            .await;

        verifier.prune_user_dedup(10_000);
        assert!(verifier.user_dedup.contains_key(&addr(1)));

        verifier.prune_user_dedup(1_000_000);
        assert!(!verifier.user_dedup.contains_key(&addr(1)));
    }

    #[tokio::test]
    async fn rpc_failure_falls_back_once() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(1);
        let primary = MockHealthFactorOracle::new();
        primary.seed_err(
            addr(1),
            HfQueryError::Transient {
                endpoint: "primary".into(),
                message: "timeout".into(),
            },
        );
        let fallback = MockHealthFactorOracle::new();
        fallback.seed(addr(1), reading(0.9, 100));

        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.9)),
            debt_base: 100,
            projected_hf: None,
            signal_strength: 1,
        };

        let results = verifier
            .verify_wave(vec![cand], None, 0, &primary, Some(&fallback))
            .await;
        assert!(matches!(results[0].1, VerifyOutcome::Verified(_)));
    }

    #[tokio::test]
    async fn revert_is_terminal_and_not_retried() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(1);
        let primary = MockHealthFactorOracle::new();
        primary.seed_err(addr(1), HfQueryError::Revert { user: addr(1) });
        let fallback = MockHealthFactorOracle::new();
        fallback.seed(addr(1), reading(0.9, 100));

        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.9)),
            debt_base: 100,
            projected_hf: None,
            signal_strength: 1,
        };

        let results = verifier
            .verify_wave(vec![cand], None, 0, &primary, Some(&fallback))
            .await;
        assert_eq!(results[0].1, VerifyOutcome::Failed(FailReason::Revert));
    }

    #[test]
    fn near_band_filter_drops_far_healthy_low_debt_candidate() {
        let verifier = Verifier::new(VerifierConfig::default());
        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(1.20)),
            debt_base: 0,
            projected_hf: None,
            signal_strength: 1,
        };
        assert_eq!(
            verifier.check_admission(&cand, 0),
            Err(AdmitReject::NearBandFiltered)
        );
    }

    #[test]
    fn near_band_filter_admits_liquidatable_candidate_regardless_of_distance() {
        let mut config = VerifierConfig::default();
        config.min_debt_base = 0;
        let verifier = Verifier::new(config);
        let cand = Candidate {
            addr: addr(1),
            last_hf: Some(Hf::from_f64(0.50)),
            debt_base: 0,
            projected_hf: None,
            signal_strength: 1,
        };
        assert!(verifier.check_admission(&cand, 0).is_ok());
    }

    #[test]
    fn order_wave_sorts_ascending_hf_then_descending_debt() {
        let mut candidates = vec![
            Candidate {
                addr: addr(1),
                last_hf: Some(Hf::from_f64(1.0)),
                debt_base: 100,
                projected_hf: None,
                signal_strength: 1,
            },
            Candidate {
                addr: addr(2),
                last_hf: Some(Hf::from_f64(0.9)),
                debt_base: 50,
                projected_hf: None,
                signal_strength: 1,
            },
            Candidate {
                addr: addr(3),
                last_hf: Some(Hf::from_f64(0.9)),
                debt_base: 200,
                projected_hf: None,
                signal_strength: 1,
            },
        ];
        Verifier::order_wave(&mut candidates);
        assert_eq!(candidates[0].addr, addr(3));
        assert_eq!(candidates[1].addr, addr(2));
        assert_eq!(candidates[2].addr, addr(1));
    }

    #[test]
    fn reorg_invalidates_cache_entries_at_or_past_boundary() {
        let mut verifier = Verifier::new(VerifierConfig::default());
        verifier.on_new_block(10);
        verifier.micro_cache.insert(
            addr(1),
            CacheEntry {
                block_number: 8,
                reading: reading(0.9, 100),
                cached_at_ms: 0,
            },
        );
        verifier.micro_cache.insert(
            addr(2),
            CacheEntry {
                block_number: 3,
                reading: reading(0.9, 100),
                cached_at_ms: 0,
            },
        );

        verifier.invalidate_reorg(10, 5);
        assert!(verifier.cached(addr(1), 0).is_none());
        assert!(verifier.cached(addr(2), 0).is_some());
    }
}
