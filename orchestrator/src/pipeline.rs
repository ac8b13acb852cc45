//! Per-block critical section wiring every pipeline component together
//! (§4.12): dirty marking from signals and logs, bounded promotion into a
//! verification wave, admission of fresh readings into the priority queues,
//! and draining Hot-then-Warm through the Fast-Path Executor up to the
//! worker-pool width. Grounded on the teacher's scheduler tick
//! (`backend/src/scheduler/scheduler.rs`'s `on_tick`): one entry point per
//! cadence event, fixed work budget, side effects recorded as it goes.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use common::clock::Clock;
use common::error::PipelineError;
use domain::block::{Block, Reorg};
use domain::decision::{DecisionHistory, DecisionKind, ExecutionDecision};
use domain::dirty::Reason;

use candidates::CandidateStore;
use dirty_set::DirtySet;
use events::TopicRegistry;
use executor::template_cache::CalldataTemplateCache;
use executor::{ExecutionOutcome, ExecutionRequest, FastPathExecutor, ReserveExposure};
use interfaces::{DecodedLog, HealthFactorOracle, PriceSignal, Telemetry};
use miss_classifier::{CompetitorLiquidation, MissClassification, MissClassifierConfig};
use queues::{PriorityQueues, Tier};
use signal_gate::SignalGate;
use verifier::{Candidate as VerifyCandidate, FailReason, VerifyOutcome, Verifier};

use crate::config::AppConfig;

/// Per-block tallies, returned for logging and tests; not itself part of
/// any invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub dirty_marked: usize,
    pub promoted: usize,
    pub verified: usize,
    pub admitted_hot: usize,
    pub admitted_warm: usize,
    pub executed: usize,
}

/// Owns every stateful component of the pipeline and drives them through
/// one block at a time. A single `Pipeline` is expected per deployment;
/// concurrency across users is delegated to the `FastPathExecutor` it holds.
pub struct Pipeline {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    candidates: CandidateStore,
    dirty: DirtySet,
    signal_gate: SignalGate,
    verifier: Verifier,
    queues: PriorityQueues,
    executor: Arc<FastPathExecutor>,
    telemetry: Arc<dyn Telemetry>,
    topics: TopicRegistry,
    our_signer: Address,
    decisions: DecisionHistory,
    insertion_counter: u64,
    symbol_to_asset: HashMap<String, Address>,
    template_cache: CalldataTemplateCache,
    miss_config: MissClassifierConfig,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        executor: Arc<FastPathExecutor>,
        telemetry: Arc<dyn Telemetry>,
        topics: TopicRegistry,
        our_signer: Address,
        symbol_to_asset: HashMap<String, Address>,
    ) -> Self {
        let miss_config = MissClassifierConfig {
            transient_blocks: config.transient_blocks,
            gas_outbid_threshold_gwei_x100: (config.gas_outbid_threshold_gwei * 100.0) as u32,
        };
        Self {
            candidates: CandidateStore::new(config.candidates_capacity, config.candidates_reserve_cap),
            dirty: DirtySet::new(config.ttl_dirty_ms),
            signal_gate: SignalGate::new(config.signals),
            verifier: Verifier::new(config.verifier),
            queues: PriorityQueues::new(config.queues),
            template_cache: CalldataTemplateCache::new(50),
            miss_config,
            decisions: DecisionHistory::new(config.decision_history_capacity),
            insertion_counter: 0,
            config,
            clock,
            executor,
            telemetry,
            topics,
            our_signer,
            symbol_to_asset,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Snapshot of a tracked borrower, for callers (tests, operator tooling)
    /// that need to inspect Candidate Store state the block summary doesn't
    /// carry.
    pub fn candidate(&self, addr: Address) -> Option<domain::borrower::Borrower> {
        self.candidates.get(addr)
    }

    /// Marks every borrower currently exposed to the signal's asset dirty,
    /// after the Signal Gate has had a chance to debounce or reject it.
    /// Returns how many users were marked.
    fn on_price_signal(&mut self, signal: &PriceSignal, now_ms: u64) -> usize {
        if self.signal_gate.evaluate(signal).is_err() {
            return 0;
        }
        let Some(asset) = self.symbol_to_asset.get(&signal.symbol).copied() else {
            return 0;
        };
        let exposed = self.candidates.exposed_to(asset);
        self.dirty.mark_bulk(&exposed, Reason::PriceMove, now_ms);
        exposed.len()
    }

    /// Decodes one log and applies its effect: per-user marking for
    /// Borrow/Repay/Supply/Withdraw/LiquidationCall, or a reserve-wide
    /// fan-out (plus calldata-template invalidation) for
    /// ReserveDataUpdated/AnswerUpdated. Returns how many users were marked.
    fn on_log(&mut self, log: &DecodedLog, now_ms: u64) -> usize {
        let affected = events::decode(log, &self.topics);
        let mut marked = 0;
        let protected = self.executor.in_flight_snapshot();

        for au in &affected {
            let reason = match au.kind {
                events::EventKind::Borrow => Reason::BorrowEvent,
                events::EventKind::Repay => Reason::RepayEvent,
                events::EventKind::Supply | events::EventKind::Withdraw => Reason::CollateralEvent,
                events::EventKind::LiquidationCall => Reason::LiquidationEvent,
                events::EventKind::ReserveDataUpdated | events::EventKind::AnswerUpdated => continue,
            };

            self.candidates.insert_if_absent(au.user, &protected);
            if let Some(reserve) = au.reserve {
                self.candidates.touch_reserve(au.user, reserve);
            }
            if self.dirty.mark(au.user, reason, now_ms) {
                marked += 1;
            }
        }

        if let Some(kind) = self.topics.kind_for(&log.topic0) {
            if matches!(
                kind,
                events::EventKind::ReserveDataUpdated | events::EventKind::AnswerUpdated
            ) {
                if let Some(reserve) = log.reserve {
                    let exposed = self.candidates.exposed_to(reserve);
                    self.dirty.mark_bulk(&exposed, Reason::ReserveConfigChange, now_ms);
                    self.template_cache.invalidate_asset(reserve);
                    marked += exposed.len();
                }
            }
        }

        marked
    }

    /// Reorg side channel (§4.12): invalidates the verifier's micro-cache
    /// back to the reorg boundary and re-dirties anyone the Fast-Path
    /// Executor currently has in flight, since their in-progress plans may
    /// target state that no longer exists. Execution Decisions are left
    /// untouched — they remain valid evidence for the Miss Classifier.
    pub fn on_reorg(&mut self, reorg: Reorg, tip: u64, now_ms: u64) {
        self.verifier.invalidate_reorg(tip, reorg.depth);
        let in_flight: Vec<Address> = self.executor.in_flight_snapshot().into_iter().collect();
        self.dirty.mark_bulk(&in_flight, Reason::Reorg, now_ms);
    }

    /// Classifies a competitor's liquidation of a watched (or once-watched)
    /// user and clears `firstSeenLiquidatableBlock` when the classifier says
    /// the disposition is final.
    pub fn on_competitor_liquidation(
        &mut self,
        event: CompetitorLiquidation,
        now_ms: u64,
    ) -> MissClassification {
        let in_watch_set = self.candidates.contains(event.user);
        let first_seen = self
            .candidates
            .get(event.user)
            .and_then(|b| b.first_seen_liquidatable_block);
        let recent_decision = self
            .decisions
            .iter()
            .rev()
            .find(|d| d.user == event.user && now_ms.saturating_sub(d.timestamp_ms) <= self.config.decision_ttl_ms)
            .cloned();

        let result = miss_classifier::classify(
            &self.miss_config,
            self.our_signer,
            &event,
            in_watch_set,
            first_seen,
            recent_decision.as_ref(),
        );

        if result.should_clear_first_seen {
            self.candidates
                .with_mut(event.user, |b| b.first_seen_liquidatable_block = None);
        }

        self.telemetry
            .counter("miss_classified", 1);
        result
    }

    /// Heuristic bridge from the Candidate Store's aggregate
    /// debt/collateral totals to the per-reserve `ReserveExposure` shape the
    /// executor's plan builder expects. `Borrower` tracks only a bounded set
    /// of touched reserves and aggregate totals, not a per-reserve split, so
    /// the first touched reserve stands in for the debt asset and the most
    /// recently touched one for the collateral asset. Documented as a known
    /// simplification rather than threading a full per-reserve ledger
    /// through the Candidate Store.
    fn build_exposures(&self, user: Address, now_ms: u64) -> Vec<ReserveExposure> {
        let Some(borrower) = self.candidates.get(user) else {
            return Vec::new();
        };
        let reserves: Vec<Address> = borrower.reserves().copied().collect();
        let Some(&debt_asset) = reserves.first() else {
            return Vec::new();
        };
        let collateral_asset = *reserves.last().unwrap_or(&debt_asset);

        vec![
            ReserveExposure {
                asset: debt_asset,
                debt_usd: borrower.total_debt_base as f64 / 1e8,
                collateral_usd: 0.0,
                usage_as_collateral: false,
                price_updated_at_ms: now_ms,
            },
            ReserveExposure {
                asset: collateral_asset,
                debt_usd: 0.0,
                collateral_usd: borrower.total_collateral_base as f64 / 1e8,
                usage_as_collateral: true,
                price_updated_at_ms: now_ms,
            },
        ]
    }

    /// `Submitted` becomes an Attempt decision, `Skipped` a Skip decision
    /// carrying the skip reason; `Dropped` (the concurrency guard firing)
    /// isn't a disposition worth recording. No producer in this pipeline
    /// ever records `DecisionKind::Revert` — that requires watching for
    /// confirmed on-chain reverts after broadcast, an inclusion-watching
    /// concern this repository doesn't implement.
    fn record_decision(
        &mut self,
        user: Address,
        block_number: u64,
        now_ms: u64,
        outcome: &ExecutionOutcome,
    ) {
        let decision = match outcome {
            ExecutionOutcome::Submitted {
                tx_hash,
                gas_price_gwei,
            } => ExecutionDecision {
                user,
                timestamp_ms: now_ms,
                block_number,
                kind: DecisionKind::Attempt,
                reason: None,
                gas_price_gwei: Some(*gas_price_gwei),
                profit_estimate_usd: None,
                tx_hash: Some(*tx_hash),
            },
            ExecutionOutcome::Skipped { reason } => {
                ExecutionDecision::skip(user, now_ms, block_number, reason.as_str())
            }
            ExecutionOutcome::Dropped => return,
        };

        self.decisions.push(decision);
    }

    /// Runs the full per-block critical section: dirty marking from
    /// `signals` and `logs`, bounded promotion into a verification wave,
    /// admission into the priority queues, and draining Hot-then-Warm
    /// through the executor up to `worker_pool_width` concurrent attempts.
    pub async fn process_block(
        &mut self,
        block: Block,
        signals: Vec<PriceSignal>,
        logs: Vec<DecodedLog>,
        oracle: &dyn HealthFactorOracle,
        fallback: Option<&dyn HealthFactorOracle>,
    ) -> anyhow::Result<BlockSummary> {
        let span = common::logger::block_span(block.number);
        let _enter = span.enter();

        self.verifier.on_new_block(block.number);
        let now_ms = self.clock.now_ms();

        let mut dirty_marked = 0usize;
        for signal in &signals {
            dirty_marked += self.on_price_signal(signal, now_ms);
        }
        for log in &logs {
            dirty_marked += self.on_log(log, now_ms);
        }

        let promoted = self.dirty.snapshot_candidates(self.config.c_block);
        if promoted.len() >= self.config.c_block {
            let err = PipelineError::BudgetExceeded { budget: "C_block" };
            tracing::debug!(error = %err, "promotion budget saturated, remainder deferred to next block");
        }
        let mut wave = Vec::with_capacity(promoted.len());
        for addr in &promoted {
            let entry = self.dirty.consume(*addr);
            let borrower = self.candidates.get(*addr);
            let debt_base = borrower.map(|b| b.total_debt_base).unwrap_or(0);

            // A position-mutating on-chain event (debt or collateral just
            // changed) invalidates the stale cached HF outright, so the
            // near-band filter always lets a fresh call through for it.
            // Only signal-driven and housekeeping promotions carry the
            // cached reading forward, preserving the filter's savings there.
            let position_changed = entry
                .as_ref()
                .map(|e| {
                    e.reasons().iter().any(|r| {
                        matches!(
                            r,
                            Reason::BorrowEvent
                                | Reason::RepayEvent
                                | Reason::CollateralEvent
                                | Reason::LiquidationEvent
                        )
                    })
                })
                .unwrap_or(false);
            let last_hf = if position_changed {
                None
            } else {
                borrower.and_then(|b| b.last_hf)
            };

            wave.push(VerifyCandidate {
                addr: *addr,
                last_hf,
                debt_base,
                projected_hf: None,
                signal_strength: 1,
            });
        }

        let results = self
            .verifier
            .verify_wave(wave, Some(block.number), now_ms, oracle, fallback)
            .await;

        let mut verified = 0usize;
        let mut admitted_hot = 0usize;
        let mut admitted_warm = 0usize;

        for (addr, outcome) in results {
            match outcome {
                VerifyOutcome::Verified(reading) => {
                    verified += 1;
                    let protected = self.executor.in_flight_snapshot();
                    self.candidates.insert_if_absent(addr, &protected);
                    self.candidates.with_mut(addr, |b| {
                        b.apply_verified_hf(reading.hf, block.number, now_ms);
                        b.total_debt_base = reading.debt_base;
                        b.total_collateral_base = reading.collateral_base;
                    });

                    self.insertion_counter += 1;
                    let admission = self.queues.admit(
                        addr,
                        reading.hf,
                        block.number,
                        reading.debt_base,
                        None,
                        None,
                        self.insertion_counter,
                    );
                    match admission {
                        Some((Tier::Hot, evicted)) => {
                            admitted_hot += 1;
                            if let Some(evicted_addr) = evicted {
                                self.dirty.mark(evicted_addr, Reason::PeriodicSweep, now_ms);
                            }
                        }
                        Some((Tier::Warm, evicted)) => {
                            admitted_warm += 1;
                            if let Some(evicted_addr) = evicted {
                                self.dirty.mark(evicted_addr, Reason::PeriodicSweep, now_ms);
                            }
                        }
                        None => {}
                    }
                }
                VerifyOutcome::Failed(FailReason::Revert) => {
                    let err = PipelineError::VerificationRevert {
                        user: addr.to_string(),
                        reason: "health factor call reverted".to_string(),
                    };
                    tracing::warn!(error = %err, "evicting user after a verification revert");
                    self.candidates.remove(addr);
                }
                VerifyOutcome::Failed(FailReason::Rpc) => {
                    let err = PipelineError::RpcTransient {
                        endpoint: "oracle".to_string(),
                        message: "health factor query failed".to_string(),
                    };
                    tracing::warn!(error = %err, "re-marking user dirty after a transient rpc failure");
                    self.dirty.mark(addr, Reason::PeriodicSweep, now_ms);
                }
            }
        }

        let candidates = &self.candidates;
        let is_live = |addr: Address| candidates.contains(addr);

        let mut to_execute = Vec::with_capacity(self.config.worker_pool_width);
        while to_execute.len() < self.config.worker_pool_width {
            match self.queues.pop_hot_only(&is_live) {
                Some(entry) => to_execute.push(entry),
                None => break,
            }
        }
        while to_execute.len() < self.config.worker_pool_width {
            match self.queues.pop_warm_only(&is_live) {
                Some(entry) => to_execute.push(entry),
                None => break,
            }
        }

        let requests: Vec<ExecutionRequest> = to_execute
            .iter()
            .map(|entry| ExecutionRequest {
                user: entry.user,
                block_received_ms: now_ms,
                configured_debt_asset: None,
                exposures: self.build_exposures(entry.user, now_ms),
                total_debt_base: entry.total_debt_base,
                last_known_hf: entry.hf,
            })
            .collect();

        let executor = Arc::clone(&self.executor);
        let handles = requests
            .into_iter()
            .map(|req| {
                let executor = Arc::clone(&executor);
                async move { executor.execute(req).await }
            });
        let results = futures::future::join_all(handles).await;

        let executed = results.len();
        for (entry, result) in to_execute.iter().zip(results.iter()) {
            self.record_decision(entry.user, block.number, now_ms, &result.outcome);
            self.candidates
                .with_mut(entry.user, |b| b.extend_cooldown(result.new_cooldown_until_ms));
        }

        self.dirty.expire(now_ms, self.config.dirty_expiry_scan);
        self.verifier.prune_user_dedup(now_ms);
        self.candidates
            .prune_stale_first_seen(block.number, self.config.k_first_blocks);
        self.decisions.expire(now_ms, self.config.decision_ttl_ms);

        self.telemetry.counter("dirty_marked", dirty_marked as u64);
        self.telemetry.counter("verified", verified as u64);
        self.telemetry
            .counter("admitted", (admitted_hot + admitted_warm) as u64);
        self.telemetry.counter("executed", executed as u64);

        Ok(BlockSummary {
            dirty_marked,
            promoted: promoted.len(),
            verified,
            admitted_hot,
            admitted_warm,
            executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use budget::ReversionBudget;
    use common::clock::ManualClock;
    use domain::hf::Hf;
    use events::EventKind;
    use executor::ExecutorConfig;
    use fees::FeeConfig;
    use interfaces::health_factor_oracle::mock::MockHealthFactorOracle;
    use interfaces::telemetry::TracingTelemetry;
    use interfaces::tx_sender::mock::MockTxSender;
    use interfaces::{HfReading, PriceSource};

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    fn topic(b: u8) -> alloy_primitives::B256 {
        alloy_primitives::B256::from([b; 32])
    }

    fn make_pipeline() -> Pipeline {
        let clock = Arc::new(ManualClock::new(1_000));
        let oracle = Arc::new(MockHealthFactorOracle::new());
        let sender = Arc::new(MockTxSender::new());
        let budget = Arc::new(ReversionBudget::new(10, 1_000));
        let executor = Arc::new(FastPathExecutor::new(
            ExecutorConfig::default(),
            clock.clone(),
            oracle,
            sender,
            budget,
            FeeConfig::default(),
        ));
        let topics = TopicRegistry::new().register(topic(1), EventKind::Borrow);
        let mut symbols = HashMap::new();
        symbols.insert("WETH".to_string(), addr(100));

        Pipeline::new(
            AppConfig::default(),
            clock,
            executor,
            Arc::new(TracingTelemetry),
            topics,
            addr(255),
            symbols,
        )
    }

    #[test]
    fn on_log_marks_borrower_dirty_and_touches_reserve() {
        let mut pipeline = make_pipeline();
        let log = DecodedLog {
            topic0: topic(1),
            address: addr(9),
            block_number: 1,
            user: Some(addr(1)),
            on_behalf_of: None,
            reserve: Some(addr(100)),
        };
        let marked = pipeline.on_log(&log, 1_000);
        assert_eq!(marked, 1);
        assert!(pipeline.dirty_count() > 0);
        assert!(pipeline.candidate_count() > 0);
    }

    #[test]
    fn on_price_signal_marks_exposed_borrowers() {
        let mut pipeline = make_pipeline();
        let log = DecodedLog {
            topic0: topic(1),
            address: addr(9),
            block_number: 1,
            user: Some(addr(1)),
            on_behalf_of: None,
            reserve: Some(addr(100)),
        };
        pipeline.on_log(&log, 1_000);

        let signal = PriceSignal {
            source: PriceSource::Pyth,
            symbol: "WETH".to_string(),
            price_scaled_1e18: 2_000,
            ts_ms: 10_000,
            delta_pct: Some(0.05),
        };
        let marked = pipeline.on_price_signal(&signal, 10_000);
        assert_eq!(marked, 1);
    }

    #[tokio::test]
    async fn process_block_promotes_verifies_and_admits_a_liquidatable_user() {
        let mut pipeline = make_pipeline();
        let log = DecodedLog {
            topic0: topic(1),
            address: addr(9),
            block_number: 1,
            user: Some(addr(1)),
            on_behalf_of: None,
            reserve: Some(addr(100)),
        };
        pipeline.on_log(&log, 1_000);

        let oracle = MockHealthFactorOracle::new();
        oracle.seed(
            addr(1),
            HfReading {
                hf: Hf::from_f64(0.9),
                collateral_base: 200,
                debt_base: 1_000,
                lt_bps_avg: 8_000,
            },
        );

        let block = Block {
            number: 1,
            hash: Default::default(),
            timestamp: 1,
        };
        let summary = pipeline
            .process_block(block, Vec::new(), Vec::new(), &oracle, None)
            .await
            .unwrap();

        assert_eq!(summary.promoted, 1);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.admitted_hot, 1);
        assert_eq!(summary.executed, 1);
    }

    #[test]
    fn on_competitor_liquidation_for_unwatched_user_is_not_in_watch_set() {
        let mut pipeline = make_pipeline();
        let event = CompetitorLiquidation {
            user: addr(42),
            competitor: addr(7),
            event_block: 5,
            event_ts_ms: 5_000,
        };
        let result = pipeline.on_competitor_liquidation(event, 5_000);
        assert_eq!(
            result.classification,
            miss_classifier::Classification::NotInWatchSet
        );
    }

    #[test]
    fn on_reorg_redirties_in_flight_users() {
        let mut pipeline = make_pipeline();
        let reorg = Reorg { depth: 2 };
        pipeline.on_reorg(reorg, 100, 1_000);
        // No in-flight users in this test: a no-op, but must not panic.
        assert_eq!(pipeline.dirty_count(), 0);
    }
}
