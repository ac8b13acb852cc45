//! Property-based checks for the universal invariants, grounded on the
//! teacher's `proptest! { #![proptest_config(ProptestConfig::with_cases(1000))] }`
//! idiom (`backend/src/planner/sizing.rs`). Each test exercises the real
//! component directly rather than the full pipeline, since these properties
//! are owned by a single collaborator.

use std::collections::HashSet;

use alloy_primitives::Address;
use budget::ReversionBudget;
use candidates::CandidateStore;
use common::clock::ManualClock;
use dirty_set::DirtySet;
use domain::decision::{DecisionKind, ExecutionDecision};
use domain::dirty::Reason;
use domain::hf::Hf;
use executor::{ExecutionRequest, ExecutorConfig, FastPathExecutor, ReserveExposure};
use fees::FeeConfig;
use interfaces::health_factor_oracle::mock::MockHealthFactorOracle;
use interfaces::tx_sender::mock::MockTxSender;
use interfaces::HfReading;
use miss_classifier::{classify, CompetitorLiquidation, MissClassifierConfig};
use proptest::prelude::*;
use queues::{PriorityQueues, QueueConfig};
use signal_gate::{SignalGate, SignalGateConfig};
use std::sync::Arc;
use verifier::{Candidate as VerifyCandidate, Verifier, VerifierConfig};

fn addr(b: u8) -> Address {
    Address::from([b; 20])
}

fn reasons() -> impl Strategy<Value = Reason> {
    prop_oneof![
        Just(Reason::PriceMove),
        Just(Reason::ReserveConfigChange),
        Just(Reason::BorrowEvent),
        Just(Reason::RepayEvent),
        Just(Reason::LiquidationEvent),
        Just(Reason::CollateralEvent),
        Just(Reason::Reorg),
        Just(Reason::PeriodicSweep),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Invariant 1 & 2: a verification wave never issues more than `Q_block`
    /// calls, and a given user never appears twice among the results.
    #[test]
    fn verifier_respects_per_block_budget_and_user_uniqueness(
        user_count in 1usize..30,
        duplicate_first in any::<bool>(),
        q_block in 1u32..20,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let mut config = VerifierConfig::default();
            config.q_block = q_block;
            let mut verifier = Verifier::new(config);
            verifier.on_new_block(1);

            let oracle = MockHealthFactorOracle::new();
            let mut wave = Vec::new();
            for i in 0..user_count {
                let a = addr((i % 255) as u8 + 1);
                oracle.seed(a, HfReading {
                    hf: Hf::from_f64(0.9),
                    collateral_base: 200,
                    debt_base: 100,
                    lt_bps_avg: 8_000,
                });
                wave.push(VerifyCandidate {
                    addr: a,
                    last_hf: None,
                    debt_base: 100,
                    projected_hf: None,
                    signal_strength: 1,
                });
            }
            if duplicate_first && !wave.is_empty() {
                wave.push(wave[0]);
            }

            let results = verifier.verify_wave(wave, Some(1), 0, &oracle, None).await;

            prop_assert!(results.len() as u32 <= q_block);

            let mut seen = HashSet::new();
            for (a, _) in &results {
                prop_assert!(seen.insert(*a), "user verified twice in one wave");
            }
            Ok(())
        })?;
    }

    /// Invariant 6: any sequence of pops from a priority queue yields
    /// non-decreasing priorities (the lexicographic order the queue exists
    /// to enforce).
    #[test]
    fn queue_pops_are_monotone_non_decreasing(
        entries in prop::collection::vec(
            (0.5f64..1.5, 0u128..10_000u128),
            1..50,
        )
    ) {
        let mut queues = PriorityQueues::new(QueueConfig {
            h_hot: Hf::from_f64(1.5),
            h_warm: Hf::from_f64(1.5),
            m_hot: 10_000,
            m_warm: 10_000,
            min_debt_base: 0,
        });

        for (i, (hf, debt)) in entries.iter().enumerate() {
            queues.admit(
                addr((i % 255) as u8 + 1),
                Hf::from_f64(*hf),
                1,
                *debt,
                None,
                None,
                i as u64,
            );
        }

        let mut last = None;
        while let Some(entry) = queues.pop(&|_| true) {
            if let Some(prev) = last {
                prop_assert!(
                    prev <= entry.priority,
                    "pop order regressed: {:?} then {:?}",
                    prev,
                    entry.priority
                );
            }
            last = Some(entry.priority);
        }
    }

    /// Invariant 7: mark then consume then isDirty is false, with no
    /// intervening mark.
    #[test]
    fn dirty_set_mark_consume_is_dirty_round_trips(
        which_addr in 1u8..10,
        reason in reasons(),
        mark_ms in 0u64..1_000_000,
    ) {
        let set = DirtySet::new(90_000);
        let a = addr(which_addr);
        set.mark(a, reason, mark_ms);
        prop_assert!(set.is_dirty(a));
        let entry = set.consume(a);
        prop_assert!(entry.is_some());
        prop_assert!(!set.is_dirty(a));
    }

    /// Invariant 8: eviction never removes a protected address, regardless
    /// of how many more insertions are attempted at capacity.
    #[test]
    fn candidate_store_never_evicts_a_protected_user(
        extra_inserts in 1u8..20,
    ) {
        let store = CandidateStore::new(1, 5);
        let mut protected = HashSet::new();
        protected.insert(addr(1));
        store.insert_if_absent(addr(1), &protected);

        for i in 0..extra_inserts {
            store.insert_if_absent(addr(i.wrapping_add(2)), &protected);
            prop_assert!(store.contains(addr(1)), "protected user evicted");
        }
    }

    /// Invariant 4: the count of optimistic reverts recorded against the
    /// daily budget never exceeds `R_day`, however many liquidatable,
    /// always-reverting submissions are driven through the executor.
    #[test]
    fn reversion_budget_never_exceeds_daily_cap(
        r_day in 1u32..10,
        attempts in 1usize..30,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let clock = Arc::new(ManualClock::new(1_000));
            let oracle = Arc::new(MockHealthFactorOracle::new());
            let sender = Arc::new(MockTxSender::new());
            *sender.force_revert.lock() = true;
            let budget = Arc::new(ReversionBudget::new(r_day, 1_000));
            let executor = FastPathExecutor::new(
                ExecutorConfig::default(),
                clock,
                oracle.clone(),
                sender,
                budget.clone(),
                FeeConfig::default(),
            );

            let exposures = vec![
                ReserveExposure {
                    asset: addr(50),
                    debt_usd: 100.0,
                    collateral_usd: 0.0,
                    usage_as_collateral: false,
                    price_updated_at_ms: 1_000,
                },
                ReserveExposure {
                    asset: addr(51),
                    debt_usd: 0.0,
                    collateral_usd: 200.0,
                    usage_as_collateral: true,
                    price_updated_at_ms: 1_000,
                },
            ];

            for i in 0..attempts {
                let user = addr((i % 255) as u8 + 1);
                oracle.seed(user, HfReading {
                    hf: Hf::from_f64(0.5),
                    collateral_base: 200,
                    debt_base: 100,
                    lt_bps_avg: 8_000,
                });
                executor
                    .execute(ExecutionRequest {
                        user,
                        block_received_ms: 1_000,
                        configured_debt_asset: None,
                        exposures: exposures.clone(),
                        total_debt_base: 100,
                        last_known_hf: Hf::from_f64(0.5),
                    })
                    .await;
            }

            prop_assert!(budget.used_today(1_000) <= r_day);
            Ok(())
        })?;
    }

    /// Invariant 5: no two accepted signals for the same (symbol, source)
    /// land inside each other's debounce window.
    #[test]
    fn signal_gate_never_accepts_two_signals_inside_debounce_window(
        deltas in prop::collection::vec(0u64..20_000, 2..20),
    ) {
        let gate = SignalGate::new(SignalGateConfig::default());
        let mut ts = 0u64;
        let mut last_accepted: Option<u64> = None;

        for delta in deltas {
            ts += delta;
            let signal = interfaces::PriceSignal {
                source: interfaces::PriceSource::Pyth,
                symbol: "WETH".to_string(),
                price_scaled_1e18: 2_000 + ts as u128,
                ts_ms: ts,
                delta_pct: Some(0.05),
            };
            if gate.evaluate(&signal).is_ok() {
                if let Some(prev) = last_accepted {
                    prop_assert!(
                        ts.saturating_sub(prev) >= SignalGateConfig::default().debounce_per_asset_ms,
                        "two accepted signals inside the debounce window"
                    );
                }
                last_accepted = Some(ts);
            }
        }
    }

    /// Invariant 10: classifying the same competitor liquidation twice
    /// yields the same classification both times — exactly one verdict per
    /// event, with no hidden state making the function non-deterministic.
    #[test]
    fn miss_classifier_is_deterministic_for_identical_inputs(
        event_block in 0u64..1000,
        first_seen in prop::option::of(0u64..1000),
        has_recent_attempt in any::<bool>(),
        gas_price_x100 in 0u32..10_000,
    ) {
        let config = MissClassifierConfig::default();
        let event = CompetitorLiquidation {
            user: addr(9),
            competitor: addr(2),
            event_block,
            event_ts_ms: 0,
        };
        let decision = ExecutionDecision {
            user: addr(9),
            timestamp_ms: 0,
            block_number: event_block,
            kind: DecisionKind::Attempt,
            reason: None,
            gas_price_gwei: Some(gas_price_x100 as f64 / 100.0),
            profit_estimate_usd: None,
            tx_hash: None,
        };
        let recent_decision = if has_recent_attempt { Some(&decision) } else { None };

        let first = classify(&config, addr(1), &event, true, first_seen, recent_decision);
        let second = classify(&config, addr(1), &event, true, first_seen, recent_decision);

        prop_assert_eq!(first, second);
    }
}
