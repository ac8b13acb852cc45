//! Per-user Fast-Path Executor state machine (§4.8). A single active
//! instance per user is enforced by `FastPathExecutor::execute`'s in-flight
//! guard; concurrent users proceed independently, bounded by whatever
//! worker-pool width the orchestrator imposes on top of this type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use budget::ReversionBudget;
use common::clock::Clock;
use common::error::PipelineError;
use domain::hf::Hf;
use domain::latency::LatencyRecord;
use fees::{FeeConfig, FeeReplacementState};
use interfaces::{HealthFactorOracle, SignedTx, TxPlan, TxSender, TxSenderError};
use parking_lot::Mutex;

use crate::plan::{build_plan, PlanConfig};
use crate::types::{ExecutionOutcome, ExecutorState, LiquidationPlan, ReserveExposure, SkipReason};

#[derive(Clone, Copy, Debug)]
pub struct ExecutorConfig {
    pub plan: PlanConfig,
    pub eps_opt: f64,
    pub cooldown_ms: u64,
    pub l_warn_ms: u64,
    pub b_rbf_ms: u64,
    pub n_rbf: u32,
    pub base_fee_gwei: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            plan: PlanConfig::default(),
            eps_opt: 0.0005,
            cooldown_ms: 60_000,
            l_warn_ms: 180,
            b_rbf_ms: 500,
            n_rbf: 3,
            base_fee_gwei: 10.0,
        }
    }
}

pub struct ExecutionRequest {
    pub user: Address,
    pub block_received_ms: u64,
    pub configured_debt_asset: Option<Address>,
    pub exposures: Vec<ReserveExposure>,
    pub total_debt_base: u128,
    /// HF reading that earned this user its place in the priority queue,
    /// predating this attempt's own fresh verification call. Drives the
    /// optimistic-dispatch eligibility check (§4.8 step 5) *before* that
    /// fresh read comes back.
    pub last_known_hf: Hf,
}

#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub outcome: ExecutionOutcome,
    pub latency: LatencyRecord,
    pub new_cooldown_until_ms: u64,
}

/// Drives one user through `Idle -> ... -> Settled/Failed`, enforcing the
/// single-active-instance-per-user concurrency contract. Current state per
/// in-flight user is tracked in `in_flight`'s map value, not just its key
/// presence, so the state actually named by §4.8 is the thing callers (and
/// tests) observe rather than a derived guess.
pub struct FastPathExecutor {
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
    oracle: Arc<dyn HealthFactorOracle>,
    tx_sender: Arc<dyn TxSender>,
    budget: Arc<ReversionBudget>,
    fee_config: FeeConfig,
    in_flight: Arc<Mutex<HashMap<Address, ExecutorState>>>,
}

impl FastPathExecutor {
    pub fn new(
        config: ExecutorConfig,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn HealthFactorOracle>,
        tx_sender: Arc<dyn TxSender>,
        budget: Arc<ReversionBudget>,
        fee_config: FeeConfig,
    ) -> Self {
        Self {
            config,
            clock,
            oracle,
            tx_sender,
            budget,
            fee_config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn try_admit(&self, user: Address) -> bool {
        let mut guard = self.in_flight.lock();
        if guard.contains_key(&user) {
            false
        } else {
            guard.insert(user, ExecutorState::Idle);
            true
        }
    }

    fn release(&self, user: Address) {
        self.in_flight.lock().remove(&user);
    }

    fn set_state(&self, user: Address, state: ExecutorState) {
        if let Some(slot) = self.in_flight.lock().get_mut(&user) {
            *slot = state;
        }
    }

    /// Users with a currently active (non-Idle) state machine instance.
    /// The orchestrator uses this to protect Candidate Store entries from
    /// eviction (invariant 8) and to requeue in-flight users as dirty on
    /// reorg rather than silently dropping them mid-flight.
    pub fn in_flight_snapshot(&self) -> HashSet<Address> {
        self.in_flight.lock().keys().copied().collect()
    }

    /// The current `ExecutorState` for a user with an active instance, if
    /// any. Mostly useful to tests and operator tooling that want to
    /// observe a submission sitting in `Pending` while the RBF watchdog
    /// runs in the background.
    pub fn state_of(&self, user: Address) -> Option<ExecutorState> {
        self.in_flight.lock().get(&user).copied()
    }

    pub async fn execute(&self, req: ExecutionRequest) -> ExecutionResult {
        if !self.try_admit(req.user) {
            return ExecutionResult {
                outcome: ExecutionOutcome::Dropped,
                latency: LatencyRecord::starting_at(req.block_received_ms),
                new_cooldown_until_ms: 0,
            };
        }

        self.drive(&req).await
    }

    /// `Idle -> VerifyingFresh | Planning`: decides, before any fresh call
    /// is made, whether this attempt qualifies for optimistic dispatch
    /// (§4.8 step 5). Every terminal branch below releases the in-flight
    /// guard itself except a successful submission, which hands that
    /// responsibility to the RBF watchdog it spawns.
    async fn drive(&self, req: &ExecutionRequest) -> ExecutionResult {
        let latency = LatencyRecord::starting_at(req.block_received_ms);
        let now_ms = self.clock.now_ms();

        let optimistic = req.last_known_hf.is_liquidatable()
            && req.last_known_hf.as_f64() <= 1.0 - self.config.eps_opt
            && self.budget.has_headroom(now_ms);

        if optimistic {
            return self.drive_optimistic(req, now_ms, latency).await;
        }

        self.set_state(req.user, ExecutorState::VerifyingFresh);
        let fresh = match self.oracle.get_user_account(req.user, None).await {
            Ok(reading) => reading,
            Err(_) => return self.finish_skip(req.user, SkipReason::InvalidPlan, latency),
        };
        let mut latency = latency;
        latency.candidate_detected_ms = Some(self.clock.now_ms());

        if !fresh.hf.is_liquidatable() {
            return self.finish_skip(req.user, SkipReason::CriticalSkippedHfRecovery, latency);
        }

        self.drive_from_hf(req, fresh.hf, now_ms, latency, false).await
    }

    /// Optimistic path: plans and signs off the last-known (pre-fresh-call)
    /// HF, then submits and re-verifies concurrently instead of gating
    /// submission on the verification result — the actual race step 5
    /// describes, rather than a flag that only renames an already-serial
    /// sequence.
    async fn drive_optimistic(
        &self,
        req: &ExecutionRequest,
        now_ms: u64,
        mut latency: LatencyRecord,
    ) -> ExecutionResult {
        latency.candidate_detected_ms = Some(now_ms);
        self.drive_from_hf(req, req.last_known_hf, now_ms, latency, true).await
    }

    /// `Planning -> AwaitingFee -> Signing -> Submitting`, shared by both
    /// the verified and optimistic paths; they differ only in which HF
    /// reading seeds the plan and in how submission races verification.
    async fn drive_from_hf(
        &self,
        req: &ExecutionRequest,
        hf: Hf,
        now_ms: u64,
        mut latency: LatencyRecord,
        optimistic: bool,
    ) -> ExecutionResult {
        self.set_state(req.user, ExecutorState::Planning);
        let plan = match build_plan(
            &self.config.plan,
            req.configured_debt_asset,
            &req.exposures,
            hf,
            req.total_debt_base,
            now_ms,
        ) {
            Ok(plan) => plan,
            Err(reason) => return self.finish_skip(req.user, reason, latency),
        };

        if plan.estimated_profit_usd < self.config.plan.profit_min_usd {
            return self.finish_skip(req.user, SkipReason::CriticalSkippedProfit, latency);
        }
        latency.plan_ready_ms = Some(self.clock.now_ms());

        self.set_state(req.user, ExecutorState::AwaitingFee);
        let fee_state = FeeReplacementState::start(self.fee_config, self.config.base_fee_gwei);
        let tx_plan = self.build_tx_plan(req.user, &plan, &fee_state);

        self.set_state(req.user, ExecutorState::Signing);
        let signed = match self.sign(tx_plan.clone()).await {
            Ok(s) => s,
            Err(_) => return self.finish_skip(req.user, SkipReason::InvalidPlan, latency),
        };
        latency.tx_signed_ms = Some(self.clock.now_ms());

        self.set_state(req.user, ExecutorState::Submitting);

        let submit_result = if optimistic {
            // Step 5 (§4.8): submit and re-verify concurrently instead of
            // waiting for the verification call to return first. A
            // recovered reading that lands after the broadcast can no
            // longer pull the transaction back; the Reversion Budget is
            // what prices that risk, not a late check here.
            let submit_fut = self.tx_sender.submit_private(signed.clone());
            let verify_fut = self.oracle.get_user_account(req.user, None);
            let (submit_result, verify_result) = tokio::join!(submit_fut, verify_fut);
            if let Ok(reading) = verify_result {
                if !reading.hf.is_liquidatable() {
                    tracing::debug!(
                        user = %req.user,
                        "hf recovered after an optimistic submission had already raced ahead of it"
                    );
                }
            }
            latency.submitted_private_ms = Some(self.clock.now_ms());
            submit_result
        } else {
            self.tx_sender.submit_private(signed.clone()).await
        };
        latency.tx_broadcast_ms = Some(self.clock.now_ms());

        self.finish_submission(req.user, signed, submit_result, fee_state, tx_plan, now_ms, latency, optimistic)
            .await
    }

    fn build_tx_plan(&self, user: Address, plan: &LiquidationPlan, fee_state: &FeeReplacementState) -> TxPlan {
        TxPlan {
            user,
            debt_asset: plan.debt_asset,
            collateral_asset: plan.collateral_asset,
            debt_to_cover: plan.debt_to_cover_base,
            max_fee_gwei: fee_state.current().max_fee_gwei,
            priority_fee_gwei: fee_state.current().priority_fee_gwei,
        }
    }

    async fn sign(&self, tx_plan: TxPlan) -> Result<SignedTx, TxSenderError> {
        let unsigned = self.tx_sender.build(tx_plan).await?;
        self.tx_sender.sign(unsigned).await
    }

    /// `Submitting -> Pending -> Settled/Failed`. A transient private-relay
    /// error gets one fallback attempt over the public mempool
    /// (`submit_public_race`) before the attempt is given up on; a
    /// successful broadcast moves to `Pending` and hands the in-flight
    /// guard to a background RBF watchdog rather than releasing it here.
    async fn finish_submission(
        &self,
        user: Address,
        signed: SignedTx,
        submit_result: Result<B256, TxSenderError>,
        fee_state: FeeReplacementState,
        tx_plan: TxPlan,
        now_ms: u64,
        latency: LatencyRecord,
        optimistic: bool,
    ) -> ExecutionResult {
        let cooldown_until = now_ms + self.config.cooldown_ms;

        let submit_result = match submit_result {
            Err(TxSenderError::RpcTransient(_)) => {
                self.tx_sender.submit_public_race(signed, &[]).await
            }
            other => other,
        };

        match submit_result {
            Ok(tx_hash) => {
                let elapsed = latency.detect_to_broadcast_ms().unwrap_or(0);
                if elapsed > self.config.l_warn_ms {
                    tracing::warn!(
                        user = %user,
                        elapsed_ms = elapsed,
                        budget_ms = self.config.l_warn_ms,
                        "executor latency budget exceeded"
                    );
                }
                self.set_state(user, ExecutorState::Pending);
                self.spawn_rbf_watchdog(user, tx_hash, tx_plan, fee_state);
                ExecutionResult {
                    outcome: ExecutionOutcome::Submitted {
                        tx_hash,
                        gas_price_gwei: fee_state.current().max_fee_gwei,
                    },
                    latency,
                    new_cooldown_until_ms: cooldown_until,
                }
            }
            Err(TxSenderError::Revert(reason)) => {
                if optimistic {
                    self.budget.record_optimistic_revert(now_ms);
                }
                let err = PipelineError::SubmissionRevert {
                    user: user.to_string(),
                    reason,
                };
                tracing::warn!(error = %err, optimistic, "submission reverted");
                self.finish_skip(user, SkipReason::InvalidPlan, latency)
            }
            Err(TxSenderError::RpcTransient(_)) => self.finish_skip(user, SkipReason::InvalidPlan, latency),
        }
    }

    /// Background RBF loop for the `Pending` state (§4.8 step 6, §4.9):
    /// bumps the fee and re-signs/replaces on a fixed `b_rbf_ms` cadence,
    /// up to `n_rbf` attempts, releasing the in-flight guard when it stops.
    /// Nothing in this repository's boundary traits reports transaction
    /// inclusion, so the loop cannot stop early on "already included" the
    /// way a production watchdog would — it runs its full attempt budget
    /// (or until a build/sign/replace call itself fails) and then gives up
    /// on replacing further, which is disclosed as a known simplification
    /// rather than a silent gap.
    fn spawn_rbf_watchdog(&self, user: Address, tx_hash: B256, tx_plan: TxPlan, mut fee_state: FeeReplacementState) {
        let tx_sender = self.tx_sender.clone();
        let in_flight = self.in_flight.clone();
        let base_fee_gwei = self.config.base_fee_gwei;
        let b_rbf_ms = self.config.b_rbf_ms;
        let n_rbf = self.config.n_rbf;

        tokio::spawn(async move {
            let mut current_hash = tx_hash;
            for attempt in 1..=n_rbf {
                tokio::time::sleep(Duration::from_millis(b_rbf_ms)).await;

                let bumped = fee_state.bump(attempt, base_fee_gwei);
                let mut next_plan = tx_plan.clone();
                next_plan.max_fee_gwei = bumped.max_fee_gwei;
                next_plan.priority_fee_gwei = bumped.priority_fee_gwei;

                let Ok(unsigned) = tx_sender.build(next_plan).await else {
                    break;
                };
                let Ok(signed) = tx_sender.sign(unsigned).await else {
                    break;
                };
                match tx_sender.replace(current_hash, signed).await {
                    Ok(new_hash) => current_hash = new_hash,
                    Err(_) => break,
                }
            }
            in_flight.lock().remove(&user);
        });
    }

    fn finish_skip(&self, user: Address, reason: SkipReason, latency: LatencyRecord) -> ExecutionResult {
        let now_ms = self.clock.now_ms();
        self.set_state(user, ExecutorState::Failed);
        self.release(user);
        ExecutionResult {
            outcome: ExecutionOutcome::Skipped { reason },
            latency,
            new_cooldown_until_ms: now_ms + self.config.cooldown_ms,
        }
    }
}
