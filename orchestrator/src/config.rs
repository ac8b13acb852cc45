use domain::hf::Hf;

use executor::ExecutorConfig;
use fees::FeeConfig;
use queues::QueueConfig;
use signal_gate::SignalGateConfig;
use verifier::VerifierConfig;

/// Built once at boot from the environment and passed down as immutable
/// shared state; no component reaches for a global. Mirrors the teacher's
/// single `AppConfig::from_env()` struct, generalized from the scheduler's
/// DRR/batch knobs to this pipeline's per-component config blocks.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub queues: QueueConfig,
    pub verifier: VerifierConfig,
    pub exec: ExecutorConfig,
    pub fee: FeeConfig,
    pub signals: SignalGateConfig,

    /// Candidate Store capacity (`N_cand`).
    pub candidates_capacity: usize,
    /// Per-borrower bounded reserve-exposure cardinality (`K`).
    pub candidates_reserve_cap: usize,

    /// Daily reversion-budget ceiling (`R_day`).
    pub reversion_budget_per_day: u32,

    /// Dirty Set TTL, milliseconds.
    pub ttl_dirty_ms: u64,
    /// Per-block amortized expiry scan bound.
    pub dirty_expiry_scan: usize,
    /// Per-block candidate promotion budget (`C_block`).
    pub c_block: usize,

    /// `firstSeenLiquidatableBlock` retention horizon, in blocks (`K_first`).
    pub k_first_blocks: u64,
    /// Transient-miss window, in blocks, for the Miss Classifier.
    pub transient_blocks: u64,
    /// Gas-outbid reclassification threshold, gwei.
    pub gas_outbid_threshold_gwei: f64,
    /// Global Execution Decision ring-buffer depth, across every user
    /// (§6: 5000 entries).
    pub decision_history_capacity: usize,
    /// TTL for an Execution Decision to remain eligible for Miss Classifier
    /// lookup, milliseconds (fixed at 5 min by the specification).
    pub decision_ttl_ms: u64,

    /// Default reorg-invalidation depth when a `Reorg` carries no explicit
    /// depth (ambient: not named by the distilled spec surface).
    pub reorg_default_depth: u64,
    /// `true` for structured JSON logs (production), `false` for pretty
    /// local-dev output.
    pub log_json: bool,
    /// Graceful-shutdown drain deadline, milliseconds (§5: 5 s).
    pub shutdown_drain_deadline_ms: u64,

    /// Worker-pool width for the Fast-Path Executor: min of the configured
    /// write-endpoint count and an operator cap (default 4).
    pub worker_pool_width: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queues: QueueConfig::default(),
            verifier: VerifierConfig::default(),
            exec: ExecutorConfig::default(),
            fee: FeeConfig::default(),
            signals: SignalGateConfig::default(),

            candidates_capacity: 5_000,
            candidates_reserve_cap: 5,

            reversion_budget_per_day: 10,

            ttl_dirty_ms: 90_000,
            dirty_expiry_scan: 256,
            c_block: 60,

            k_first_blocks: 1_000,
            transient_blocks: 3,
            gas_outbid_threshold_gwei: 50.0,
            decision_history_capacity: 5_000,
            decision_ttl_ms: 5 * 60_000,

            reorg_default_depth: 1,
            log_json: false,
            shutdown_drain_deadline_ms: 5_000,

            worker_pool_width: 4,
        }
    }
}

impl AppConfig {
    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparsable. Mirrors the teacher's
    /// `AppConfig::from_env` fallback-on-parse-error style.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ORCH_WORKER_POOL_WIDTH") {
            if let Ok(parsed) = v.parse() {
                cfg.worker_pool_width = parsed;
            }
        }
        if let Ok(v) = std::env::var("ORCH_CANDIDATES_CAPACITY") {
            if let Ok(parsed) = v.parse() {
                cfg.candidates_capacity = parsed;
            }
        }
        if let Ok(v) = std::env::var("ORCH_REVERSION_BUDGET_PER_DAY") {
            if let Ok(parsed) = v.parse() {
                cfg.reversion_budget_per_day = parsed;
            }
        }
        if let Ok(v) = std::env::var("ORCH_LOG_JSON") {
            cfg.log_json = v == "1" || v.eq_ignore_ascii_case("true");
        }

        cfg
    }

    pub fn h_hot(&self) -> Hf {
        self.queues.h_hot
    }
}
