use thiserror::Error;

/// Domain error taxonomy shared across the candidate pipeline.
///
/// Call sites generally propagate these wrapped in `anyhow::Error` (via `?`
/// or `.context(...)`); components that need to branch on the error kind
/// recover it with `anyhow::Error::downcast_ref::<PipelineError>()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Timeout, transport failure, or a 5xx from an RPC endpoint. Retried
    /// once against a fallback endpoint by the caller; terminal failures are
    /// recorded as `Failed{rpc}` without touching user state.
    #[error("transient rpc error on {endpoint}: {message}")]
    RpcTransient { endpoint: String, message: String },

    /// 4xx or invalid-method response. The endpoint is demoted from the
    /// active pool until a health re-probe passes.
    #[error("permanent rpc error on {endpoint}: {message}")]
    RpcPermanent { endpoint: String, message: String },

    /// An on-chain call reverted while verifying a user's health factor.
    /// Terminal: the user is evicted from the Candidate Store.
    #[error("revert during verification for {user}: {reason}")]
    VerificationRevert { user: String, reason: String },

    /// An on-chain revert during submission. Counted against the Reversion
    /// Budget only when the submission was optimistic.
    #[error("revert during submission for {user}: {reason}")]
    SubmissionRevert { user: String, reason: String },

    /// A per-block or per-wave budget was exhausted. Soft failure: the
    /// orchestrator defers the remaining work to the next block.
    #[error("budget exceeded: {budget}")]
    BudgetExceeded { budget: &'static str },

    /// The price used for planning was older than `S_price`, or non-positive.
    #[error("stale price for asset {asset}: age_ms={age_ms}")]
    StalePrice { asset: String, age_ms: u64 },

    /// A liquidation plan could not be built (no eligible debt/collateral
    /// reserve, below profit floor, etc).
    #[error("invalid plan for {user}: {reason}")]
    InvalidPlan { user: String, reason: String },

    /// Raised by debug assertions when an invariant the rest of the system
    /// relies on has been violated. Not locally recoverable.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl PipelineError {
    /// True for errors that the caller should retry against a fallback
    /// endpoint before giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::RpcTransient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_transient_is_retryable() {
        let e = PipelineError::RpcTransient {
            endpoint: "primary".into(),
            message: "timeout".into(),
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn budget_exceeded_is_not_retryable() {
        let e = PipelineError::BudgetExceeded { budget: "Q_block" };
        assert!(!e.is_retryable());
    }
}
