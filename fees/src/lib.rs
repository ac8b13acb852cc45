//! Initial fee computation and fee-bump (RBF) replacement policy.

#[derive(Clone, Copy, Debug)]
pub struct FeeConfig {
    pub tip_gwei_fast: f64,
    pub max_fee_gwei: Option<f64>,
    pub bump_factor: f64,
    pub b_rbf_ms: u64,
    pub n_rbf: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            tip_gwei_fast: 2.0,
            max_fee_gwei: None,
            bump_factor: 1.25,
            b_rbf_ms: 500,
            n_rbf: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeePlan {
    pub max_fee_gwei: f64,
    pub priority_fee_gwei: f64,
}

impl FeePlan {
    fn clamp(self, cap: Option<f64>) -> (Self, bool) {
        match cap {
            Some(cap) if self.max_fee_gwei > cap => (
                Self {
                    max_fee_gwei: cap,
                    priority_fee_gwei: self.priority_fee_gwei,
                },
                true,
            ),
            _ => (self, false),
        }
    }
}

/// Per-attempt fee state for one in-flight submission. Once a bump is
/// clamped out of headroom, every subsequent bump for this state is a
/// sticky no-op, per §4.9.
#[derive(Clone, Copy, Debug)]
pub struct FeeReplacementState {
    config: FeeConfig,
    current: FeePlan,
    exhausted: bool,
}

impl FeeReplacementState {
    pub fn start(config: FeeConfig, base_fee_gwei: f64) -> Self {
        let raw = FeePlan {
            max_fee_gwei: base_fee_gwei * 2.0 + config.tip_gwei_fast,
            priority_fee_gwei: config.tip_gwei_fast,
        };
        let (clamped, was_clamped) = raw.clamp(config.max_fee_gwei);
        Self {
            config,
            current: clamped,
            exhausted: was_clamped && config.max_fee_gwei.is_some() && clamped.max_fee_gwei <= config.tip_gwei_fast,
        }
    }

    pub fn current(&self) -> FeePlan {
        self.current
    }

    /// `attempt` is 1-indexed per §4.9's `k (1..N_rbf)`.
    pub fn bump(&mut self, attempt: u32, base_fee_gwei: f64) -> FeePlan {
        if self.exhausted || attempt > self.config.n_rbf {
            return self.current;
        }

        let tip = self.config.tip_gwei_fast * self.config.bump_factor.powi(attempt as i32);
        let raw = FeePlan {
            max_fee_gwei: base_fee_gwei * 2.0 + tip,
            priority_fee_gwei: tip,
        };
        let (clamped, was_clamped) = raw.clamp(self.config.max_fee_gwei);

        if was_clamped && clamped.max_fee_gwei <= self.current.max_fee_gwei {
            // No headroom left: keep the previous fee, mark future bumps
            // as no-ops too.
            self.exhausted = true;
            return self.current;
        }

        self.current = clamped;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_fee_is_double_base_plus_tip() {
        let state = FeeReplacementState::start(FeeConfig::default(), 10.0);
        assert_eq!(state.current().max_fee_gwei, 22.0);
        assert_eq!(state.current().priority_fee_gwei, 2.0);
    }

    #[test]
    fn initial_fee_clamps_to_cap() {
        let mut config = FeeConfig::default();
        config.max_fee_gwei = Some(15.0);
        let state = FeeReplacementState::start(config, 10.0);
        assert_eq!(state.current().max_fee_gwei, 15.0);
    }

    #[test]
    fn bump_multiplies_tip_by_bump_factor_power() {
        let mut state = FeeReplacementState::start(FeeConfig::default(), 10.0);
        let bumped = state.bump(1, 10.0);
        assert!((bumped.priority_fee_gwei - 2.5).abs() < 1e-9);
    }

    #[test]
    fn bump_clamped_out_of_headroom_is_sticky_no_op() {
        let mut config = FeeConfig::default();
        config.max_fee_gwei = Some(22.0);
        let mut state = FeeReplacementState::start(config, 10.0);
        let first_bump = state.bump(1, 10.0);
        assert_eq!(first_bump, state.current());
        assert_eq!(first_bump.max_fee_gwei, 22.0);

        let second_bump = state.bump(2, 10.0);
        assert_eq!(second_bump, first_bump, "future bumps stay no-ops");
    }

    #[test]
    fn bump_beyond_n_rbf_is_a_no_op() {
        let mut state = FeeReplacementState::start(FeeConfig::default(), 10.0);
        let last_valid = state.bump(3, 10.0);
        let beyond = state.bump(4, 10.0);
        assert_eq!(beyond, last_valid);
    }
}
