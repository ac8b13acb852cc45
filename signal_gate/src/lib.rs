//! Stateless-across-restarts filter deciding whether an inbound price signal
//! should trigger downstream dirty-marking. State is limited to the
//! last-seen-per-symbol price and last-signal-time map.

use std::collections::HashMap;

use interfaces::{PriceSignal, PriceSource};
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug)]
pub struct SignalGateConfig {
    pub debounce_per_asset_ms: u64,
    pub pyth_delta_pct: f64,
    pub twap_delta_pct: f64,
    pub chainlink_delta_pct: Option<f64>,
}

impl Default for SignalGateConfig {
    fn default() -> Self {
        Self {
            debounce_per_asset_ms: 5_000,
            pyth_delta_pct: 0.0025,
            twap_delta_pct: 0.02,
            chainlink_delta_pct: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    Debounced,
    PythDeltaTooSmall,
    PythTwapDivergence,
    ChainlinkDeltaTooSmall,
}

#[derive(Clone, Copy, Debug)]
struct SymbolState {
    last_price_scaled_1e18: u128,
    last_signal_ts_ms: u64,
}

#[derive(Debug, Default)]
struct PerSourceState {
    by_symbol: HashMap<String, SymbolState>,
}

/// Accumulates last-seen state per `(symbol, source)` and decides admission
/// for each incoming signal independently; the TWAP cross-check additionally
/// consults the last-seen Twap price for the same symbol.
pub struct SignalGate {
    config: SignalGateConfig,
    state: Mutex<HashMap<PriceSource, PerSourceState>>,
}

impl SignalGate {
    pub fn new(config: SignalGateConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Ok(())` if the signal should be forwarded downstream, or the
    /// reason it was dropped. Recording the decision (telemetry) is the
    /// caller's responsibility.
    pub fn evaluate(&self, signal: &PriceSignal) -> Result<(), RejectReason> {
        let mut guard = self.state.lock();

        if let Some(per_source) = guard.get(&signal.source) {
            if let Some(prev) = per_source.by_symbol.get(&signal.symbol) {
                let elapsed = signal.ts_ms.saturating_sub(prev.last_signal_ts_ms);
                if elapsed < self.config.debounce_per_asset_ms {
                    return Err(RejectReason::Debounced);
                }
            }
        }

        match signal.source {
            PriceSource::Pyth => {
                let delta = signal.delta_pct.unwrap_or(0.0).abs();
                if delta < self.config.pyth_delta_pct {
                    return Err(RejectReason::PythDeltaTooSmall);
                }
                if let Some(twap_state) = guard
                    .get(&PriceSource::Twap)
                    .and_then(|s| s.by_symbol.get(&signal.symbol))
                {
                    let twap_price = twap_state.last_price_scaled_1e18 as f64;
                    if twap_price > 0.0 {
                        let divergence =
                            (signal.price_scaled_1e18 as f64 - twap_price).abs() / twap_price;
                        if divergence > self.config.twap_delta_pct {
                            return Err(RejectReason::PythTwapDivergence);
                        }
                    }
                }
            }
            PriceSource::Chainlink => {
                if let Some(threshold) = self.config.chainlink_delta_pct {
                    let prev_price = guard
                        .get(&PriceSource::Chainlink)
                        .and_then(|s| s.by_symbol.get(&signal.symbol))
                        .map(|s| s.last_price_scaled_1e18 as f64);
                    if let Some(prev_price) = prev_price {
                        if prev_price > 0.0 {
                            let delta =
                                (signal.price_scaled_1e18 as f64 - prev_price).abs() / prev_price;
                            if delta < threshold {
                                return Err(RejectReason::ChainlinkDeltaTooSmall);
                            }
                        }
                    }
                }
            }
            PriceSource::Twap => {}
        }

        let per_source = guard.entry(signal.source).or_default();
        per_source.by_symbol.insert(
            signal.symbol.clone(),
            SymbolState {
                last_price_scaled_1e18: signal.price_scaled_1e18,
                last_signal_ts_ms: signal.ts_ms,
            },
        );
        Ok(())
    }
}

impl Default for PerSourceState {
    fn default() -> Self {
        Self {
            by_symbol: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pyth_signal(symbol: &str, price: u128, ts_ms: u64, delta_pct: f64) -> PriceSignal {
        PriceSignal {
            source: PriceSource::Pyth,
            symbol: symbol.to_string(),
            price_scaled_1e18: price,
            ts_ms,
            delta_pct: Some(delta_pct),
        }
    }

    #[test]
    fn second_signal_inside_debounce_window_is_dropped() {
        let gate = SignalGate::new(SignalGateConfig::default());
        assert!(gate
            .evaluate(&pyth_signal("WETH", 2_000, 0, 0.01))
            .is_ok());
        let result = gate.evaluate(&pyth_signal("WETH", 2_010, 200, 0.01));
        assert_eq!(result, Err(RejectReason::Debounced));
    }

    #[test]
    fn signal_after_debounce_window_is_accepted() {
        let gate = SignalGate::new(SignalGateConfig::default());
        assert!(gate
            .evaluate(&pyth_signal("WETH", 2_000, 0, 0.01))
            .is_ok());
        let result = gate.evaluate(&pyth_signal("WETH", 2_010, 5_001, 0.01));
        assert!(result.is_ok());
    }

    #[test]
    fn pyth_delta_below_threshold_is_rejected() {
        let gate = SignalGate::new(SignalGateConfig::default());
        let result = gate.evaluate(&pyth_signal("WETH", 2_000, 0, 0.0001));
        assert_eq!(result, Err(RejectReason::PythDeltaTooSmall));
    }

    #[test]
    fn pyth_diverging_from_twap_is_rejected() {
        let gate = SignalGate::new(SignalGateConfig::default());
        let twap = PriceSignal {
            source: PriceSource::Twap,
            symbol: "WETH".into(),
            price_scaled_1e18: 2_000,
            ts_ms: 0,
            delta_pct: None,
        };
        gate.evaluate(&twap).unwrap();

        let manipulated = pyth_signal("WETH", 3_000, 6_000, 0.5);
        let result = gate.evaluate(&manipulated);
        assert_eq!(result, Err(RejectReason::PythTwapDivergence));
    }
}
