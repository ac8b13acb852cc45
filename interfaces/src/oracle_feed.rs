use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PriceSource {
    Pyth,
    Chainlink,
    Twap,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PriceSignal {
    pub source: PriceSource,
    pub symbol: String,
    pub price_scaled_1e18: u128,
    pub ts_ms: u64,
    pub delta_pct: Option<f64>,
}

#[async_trait]
pub trait OracleFeed: Send + Sync {
    fn subscribe(&mut self, assets: &[String]);

    async fn next_signal(&mut self) -> Option<PriceSignal>;
}

pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct MockOracleFeed {
        assets: Vec<String>,
        signals: VecDeque<PriceSignal>,
    }

    impl MockOracleFeed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_signal(&mut self, signal: PriceSignal) -> &mut Self {
            self.signals.push_back(signal);
            self
        }
    }

    #[async_trait]
    impl OracleFeed for MockOracleFeed {
        fn subscribe(&mut self, assets: &[String]) {
            self.assets = assets.to_vec();
        }

        async fn next_signal(&mut self) -> Option<PriceSignal> {
            while let Some(sig) = self.signals.pop_front() {
                if self.assets.is_empty() || self.assets.contains(&sig.symbol) {
                    return Some(sig);
                }
            }
            None
        }
    }

    #[tokio::test]
    async fn filters_signals_for_unsubscribed_symbols() {
        let mut feed = MockOracleFeed::new();
        feed.subscribe(&["WETH".to_string()]);
        feed.push_signal(PriceSignal {
            source: PriceSource::Pyth,
            symbol: "WBTC".into(),
            price_scaled_1e18: 1,
            ts_ms: 1,
            delta_pct: None,
        });
        feed.push_signal(PriceSignal {
            source: PriceSource::Pyth,
            symbol: "WETH".into(),
            price_scaled_1e18: 2,
            ts_ms: 2,
            delta_pct: None,
        });

        let sig = feed.next_signal().await.unwrap();
        assert_eq!(sig.symbol, "WETH");
    }
}
