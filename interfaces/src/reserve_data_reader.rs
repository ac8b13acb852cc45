use alloy_primitives::Address;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReserveMeta {
    pub price_base8: u128,
    pub updated_at_ms: u64,
    pub decimals: u8,
    pub symbol: String,
    pub liquidation_bonus_bps: u32,
}

#[derive(Debug, Clone, Error)]
#[error("no reserve data for asset {asset}")]
pub struct ReserveDataError {
    pub asset: Address,
}

#[async_trait]
pub trait ReserveDataReader: Send + Sync {
    async fn price_and_meta(&self, asset: Address) -> Result<ReserveMeta, ReserveDataError>;
}

pub mod mock {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockReserveDataReader {
        entries: RwLock<HashMap<Address, ReserveMeta>>,
    }

    impl MockReserveDataReader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, asset: Address, meta: ReserveMeta) {
            self.entries.write().insert(asset, meta);
        }
    }

    #[async_trait]
    impl ReserveDataReader for MockReserveDataReader {
        async fn price_and_meta(&self, asset: Address) -> Result<ReserveMeta, ReserveDataError> {
            self.entries
                .read()
                .get(&asset)
                .cloned()
                .ok_or(ReserveDataError { asset })
        }
    }

    #[tokio::test]
    async fn unseeded_asset_errors() {
        let reader = MockReserveDataReader::new();
        let result = reader.price_and_meta(Address::from([4; 20])).await;
        assert!(result.is_err());
    }
}
