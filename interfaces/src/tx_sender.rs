use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxPlan {
    pub user: Address,
    pub debt_asset: Address,
    pub collateral_asset: Address,
    pub debt_to_cover: u128,
    pub max_fee_gwei: f64,
    pub priority_fee_gwei: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTx {
    pub plan: TxPlan,
    pub nonce: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTx {
    pub unsigned: UnsignedTx,
    pub hash: B256,
}

#[derive(Debug, Clone, Error)]
pub enum TxSenderError {
    #[error("rpc transient error: {0}")]
    RpcTransient(String),
    #[error("submission reverted: {0}")]
    Revert(String),
}

/// Transaction signing and broadcast is out of scope; this crate only
/// defines the boundary and a deterministic mock used to drive the executor
/// state machine in tests.
#[async_trait]
pub trait TxSender: Send + Sync {
    async fn build(&self, plan: TxPlan) -> Result<UnsignedTx, TxSenderError>;
    async fn sign(&self, unsigned: UnsignedTx) -> Result<SignedTx, TxSenderError>;
    async fn submit_private(&self, signed: SignedTx) -> Result<B256, TxSenderError>;
    async fn submit_public_race(
        &self,
        signed: SignedTx,
        endpoints: &[String],
    ) -> Result<B256, TxSenderError>;
    async fn replace(&self, old_hash: B256, signed: SignedTx) -> Result<B256, TxSenderError>;
}

pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct MockTxSender {
        next_nonce: Mutex<u64>,
        pub submitted: Mutex<Vec<B256>>,
        pub force_revert: Mutex<bool>,
    }

    impl MockTxSender {
        pub fn new() -> Self {
            Self::default()
        }

        fn fake_hash(nonce: u64) -> B256 {
            let mut bytes = [0u8; 32];
            bytes[24..].copy_from_slice(&nonce.to_be_bytes());
            B256::from(bytes)
        }
    }

    #[async_trait]
    impl TxSender for MockTxSender {
        async fn build(&self, plan: TxPlan) -> Result<UnsignedTx, TxSenderError> {
            let mut nonce = self.next_nonce.lock();
            let unsigned = UnsignedTx { plan, nonce: *nonce };
            *nonce += 1;
            Ok(unsigned)
        }

        async fn sign(&self, unsigned: UnsignedTx) -> Result<SignedTx, TxSenderError> {
            let hash = Self::fake_hash(unsigned.nonce);
            Ok(SignedTx { unsigned, hash })
        }

        async fn submit_private(&self, signed: SignedTx) -> Result<B256, TxSenderError> {
            if *self.force_revert.lock() {
                return Err(TxSenderError::Revert("mock forced revert".into()));
            }
            self.submitted.lock().push(signed.hash);
            Ok(signed.hash)
        }

        async fn submit_public_race(
            &self,
            signed: SignedTx,
            _endpoints: &[String],
        ) -> Result<B256, TxSenderError> {
            self.submit_private(signed).await
        }

        async fn replace(&self, _old_hash: B256, signed: SignedTx) -> Result<B256, TxSenderError> {
            self.submit_private(signed).await
        }
    }

    #[tokio::test]
    async fn build_assigns_increasing_nonces() {
        let sender = MockTxSender::new();
        let plan = TxPlan {
            user: Address::from([1; 20]),
            debt_asset: Address::from([2; 20]),
            collateral_asset: Address::from([3; 20]),
            debt_to_cover: 100,
            max_fee_gwei: 30.0,
            priority_fee_gwei: 2.0,
        };
        let first = sender.build(plan.clone()).await.unwrap();
        let second = sender.build(plan).await.unwrap();
        assert_eq!(first.nonce, 0);
        assert_eq!(second.nonce, 1);
    }

    #[tokio::test]
    async fn forced_revert_propagates_from_submit() {
        let sender = MockTxSender::new();
        *sender.force_revert.lock() = true;
        let plan = TxPlan {
            user: Address::from([1; 20]),
            debt_asset: Address::from([2; 20]),
            collateral_asset: Address::from([3; 20]),
            debt_to_cover: 100,
            max_fee_gwei: 30.0,
            priority_fee_gwei: 2.0,
        };
        let unsigned = sender.build(plan).await.unwrap();
        let signed = sender.sign(unsigned).await.unwrap();
        let result = sender.submit_private(signed).await;
        assert!(matches!(result, Err(TxSenderError::Revert(_))));
    }
}
