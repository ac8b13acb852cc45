use alloy_primitives::{Address, B256};
use async_trait::async_trait;

/// Raw decoded log as handed to the Event Decoder (C5); this crate only
/// defines the subscription boundary, not the ABI decoding itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedLog {
    pub topic0: B256,
    pub address: Address,
    pub block_number: u64,
    pub user: Option<Address>,
    pub on_behalf_of: Option<Address>,
    pub reserve: Option<Address>,
}

#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Registers interest in the given topics; subsequent `next_log` calls
    /// only yield logs matching one of them.
    fn subscribe(&mut self, topics: &[B256]);

    async fn next_log(&mut self) -> Option<DecodedLog>;
}

pub mod mock {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    #[derive(Default)]
    pub struct MockEventFeed {
        topics: HashSet<B256>,
        logs: VecDeque<DecodedLog>,
    }

    impl MockEventFeed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_log(&mut self, log: DecodedLog) -> &mut Self {
            self.logs.push_back(log);
            self
        }
    }

    #[async_trait]
    impl EventFeed for MockEventFeed {
        fn subscribe(&mut self, topics: &[B256]) {
            self.topics.extend(topics.iter().copied());
        }

        async fn next_log(&mut self) -> Option<DecodedLog> {
            while let Some(log) = self.logs.pop_front() {
                if self.topics.is_empty() || self.topics.contains(&log.topic0) {
                    return Some(log);
                }
            }
            None
        }
    }

    #[tokio::test]
    async fn filters_logs_not_matching_subscribed_topics() {
        let mut feed = MockEventFeed::new();
        let wanted = B256::from([1; 32]);
        let unwanted = B256::from([2; 32]);
        feed.subscribe(&[wanted]);
        feed.push_log(DecodedLog {
            topic0: unwanted,
            address: Address::ZERO,
            block_number: 1,
            user: None,
            on_behalf_of: None,
            reserve: None,
        });
        feed.push_log(DecodedLog {
            topic0: wanted,
            address: Address::ZERO,
            block_number: 1,
            user: Some(Address::from([5; 20])),
            on_behalf_of: None,
            reserve: None,
        });

        let log = feed.next_log().await.unwrap();
        assert_eq!(log.topic0, wanted);
        assert!(feed.next_log().await.is_none());
    }
}
