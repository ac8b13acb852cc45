use async_trait::async_trait;
use domain::block::{Block, Reorg};

/// Lazy monotone sequence of blocks, paired with an explicit reorg side
/// channel. `number` is strictly increasing across successful `next_block`
/// calls but may observe gaps.
#[async_trait]
pub trait BlockFeed: Send + Sync {
    async fn next_block(&mut self) -> Option<Block>;

    /// Drains any reorg notifications queued since the last call. Checked by
    /// the Orchestrator once per block-processing pass.
    fn poll_reorg(&mut self) -> Option<Reorg>;
}

pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Deterministic, pre-scripted feed for tests: yields exactly the blocks
    /// and reorgs pushed onto it, in order, then ends the stream.
    #[derive(Default)]
    pub struct MockBlockFeed {
        blocks: VecDeque<Block>,
        reorgs: VecDeque<Reorg>,
    }

    impl MockBlockFeed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_block(&mut self, block: Block) -> &mut Self {
            self.blocks.push_back(block);
            self
        }

        pub fn push_reorg(&mut self, reorg: Reorg) -> &mut Self {
            self.reorgs.push_back(reorg);
            self
        }
    }

    #[async_trait]
    impl BlockFeed for MockBlockFeed {
        async fn next_block(&mut self) -> Option<Block> {
            self.blocks.pop_front()
        }

        fn poll_reorg(&mut self) -> Option<Reorg> {
            self.reorgs.pop_front()
        }
    }

    #[tokio::test]
    async fn yields_pushed_blocks_in_order() {
        let mut feed = MockBlockFeed::new();
        feed.push_block(Block {
            number: 1,
            hash: Default::default(),
            timestamp: 10,
        });
        feed.push_block(Block {
            number: 2,
            hash: Default::default(),
            timestamp: 20,
        });

        assert_eq!(feed.next_block().await.unwrap().number, 1);
        assert_eq!(feed.next_block().await.unwrap().number, 2);
        assert!(feed.next_block().await.is_none());
    }
}
