use alloy_primitives::B256;

/// A single observed block header, as yielded by the Block Feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
}

/// Side-channel notification that the chain reorganized `depth` blocks back
/// from the current tip. Not an error: triggers targeted cache invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reorg {
    pub depth: u64,
}
