pub mod block;
pub mod borrower;
pub mod decision;
pub mod dirty;
pub mod hf;
pub mod latency;
pub mod queue_entry;
pub mod reserve;

pub use alloy_primitives::Address;
