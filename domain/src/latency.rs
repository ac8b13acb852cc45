/// Per-attempt latency trace, populated incrementally as an attempt moves
/// through the pipeline. All fields are wall-clock milliseconds since epoch;
/// later stages are `None` until reached, and a dropped attempt simply stops
/// advancing rather than being retracted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencyRecord {
    pub block_received_ms: u64,
    pub candidate_detected_ms: Option<u64>,
    pub plan_ready_ms: Option<u64>,
    pub tx_signed_ms: Option<u64>,
    pub tx_broadcast_ms: Option<u64>,
    pub submitted_private_ms: Option<u64>,
    pub first_inclusion_seen_ms: Option<u64>,
}

impl LatencyRecord {
    pub fn starting_at(block_received_ms: u64) -> Self {
        Self {
            block_received_ms,
            ..Default::default()
        }
    }

    /// End-to-end latency from block receipt to broadcast, the figure the
    /// L_warn budget is measured against. `None` until broadcast happens.
    pub fn detect_to_broadcast_ms(&self) -> Option<u64> {
        self.tx_broadcast_ms
            .map(|t| t.saturating_sub(self.block_received_ms))
    }
}
