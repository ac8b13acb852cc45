use std::time::Duration;

use tracing::{Level, Span, field};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global tracing subscriber.
///
/// `json = true` is intended for production deployments where logs are shipped
/// to an aggregator; `json = false` gives a human-readable pretty format for
/// local runs. Idempotent-by-process: call once from `main`.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.pretty())
            .init();
    }
}

/// Span for a single block-processing pass (the orchestrator's critical section).
pub fn block_span(block_number: u64) -> Span {
    tracing::span!(
        Level::INFO,
        "block_pass",
        block_number,
        dirty_marked = field::Empty,
        verified = field::Empty,
        admitted = field::Empty,
    )
}

/// Span for a single user's fast-path executor lifecycle.
pub fn user_span(user: &str) -> Span {
    tracing::span!(
        Level::INFO,
        "user_execution",
        user = %user,
        state = field::Empty,
    )
}

/// Runs `fut`, logging a warning if it takes longer than `max`.
///
/// Reused at every suspension point that has a latency budget: verifier RPCs,
/// oracle reads, and transaction submission.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = max.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
