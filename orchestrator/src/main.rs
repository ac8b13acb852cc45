use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use budget::ReversionBudget;
use common::clock::{Clock, SystemClock};
use common::logger::init_tracing;
use domain::block::Block;
use events::{EventKind, TopicRegistry};
use executor::FastPathExecutor;
use interfaces::health_factor_oracle::mock::MockHealthFactorOracle;
use interfaces::telemetry::TracingTelemetry;
use interfaces::tx_sender::mock::MockTxSender;
use orchestrator::{AppConfig, Pipeline};

/// Registers the protocol event topics this deployment watches. The real
/// ABI signature hashes are an out-of-scope collaborator's concern; this
/// repository wires a representative registry so the pipeline can be
/// exercised end-to-end against the mock feeds below.
fn build_topic_registry() -> TopicRegistry {
    TopicRegistry::new()
        .register(B256::from([1; 32]), EventKind::Borrow)
        .register(B256::from([2; 32]), EventKind::Repay)
        .register(B256::from([3; 32]), EventKind::Supply)
        .register(B256::from([4; 32]), EventKind::Withdraw)
        .register(B256::from([5; 32]), EventKind::LiquidationCall)
        .register(B256::from([6; 32]), EventKind::ReserveDataUpdated)
        .register(B256::from([7; 32]), EventKind::AnswerUpdated)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    init_tracing(cfg.log_json);

    tracing::info!("starting liquidation pipeline orchestrator");

    // This repository ships only deterministic in-memory collaborators for
    // the RPC/signing boundary (HealthFactorOracle, TxSender); wiring a real
    // node/signer is an out-of-scope integration left to the deployment.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let oracle = Arc::new(MockHealthFactorOracle::new());
    let tx_sender = Arc::new(MockTxSender::new());
    let budget = Arc::new(ReversionBudget::new(cfg.reversion_budget_per_day, clock.now_ms()));

    let executor = Arc::new(FastPathExecutor::new(
        cfg.exec,
        clock.clone(),
        oracle.clone(),
        tx_sender,
        budget,
        cfg.fee,
    ));

    let topics = build_topic_registry();
    let mut symbol_to_asset = HashMap::new();
    symbol_to_asset.insert("WETH".to_string(), Address::from([0xEE; 20]));
    symbol_to_asset.insert("WBTC".to_string(), Address::from([0xBB; 20]));

    let our_signer = Address::ZERO;

    let mut pipeline = Pipeline::new(
        cfg.clone(),
        clock.clone(),
        executor,
        Arc::new(TracingTelemetry),
        topics,
        our_signer,
        symbol_to_asset,
    );

    tracing::info!("pipeline constructed; awaiting shutdown signal");

    let mut block_number = 0u64;
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                block_number += 1;
                let block = Block {
                    number: block_number,
                    hash: B256::ZERO,
                    timestamp: block_number,
                };
                if let Err(err) = pipeline
                    .process_block(block, Vec::new(), Vec::new(), oracle.as_ref(), None)
                    .await
                {
                    tracing::error!(error = %err, block_number, "block processing failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received; draining in-flight work");
                tokio::time::sleep(Duration::from_millis(cfg.shutdown_drain_deadline_ms)).await;
                break;
            }
        }
    }

    tracing::info!("orchestrator shut down cleanly");
    Ok(())
}
