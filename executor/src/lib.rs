pub mod plan;
pub mod state_machine;
pub mod template_cache;
pub mod types;

pub use plan::{build_plan, select_collateral_reserve, select_debt_reserve, PlanConfig};
pub use state_machine::{ExecutionRequest, ExecutionResult, ExecutorConfig, FastPathExecutor};
pub use template_cache::{CalldataTemplateCache, TemplateKey};
pub use types::{ExecutionOutcome, ExecutorState, LiquidationPlan, ReserveExposure, SkipReason};
