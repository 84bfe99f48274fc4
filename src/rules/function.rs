// Serverless function sizing heuristic.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{GatewayError, Inventory};
use crate::models::{Finding, FunctionConfig, Severity};

pub const LOW_MEMORY_MB: u32 = 256;
pub const LONG_TIMEOUT_SECS: u32 = 30;

pub fn rules<G: Inventory<FunctionConfig>>() -> RuleSet<FunctionConfig, G> {
    vec![Box::new(LowMemoryLongTimeout)]
}

pub struct LowMemoryLongTimeout;

#[async_trait]
impl<G: Inventory<FunctionConfig>> Rule<FunctionConfig, G> for LowMemoryLongTimeout {
    fn name(&self) -> &'static str {
        "function.low_memory_long_timeout"
    }

    async fn evaluate(
        &self,
        item: &FunctionConfig,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.memory_mb >= LOW_MEMORY_MB || item.timeout_secs <= LONG_TIMEOUT_SECS {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Low memory with high timeout")
                .action("Consider increasing memory allocation for better performance")
                .details(format!(
                    "{} MB memory, {} s timeout",
                    item.memory_mb, item.timeout_secs
                ))
                .build(),
        ))
    }
}
