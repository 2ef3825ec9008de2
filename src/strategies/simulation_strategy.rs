use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::model::chain::Chain;
use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

/// Routes every opportunity through [`crate::simulation::SimulationService`]
/// instead of a real submitter — the global "simulation mode" override
/// from §4.6 item 1. Builds the would-be swap path and raw transaction
/// exactly as [`super::single_chain::SingleChainStrategy`] would, but
/// never calls a submitter: a predicted revert is the only way this
/// strategy fails.
pub struct SimulationStrategy {
    slippage_bps: u32,
    time_budget: Duration,
}

impl SimulationStrategy {
    pub fn new(slippage_bps: u32, time_budget: Duration) -> Self {
        SimulationStrategy {
            slippage_bps,
            time_budget,
        }
    }
}

#[async_trait]
impl Strategy for SimulationStrategy {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let chain = Chain::from_name(&opportunity.buy_chain).ok_or_else(|| ErrorCode::ValUnknownChain(opportunity.buy_chain.clone()))?;
        let chain_id = chain.chain_id().unwrap_or_default();

        let token_in: Address = opportunity
            .token_in
            .parse()
            .map_err(|_| ErrorCode::ValMalformed(format!("tokenIn `{}` is not an address", opportunity.token_in)))?;
        let token_out: Address = opportunity
            .token_out
            .parse()
            .map_err(|_| ErrorCode::ValMalformed(format!("tokenOut `{}` is not an address", opportunity.token_out)))?;

        let dex_name = opportunity
            .path_hints
            .as_ref()
            .and_then(|hints| hints.first())
            .cloned()
            .unwrap_or_else(|| "uniswap-v3".to_string());

        let now = chrono::Utc::now().timestamp();
        let steps = ctx.swap_step_builder.build(
            &opportunity.id,
            chain_id,
            &opportunity.buy_chain,
            self.slippage_bps,
            &[(dex_name, token_in, token_out, opportunity.amount_in)],
            now,
        )?;

        let wallet = ctx.wallet_address();
        let raw_tx = ctx
            .pending_simulator
            .build_raw_tx_route(&steps, opportunity.amount_in, wallet, U256::from(now as u64 + 300))?;

        let result = ctx
            .simulation
            .simulate(&opportunity.buy_chain, &raw_tx, opportunity.expected_profit, self.time_budget)
            .await?;

        if let Some(result) = result {
            if result.would_revert {
                return Err(ErrorCode::ErrSimRevert(result.revert_reason.unwrap_or_else(|| "unknown".into())));
            }
        }

        Ok(StrategyOutcome {
            chain: opportunity.buy_chain.clone(),
            tx_hash: format!("sim:{}", opportunity.id),
            realized_profit_usd: opportunity.expected_profit,
        })
    }
}
