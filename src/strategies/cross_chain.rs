use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::cross_chain::CrossChainParams;
use crate::model::chain::Chain;
use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

/// Translates an [`Opportunity`] into [`CrossChainParams`] and hands it
/// to [`crate::cross_chain::CrossChainExecutor`] — the strategy layer
/// owns wire-field parsing and live gas/route lookups; the executor
/// owns the ten-step pipeline itself.
pub struct CrossChainStrategy {
    destination_sell_time_budget: Duration,
}

impl CrossChainStrategy {
    pub fn new(destination_sell_time_budget: Duration) -> Self {
        CrossChainStrategy {
            destination_sell_time_budget,
        }
    }
}

#[async_trait]
impl Strategy for CrossChainStrategy {
    fn name(&self) -> &'static str {
        "cross-chain"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let dest_chain_info = Chain::from_name(&opportunity.sell_chain)
            .ok_or_else(|| ErrorCode::ValUnknownChain(opportunity.sell_chain.clone()))?;
        let dest_chain_id = dest_chain_info.chain_id().unwrap_or_default();

        let asset: Address = opportunity
            .token_in
            .parse()
            .map_err(|_| ErrorCode::ValMalformed(format!("tokenIn `{}` is not an address", opportunity.token_in)))?;
        let dest_token_out: Address = opportunity
            .token_out
            .parse()
            .map_err(|_| ErrorCode::ValMalformed(format!("tokenOut `{}` is not an address", opportunity.token_out)))?;

        let dex_name = opportunity
            .path_hints
            .as_ref()
            .and_then(|hints| hints.first())
            .cloned()
            .unwrap_or_else(|| "uniswap-v3".to_string());
        let dest_router = ctx
            .dex_registry
            .router(dest_chain_id, &dex_name)
            .ok_or_else(|| ErrorCode::ErrNoRoute(asset.to_string(), dest_token_out.to_string()))?;

        let source_provider = ctx
            .providers
            .provider(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(opportunity.buy_chain.clone()))?;
        let dest_provider = ctx
            .providers
            .provider(&opportunity.sell_chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(opportunity.sell_chain.clone()))?;
        let source_gas_gwei = source_provider
            .gas_price_gwei()
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("gas price read failed: {e}")))?;
        let dest_gas_gwei = dest_provider
            .gas_price_gwei()
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("gas price read failed: {e}")))?;

        let wallet = ctx.wallet_address();
        let now = chrono::Utc::now().timestamp();
        let time_remaining = opportunity
            .expiry
            .map(|exp| Duration::from_secs((exp - now).max(0) as u64))
            .unwrap_or(self.destination_sell_time_budget);

        let dest_raw_tx = ctx
            .swap_step_builder
            .build(
                &opportunity.id,
                dest_chain_id,
                &opportunity.sell_chain,
                50,
                &[(dex_name, asset, dest_token_out, opportunity.amount_in)],
                now,
            )
            .ok()
            .and_then(|steps| steps.into_iter().next())
            .and_then(|step| {
                ctx.pending_simulator
                    .build_raw_tx(&step, opportunity.amount_in, wallet, alloy::primitives::U256::from(now as u64 + 300))
                    .ok()
            })
            .unwrap_or_default();

        let params = CrossChainParams {
            opportunity_id: opportunity.id.clone(),
            source_chain: opportunity.buy_chain.clone(),
            dest_chain: opportunity.sell_chain.clone(),
            asset,
            amount_in: opportunity.amount_in,
            wallet,
            expected_profit_usd: opportunity.expected_profit,
            source_gas_gwei,
            dest_gas_gwei,
            dest_token_in: asset,
            dest_token_out,
            dest_router,
            dest_raw_tx,
            time_remaining,
        };

        let outcome = ctx
            .cross_chain
            .execute(params, now, ctx.shutdown.clone())
            .await
            .map_err(|e| e.code)?;

        Ok(StrategyOutcome {
            chain: outcome.destination_chain,
            tx_hash: outcome.destination_tx_hash,
            realized_profit_usd: outcome.realized_profit_usd,
        })
    }
}
