use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::model::commitment::SwapPathStep;
use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

/// Submits the already-built swap path on a single chain. The concrete
/// transaction-sending mechanics (signing, broadcasting) are a boundary
/// — §1 scopes out concrete DEX wire formats — so this strategy depends
/// on a thin submitter trait instead of an `alloy` contract call
/// directly, mirroring how [`crate::cross_chain::DestinationExecutor`]
/// keeps the same concern out of the pipeline logic.
#[async_trait]
pub trait SwapSubmitter: Send + Sync {
    async fn submit_swap(
        &self,
        chain: &str,
        wallet: Address,
        nonce: u64,
        steps: &[SwapPathStep],
        amount_in: U256,
    ) -> anyhow::Result<String>;
}

pub struct SingleChainStrategy {
    submitter: std::sync::Arc<dyn SwapSubmitter>,
    slippage_bps: u32,
    simulation_time_budget: Duration,
}

impl SingleChainStrategy {
    pub fn new(submitter: std::sync::Arc<dyn SwapSubmitter>, slippage_bps: u32, simulation_time_budget: Duration) -> Self {
        SingleChainStrategy {
            submitter,
            slippage_bps,
            simulation_time_budget,
        }
    }
}

#[async_trait]
impl Strategy for SingleChainStrategy {
    fn name(&self) -> &'static str {
        "single-chain"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let chain = crate::model::chain::Chain::from_name(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ValUnknownChain(opportunity.buy_chain.clone()))?;
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

        let route = vec![(dex_name, token_in, token_out, opportunity.amount_in)];
        let steps = ctx.swap_step_builder.build(
            &opportunity.id,
            chain_id,
            &opportunity.buy_chain,
            self.slippage_bps,
            &route,
            chrono::Utc::now().timestamp(),
        )?;

        let provider = ctx
            .providers
            .provider(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(opportunity.buy_chain.clone()))?;
        let gas_gwei = provider
            .gas_price_gwei()
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("gas price read failed: {e}")))?;
        ctx.gas_policy.check(&opportunity.buy_chain, gas_gwei)?;

        let wallet = ctx.wallet_address();
        let nonce = ctx.nonce_manager.reserve(&opportunity.buy_chain, wallet)?;

        let raw_tx = ctx
            .pending_simulator
            .build_raw_tx_route(&steps, opportunity.amount_in, wallet, U256::from(chrono::Utc::now().timestamp() as u64 + 300))
            .ok();
        if let Some(raw_tx) = raw_tx {
            if let Some(result) = ctx
                .simulation
                .simulate(&opportunity.buy_chain, &raw_tx, opportunity.expected_profit, self.simulation_time_budget)
                .await
                .map_err(|e| {
                    ctx.nonce_manager.fail(&opportunity.buy_chain, wallet, nonce);
                    e
                })?
            {
                if result.would_revert {
                    ctx.nonce_manager.fail(&opportunity.buy_chain, wallet, nonce);
                    return Err(ErrorCode::ErrSimRevert(
                        result.revert_reason.unwrap_or_else(|| "unknown".into()),
                    ));
                }
            }
        }

        match self
            .submitter
            .submit_swap(&opportunity.buy_chain, wallet, nonce, &steps, opportunity.amount_in)
            .await
        {
            Ok(tx_hash) => {
                ctx.nonce_manager.confirm(&opportunity.buy_chain, wallet, nonce);
                Ok(StrategyOutcome {
                    chain: opportunity.buy_chain.clone(),
                    tx_hash,
                    realized_profit_usd: opportunity.expected_profit,
                })
            }
            Err(e) => {
                ctx.nonce_manager.fail(&opportunity.buy_chain, wallet, nonce);
                Err(ErrorCode::ErrUnexpected(format!("swap submission failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::opportunity::OpportunityKind;
    use crate::test_support::build_context;
    use alloy::primitives::address;

    struct FakeSubmitter {
        fails: bool,
    }

    #[async_trait]
    impl SwapSubmitter for FakeSubmitter {
        async fn submit_swap(&self, _chain: &str, _wallet: Address, _nonce: u64, _steps: &[SwapPathStep], _amount_in: U256) -> anyhow::Result<String> {
            if self.fails {
                anyhow::bail!("broadcast rejected")
            } else {
                Ok("0xswap".into())
            }
        }
    }

    fn opportunity() -> Opportunity {
        Opportunity {
            id: "opp-1".into(),
            kind: OpportunityKind::SingleChain,
            buy_chain: "arbitrum".into(),
            sell_chain: "arbitrum".into(),
            buy_venue: "uniswap".into(),
            sell_venue: "sushiswap".into(),
            token_in: address!("1111111111111111111111111111111111111111").to_string(),
            token_out: address!("2222222222222222222222222222222222222222").to_string(),
            amount_in: U256::from(1_000_000u64),
            expected_profit: 12.0,
            confidence: 0.9,
            expiry: None,
            intent_payload: None,
            path_hints: None,
        }
    }

    #[tokio::test]
    async fn successful_submission_confirms_nonce_and_returns_outcome() {
        let strategy = SingleChainStrategy::new(Arc::new(FakeSubmitter { fails: false }), 50, Duration::from_secs(1));
        let ctx = build_context();
        let outcome = strategy.execute(&opportunity(), &ctx).await.unwrap();
        assert_eq!(outcome.chain, "arbitrum");
        assert_eq!(outcome.tx_hash, "0xswap");
        // nonce 0 was reserved+confirmed, so the next reservation is 1.
        assert_eq!(ctx.nonce_manager.reserve("arbitrum", ctx.wallet_address()).unwrap(), 1);
    }

    #[tokio::test]
    async fn submission_failure_still_releases_the_lock() {
        let strategy = SingleChainStrategy::new(Arc::new(FakeSubmitter { fails: true }), 50, Duration::from_secs(1));
        let ctx = build_context();
        let err = strategy.execute(&opportunity(), &ctx).await.unwrap_err();
        assert_eq!(err.tag(), "ERR_UNEXPECTED");
    }

    #[tokio::test]
    async fn unknown_chain_is_rejected_before_any_nonce_reservation() {
        let strategy = SingleChainStrategy::new(Arc::new(FakeSubmitter { fails: false }), 50, Duration::from_secs(1));
        let ctx = build_context();
        let mut opp = opportunity();
        opp.buy_chain = "not-a-chain".into();
        opp.sell_chain = "not-a-chain".into();
        let err = strategy.execute(&opp, &ctx).await.unwrap_err();
        assert_eq!(err.tag(), "VAL_UNKNOWN_CHAIN");
    }
}
