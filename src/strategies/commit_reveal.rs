use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use rand::RngCore;
use tracing::info;

use crate::model::chain::Chain;
use crate::model::commitment::{RevealParams, SwapPathStep};
use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

/// Drives the commit-reveal state machine (§4.4) end to end for one
/// opportunity: build the reveal parameters, commit, wait for the
/// reveal block to arrive, then reveal. The "wait one block" gap is
/// polled the same way [`crate::cross_chain::CrossChainExecutor`] polls
/// bridge status — on an interval, bailing out cleanly on shutdown.
pub struct CommitRevealStrategy {
    slippage_bps: u32,
    block_poll_interval: Duration,
    block_wait_timeout: Duration,
}

impl CommitRevealStrategy {
    pub fn new(slippage_bps: u32, block_poll_interval: Duration, block_wait_timeout: Duration) -> Self {
        CommitRevealStrategy {
            slippage_bps,
            block_poll_interval,
            block_wait_timeout,
        }
    }

    fn random_salt() -> B256 {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        B256::from(bytes)
    }
}

#[async_trait]
impl Strategy for CommitRevealStrategy {
    fn name(&self) -> &'static str {
        "commit-reveal"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let chain_info = Chain::from_name(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ValUnknownChain(opportunity.buy_chain.clone()))?;
        let chain_id = chain_info.chain_id().unwrap_or_default();

        let asset: Address = opportunity
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
            &[(dex_name, asset, token_out, opportunity.amount_in)],
            now,
        )?;

        let deadline = opportunity.expiry.unwrap_or(now + 300);
        let min_profit = U256::from((opportunity.expected_profit.max(0.0) * 1e6) as u128);

        let reveal = RevealParams {
            asset,
            amount_in: opportunity.amount_in,
            swap_path: steps.iter().cloned().collect::<Vec<SwapPathStep>>(),
            min_profit,
            deadline: U256::from(deadline.max(0) as u64),
            salt: Self::random_salt(),
        };

        let provider = ctx
            .providers
            .provider(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(opportunity.buy_chain.clone()))?;
        let gas_gwei = provider
            .gas_price_gwei()
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("gas price read failed: {e}")))?;
        ctx.gas_policy.check(&opportunity.buy_chain, gas_gwei)?;

        let record = ctx
            .commit_reveal
            .commit(&opportunity.buy_chain, reveal, Some(opportunity.expected_profit), now)
            .await?;

        self.wait_for_reveal_block(&opportunity.buy_chain, record.reveal_block, ctx).await?;

        let tx_hash = ctx
            .commit_reveal
            .reveal(&opportunity.buy_chain, record.commitment_hash, chrono::Utc::now().timestamp())
            .await?;

        Ok(StrategyOutcome {
            chain: opportunity.buy_chain.clone(),
            tx_hash,
            realized_profit_usd: opportunity.expected_profit,
        })
    }
}

impl CommitRevealStrategy {
    async fn wait_for_reveal_block(&self, chain: &str, reveal_block: u64, ctx: &StrategyContext) -> Result<(), ErrorCode> {
        let provider = ctx
            .providers
            .provider(chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(chain.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.block_wait_timeout;
        let mut ticker = tokio::time::interval(self.block_poll_interval);
        let mut shutdown = ctx.shutdown.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ErrorCode::ErrTimeout);
                    }
                    match provider.block_number().await {
                        Ok(block) if block >= reveal_block => {
                            info!(chain, block, reveal_block, "reveal block reached");
                            return Ok(());
                        }
                        Ok(_) => continue,
                        Err(_) => continue,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Err(ErrorCode::ErrShutdown);
                    }
                }
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

    fn opportunity() -> Opportunity {
        Opportunity {
            id: "opp-1".into(),
            kind: OpportunityKind::CommitReveal,
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
    async fn unregistered_provider_is_rejected_before_commit() {
        let strategy = CommitRevealStrategy::new(50, Duration::from_millis(1), Duration::from_millis(5));
        let ctx = build_context();
        let mut opp = opportunity();
        opp.buy_chain = "optimism".into();
        opp.sell_chain = "optimism".into();
        let err = strategy.execute(&opp, &ctx).await.unwrap_err();
        assert_eq!(err.tag(), "ERR_NO_PROVIDER");
    }
}
