use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

/// One UniswapX-style Dutch-auction order, decoded from
/// `Opportunity.intent_payload`. The wire encoding itself is a boundary
/// (§1 scopes out concrete aggregator/order wire formats); `decode`
/// stands in for whatever signed-order parser a concrete deployment
/// plugs in.
#[derive(Debug, Clone)]
pub struct IntentOrder {
    pub reactor: Address,
    pub chain_id: u64,
    pub is_exclusive_filler: bool,
    pub decay_start: i64,
    pub decay_end: i64,
    pub deadline: i64,
    pub start_amount_out: U256,
    pub end_amount_out: U256,
}

/// Boundary to whatever decodes the opaque intent payload bytes into a
/// structured order. Kept separate from [`IntentFillStrategy`] so tests
/// can supply fixed orders without round-tripping a real wire format.
pub trait IntentOrderDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> anyhow::Result<IntentOrder>;
}

/// Boundary to submitting a fill transaction against the reactor
/// contract.
#[async_trait]
pub trait IntentFiller: Send + Sync {
    async fn submit_fill(&self, chain: &str, reactor: Address, order_payload: &[u8], amount_out: U256) -> anyhow::Result<String>;
}

/// Linear interpolation between `decay_start`/`decay_end`, clamped at
/// the endpoints — §4.6 item 3's price-decay curve.
fn current_amount_out(order: &IntentOrder, now: i64) -> U256 {
    if now <= order.decay_start {
        return order.start_amount_out;
    }
    if now >= order.decay_end {
        return order.end_amount_out;
    }
    let elapsed = (now - order.decay_start) as u128;
    let span = (order.decay_end - order.decay_start) as u128;
    let delta = order.start_amount_out.saturating_sub(order.end_amount_out);
    let decayed = delta.saturating_mul(U256::from(elapsed)) / U256::from(span.max(1));
    order.start_amount_out.saturating_sub(decayed)
}

pub struct IntentFillConfig {
    pub reactor_whitelist: HashSet<Address>,
    pub min_profit_usd: f64,
    pub max_gas_price_gwei: f64,
}

/// Fills Dutch-auction intent orders (§4.6 item 3): reactor whitelist,
/// chain-id match, exclusivity window, linear decay, profit floor, gas
/// ceiling.
pub struct IntentFillStrategy {
    decoder: std::sync::Arc<dyn IntentOrderDecoder>,
    filler: std::sync::Arc<dyn IntentFiller>,
    config: IntentFillConfig,
}

impl IntentFillStrategy {
    pub fn new(decoder: std::sync::Arc<dyn IntentOrderDecoder>, filler: std::sync::Arc<dyn IntentFiller>, config: IntentFillConfig) -> Self {
        IntentFillStrategy {
            decoder,
            filler,
            config,
        }
    }
}

#[async_trait]
impl Strategy for IntentFillStrategy {
    fn name(&self) -> &'static str {
        "intent-fill"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let payload = opportunity
            .intent_payload
            .as_ref()
            .ok_or_else(|| ErrorCode::ValMissingField("intentPayload".into()))?;
        let order = self
            .decoder
            .decode(payload)
            .map_err(|e| ErrorCode::ValMalformed(format!("intent payload decode failed: {e}")))?;

        if !self.config.reactor_whitelist.contains(&order.reactor) {
            return Err(ErrorCode::ErrUntrustedHost(order.reactor.to_string()));
        }

        let chain_info = crate::model::chain::Chain::from_name(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ValUnknownChain(opportunity.buy_chain.clone()))?;
        if chain_info.chain_id() != Some(order.chain_id) {
            return Err(ErrorCode::ValMalformed(format!(
                "order chain id {} does not match execution chain `{}`",
                order.chain_id, opportunity.buy_chain
            )));
        }

        let now = chrono::Utc::now().timestamp();
        if now > order.deadline {
            return Err(ErrorCode::ValExpired { expiry: order.deadline, now });
        }

        if order.is_exclusive_filler {
            // Exclusivity is enforced by the reactor contract on submission;
            // this core has no independent way to know if it holds that
            // slot ahead of time, so exclusivity-window orders are skipped
            // rather than raced.
            return Err(ErrorCode::ErrUnexpected("order is in its exclusivity window for another filler".into()));
        }

        let amount_out = current_amount_out(&order, now);

        let provider = ctx
            .providers
            .provider(&opportunity.buy_chain)
            .ok_or_else(|| ErrorCode::ErrNoProvider(opportunity.buy_chain.clone()))?;
        let gas_gwei = provider
            .gas_price_gwei()
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("gas price read failed: {e}")))?;
        if gas_gwei > self.config.max_gas_price_gwei {
            return Err(ErrorCode::ErrGasSpike {
                chain: opportunity.buy_chain.clone(),
                current: gas_gwei,
                baseline: self.config.max_gas_price_gwei,
                multiplier: 1.0,
            });
        }

        if opportunity.expected_profit < self.config.min_profit_usd {
            return Err(ErrorCode::ErrLowProfit);
        }

        let tx_hash = self
            .filler
            .submit_fill(&opportunity.buy_chain, order.reactor, payload, amount_out)
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("fill submission failed: {e}")))?;

        Ok(StrategyOutcome {
            chain: opportunity.buy_chain.clone(),
            tx_hash,
            realized_profit_usd: opportunity.expected_profit,
        })
    }
}
