use async_trait::async_trait;
use rand::Rng;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;

use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::orchestrator::context::StrategyContext;

use super::{Strategy, StrategyOutcome};

#[derive(Debug, Clone)]
pub struct RouteQuote {
    pub amount_out_lamports: u64,
    /// The detector's own estimate, for the price-deviation guard.
    pub detection_estimate_lamports: u64,
    pub route_instructions: Vec<Instruction>,
}

/// Boundary to a Solana route aggregator. Hostname trust is checked at
/// construction time (SSRF guard), not per call, since the aggregator
/// set is a startup-time config choice.
#[async_trait]
pub trait RouteQuoteProvider: Send + Sync {
    async fn quote(&self, input_mint: &str, output_mint: &str, amount_in_lamports: u64) -> anyhow::Result<RouteQuote>;
}

/// Constructs one from an aggregator base URL, rejecting untrusted
/// hosts up front so no strategy call can smuggle in an internal
/// address after construction.
pub struct UrlCheckedAggregator<P> {
    inner: P,
}

impl<P> UrlCheckedAggregator<P> {
    pub fn new(base_url: &str, trusted_hosts: &[&str], inner: P) -> Result<Self, ErrorCode> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| ErrorCode::ErrConfig(format!("invalid aggregator url: {e}")))?;
        let host = parsed.host_str().unwrap_or("");
        if !trusted_hosts.iter().any(|h| *h == host) {
            return Err(ErrorCode::ErrUntrustedHost(host.to_string()));
        }
        Ok(UrlCheckedAggregator { inner })
    }
}

#[async_trait]
impl<P: RouteQuoteProvider> RouteQuoteProvider for UrlCheckedAggregator<P> {
    async fn quote(&self, input_mint: &str, output_mint: &str, amount_in_lamports: u64) -> anyhow::Result<RouteQuote> {
        self.inner.quote(input_mint, output_mint, amount_in_lamports).await
    }
}

/// Boundary to the bundle-protection relay (e.g. a Jito-style block
/// engine) that submits the signed transaction with simulation enabled.
#[async_trait]
pub trait MevBundleProvider: Send + Sync {
    async fn submit_bundle(&self, tx: &VersionedTransaction, simulate: bool) -> anyhow::Result<String>;
}

pub struct SolanaBundleConfig {
    pub max_price_deviation_pct: f64,
    pub min_profit_lamports: u64,
    pub tip_lamports: u64,
    pub tip_accounts: Vec<Pubkey>,
}

/// Solana-native arbitrage via a single versioned transaction plus a
/// validator tip, protected by a bundle relay (§4.6 item 4). The tip
/// account is chosen at random from a configured set each submission so
/// a single account's congestion doesn't bottleneck every execution.
pub struct SolanaBundleStrategy {
    route: std::sync::Arc<dyn RouteQuoteProvider>,
    bundle: std::sync::Arc<dyn MevBundleProvider>,
    config: SolanaBundleConfig,
}

impl SolanaBundleStrategy {
    pub fn new(route: std::sync::Arc<dyn RouteQuoteProvider>, bundle: std::sync::Arc<dyn MevBundleProvider>, config: SolanaBundleConfig) -> Result<Self, ErrorCode> {
        if config.tip_accounts.is_empty() {
            return Err(ErrorCode::ErrConfig("solana bundle strategy requires at least one tip account".into()));
        }
        Ok(SolanaBundleStrategy {
            route,
            bundle,
            config,
        })
    }

    fn pick_tip_account(&self) -> Pubkey {
        let idx = rand::rng().random_range(0..self.config.tip_accounts.len());
        self.config.tip_accounts[idx]
    }
}

#[async_trait]
impl Strategy for SolanaBundleStrategy {
    fn name(&self) -> &'static str {
        "solana-bundle"
    }

    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        let wallet = ctx
            .solana_wallet
            .as_ref()
            .ok_or_else(|| ErrorCode::ErrConfig("no Solana wallet configured".into()))?;

        let amount_in_lamports: u64 = opportunity
            .amount_in
            .try_into()
            .map_err(|_| ErrorCode::ValMalformed("amountIn does not fit in u64 lamports".into()))?;

        let quote = self
            .route
            .quote(&opportunity.token_in, &opportunity.token_out, amount_in_lamports)
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("route quote failed: {e}")))?;

        let deviation_pct = if quote.detection_estimate_lamports == 0 {
            0.0
        } else {
            100.0
                * (quote.amount_out_lamports as f64 - quote.detection_estimate_lamports as f64).abs()
                / quote.detection_estimate_lamports as f64
        };
        if deviation_pct > self.config.max_price_deviation_pct {
            return Err(ErrorCode::ErrPriceDeviation {
                actual: deviation_pct,
                max: self.config.max_price_deviation_pct,
            });
        }

        let net_profit_lamports = quote
            .amount_out_lamports
            .saturating_sub(amount_in_lamports)
            .saturating_sub(self.config.tip_lamports);
        if net_profit_lamports < self.config.min_profit_lamports {
            return Err(ErrorCode::ErrLowProfit);
        }

        let tip_account = self.pick_tip_account();
        let tip_ix = system_instruction::transfer(&wallet.pubkey(), &tip_account, self.config.tip_lamports);

        let mut instructions = quote.route_instructions.clone();
        instructions.push(tip_ix);

        let blockhash = ctx
            .providers
            .provider("solana")
            .ok_or_else(|| ErrorCode::ErrNoProvider("solana".into()))?;
        // Block height stands in for a recent blockhash fetch here: the
        // concrete Solana RPC call (`getLatestBlockhash`) is a wire-format
        // boundary this core doesn't implement (§1).
        let _ = blockhash.block_number().await;

        let message = Message::new(&instructions, Some(&wallet.pubkey()));
        let tx = VersionedTransaction::try_new(solana_sdk::message::VersionedMessage::Legacy(message), &[&wallet.keypair])
            .map_err(|e| ErrorCode::ErrUnexpected(format!("transaction signing failed: {e}")))?;

        let tx_hash = self
            .bundle
            .submit_bundle(&tx, true)
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("bundle submission failed: {e}")))?;

        Ok(StrategyOutcome {
            chain: "solana".to_string(),
            tx_hash,
            realized_profit_usd: opportunity.expected_profit,
        })
    }
}
