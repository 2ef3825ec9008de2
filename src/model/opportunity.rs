use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// What shape of execution an opportunity requires — drives strategy
/// dispatch (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpportunityKind {
    SingleChain,
    CrossChain,
    IntentFill,
    CommitReveal,
    SolanaBundle,
}

impl OpportunityKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single-chain" => Some(Self::SingleChain),
            "cross-chain" => Some(Self::CrossChain),
            "intent-fill" => Some(Self::IntentFill),
            "commit-reveal" => Some(Self::CommitReveal),
            "solana-bundle" => Some(Self::SolanaBundle),
            _ => None,
        }
    }
}

/// A candidate arbitrage execution handed down from the upstream
/// detector, after having passed the consumer's validation pipeline
/// (§4.1). Field names mirror the wire contract in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub kind: OpportunityKind,
    pub buy_chain: String,
    pub sell_chain: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub token_in: String,
    pub token_out: String,
    /// Wire amount as a digit-only decimal string, already validated as
    /// non-zero and parseable by the consumer. Kept alongside the
    /// resolved `U256` since DLQ replay needs the original string.
    pub amount_in: U256,
    pub expected_profit: f64,
    pub confidence: f64,
    /// Unix timestamp seconds, if the opportunity carries an expiry.
    pub expiry: Option<i64>,
    /// Opaque signed bytes for the intent-fill strategy (UniswapX-style
    /// Dutch auction order). Only present for `OpportunityKind::IntentFill`.
    pub intent_payload: Option<Vec<u8>>,
    /// Optional hints about the swap path, consumed by the swap-step
    /// builder when present instead of deriving one from scratch.
    pub path_hints: Option<Vec<String>>,
}

/// Errors raised while checking the data-model invariants in §3 — distinct
/// from the wire-parsing validation pipeline in §4.1, which produces
/// [`crate::model::ErrorCode`] directly. This type exists so invariant
/// checks can be unit tested against constructed values without going
/// through JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpportunityInvariantError {
    #[error("amountIn must be > 0")]
    ZeroAmount,
    #[error("cross-chain opportunity must have buyChain != sellChain")]
    CrossChainSameChain,
    #[error("single-chain opportunity must have buyChain == sellChain")]
    SingleChainDifferentChains,
}

impl Opportunity {
    /// Checks §3's invariants that aren't already enforced by the wire
    /// validation pipeline (those run once, at acceptance; this runs
    /// again wherever an `Opportunity` is constructed directly, e.g. in
    /// tests or DLQ replay).
    pub fn check_invariants(&self) -> Result<(), OpportunityInvariantError> {
        if self.amount_in.is_zero() {
            return Err(OpportunityInvariantError::ZeroAmount);
        }
        match self.kind {
            OpportunityKind::CrossChain => {
                if self.buy_chain == self.sell_chain {
                    return Err(OpportunityInvariantError::CrossChainSameChain);
                }
            }
            _ => {
                if self.buy_chain != self.sell_chain
                    && matches!(self.kind, OpportunityKind::SingleChain)
                {
                    return Err(OpportunityInvariantError::SingleChainDifferentChains);
                }
            }
        }
        Ok(())
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|exp| exp <= now)
    }
}
