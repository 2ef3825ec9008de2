pub mod commit_reveal;
pub mod cross_chain;
pub mod intent_fill;
pub mod simulation_strategy;
pub mod single_chain;
pub mod solana_bundle;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::errors::ErrorCode;
use crate::model::opportunity::{Opportunity, OpportunityKind};
use crate::orchestrator::context::StrategyContext;

#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub chain: String,
    pub tx_hash: String,
    pub realized_profit_usd: f64,
}

/// The uniform operation every execution path implements — the same
/// trait-object-per-kind shape as the teacher's `Venue` trait, dispatched
/// here by a fixed priority list instead of a per-node-type registry
/// (§4.6).
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, opportunity: &Opportunity, ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode>;
}

/// Logical strategy slots a registered implementation can fill. Distinct
/// from [`OpportunityKind`] since "simulation mode" overrides kind-based
/// routing entirely (§4.6 item 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategySlot {
    Simulation,
    CrossChain,
    IntentFill,
    SolanaBundle,
    CommitReveal,
    SingleChain,
}

/// Maps a logical slot to its implementation and applies the fixed
/// resolution order from §4.6. Only `SingleChain` is required for
/// readiness; every other slot is optional and its absence is a
/// dispatch-time failure, not a construction-time one.
pub struct StrategyRegistry {
    strategies: HashMap<StrategySlot, Box<dyn Strategy>>,
    simulation_mode: bool,
}

impl StrategyRegistry {
    pub fn new(simulation_mode: bool) -> Self {
        StrategyRegistry {
            strategies: HashMap::new(),
            simulation_mode,
        }
    }

    pub fn register(&mut self, slot: StrategySlot, strategy: Box<dyn Strategy>) {
        self.strategies.insert(slot, strategy);
    }

    pub fn is_ready(&self) -> bool {
        self.strategies.contains_key(&StrategySlot::SingleChain)
    }

    /// Pick the strategy to run for `opportunity`, per the resolution
    /// order in §4.6.
    pub fn resolve(&self, opportunity: &Opportunity) -> Result<&dyn Strategy, ErrorCode> {
        if self.simulation_mode {
            return self.get(StrategySlot::Simulation);
        }
        let slot = match opportunity.kind {
            OpportunityKind::CrossChain => StrategySlot::CrossChain,
            OpportunityKind::IntentFill => StrategySlot::IntentFill,
            OpportunityKind::SolanaBundle => StrategySlot::SolanaBundle,
            OpportunityKind::CommitReveal => StrategySlot::CommitReveal,
            OpportunityKind::SingleChain => StrategySlot::SingleChain,
        };
        self.get(slot)
    }

    fn get(&self, slot: StrategySlot) -> Result<&dyn Strategy, ErrorCode> {
        self.strategies
            .get(&slot)
            .map(|b| b.as_ref())
            .ok_or_else(|| ErrorCode::ErrUnexpected(format!("no strategy registered for slot {slot:?}")))
    }
}
