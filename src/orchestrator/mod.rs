pub mod context;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::breaker::CircuitBreaker;
use crate::model::errors::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::model::stats::ExecutionStats;
use crate::strategies::{StrategyOutcome, StrategyRegistry};

use context::StrategyContext;

pub struct OrchestratorConfig {
    pub max_inflight: usize,
    pub execution_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_inflight: 16,
            execution_timeout: Duration::from_secs(30),
        }
    }
}

/// Turns a validated opportunity into at most one transaction submission
/// (§4.2). Owns the in-flight lock set and the active-execution counter as
/// plain fields — the same "framework-free state on the struct" shape as
/// the teacher's `Engine` owning `balances`/`venues` directly rather than
/// behind a DI container.
pub struct ExecutionOrchestrator {
    config: OrchestratorConfig,
    breaker: Arc<CircuitBreaker>,
    registry: StrategyRegistry,
    context: StrategyContext,
    inflight: Mutex<HashSet<String>>,
    active: AtomicUsize,
    stats: Arc<ExecutionStats>,
}

impl ExecutionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        breaker: Arc<CircuitBreaker>,
        registry: StrategyRegistry,
        context: StrategyContext,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        ExecutionOrchestrator {
            config,
            breaker,
            registry,
            context,
            inflight: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            stats,
        }
    }

    pub fn active_executions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Runs the §4.2 algorithm for one opportunity: breaker gate, lock
    /// acquisition, bounded concurrency, strategy dispatch under a
    /// wall-clock timeout, and breaker outcome recording. The lock is
    /// always released on every exit path, including a timeout.
    #[instrument(skip(self, opportunity), fields(id = %opportunity.id, kind = ?opportunity.kind))]
    pub async fn execute(&self, opportunity: &Opportunity, now: i64) -> Result<StrategyOutcome, ErrorCode> {
        if !self.breaker.can_execute(now) {
            self.stats.inc_circuit_blocks();
            return Err(ErrorCode::ErrCircuitOpen);
        }

        if !self.try_lock(&opportunity.id) {
            self.stats.inc_lock_conflicts();
            return Err(ErrorCode::ErrLockConflict(opportunity.id.clone()));
        }

        let result = self.execute_locked(opportunity, now).await;

        self.unlock(&opportunity.id);
        result
    }

    async fn execute_locked(&self, opportunity: &Opportunity, now: i64) -> Result<StrategyOutcome, ErrorCode> {
        let active = self.active.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_inflight {
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.stats.inc_queue_rejects();
            return Err(ErrorCode::ErrQueueFull);
        }

        let outcome = self.dispatch(opportunity).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match &outcome {
            Ok(o) => {
                self.stats.inc_succeeded();
                self.breaker.record_success();
                info!(chain = %o.chain, tx_hash = %o.tx_hash, "execution succeeded");
            }
            Err(ErrorCode::ErrTimeout) => {
                self.stats.inc_timed_out();
                self.breaker.record_failure(now);
                warn!("execution timed out");
            }
            Err(e) => {
                self.stats.inc_failed();
                self.breaker.record_failure(now);
                warn!(error = %e, "execution failed");
            }
        }

        outcome
    }

    async fn dispatch(&self, opportunity: &Opportunity) -> Result<StrategyOutcome, ErrorCode> {
        self.stats.inc_attempted();
        let strategy = self.registry.resolve(opportunity)?;
        let ctx = self.context.clone();
        match tokio::time::timeout(self.config.execution_timeout, strategy.execute(opportunity, &ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ErrorCode::ErrTimeout),
        }
    }

    fn try_lock(&self, id: &str) -> bool {
        self.inflight.lock().insert(id.to_string())
    }

    fn unlock(&self, id: &str) {
        self.inflight.lock().remove(id);
    }
}
