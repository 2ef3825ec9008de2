use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::model::errors::ErrorCode;

/// Closed: executing normally. Open: rejecting everything until the
/// cooldown elapses. HalfOpen: a bounded number of probe attempts are
/// let through to decide whether to close again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_period: Duration,
    pub half_open_max_attempts: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            cooldown_period: Duration::from_secs(300),
            half_open_max_attempts: 1,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), ErrorCode> {
        if self.failure_threshold == 0 {
            return Err(ErrorCode::ErrConfig(
                "failure_threshold must be >= 1".into(),
            ));
        }
        if self.half_open_max_attempts == 0 {
            return Err(ErrorCode::ErrConfig(
                "half_open_max_attempts must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<i64>,
    half_open_attempts: u32,
}

/// Per-strategy (or global) safety gate around execution, grounded in
/// the `SafetyCircuitBreaker` pattern the pack's `AlphaPulse` arbitrage
/// engine wraps its `ExecutionEngine` with (`safety_breaker:
/// Arc<RwLock<SafetyCircuitBreaker>>` checked before every dispatch).
/// Here the lock is `parking_lot::Mutex` since the check-then-act
/// sequence (`can_execute` then `record_*`) must be serialized, not
/// just read-guarded.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Result<Self, ErrorCode> {
        config.validate()?;
        let (state_tx, _) = watch::channel(BreakerState::Closed);
        Ok(CircuitBreaker {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_attempts: 0,
            }),
            state_tx,
        })
    }

    /// Subscribe to state transitions — the orchestrator wires this into
    /// metrics and structured logs without polling `state()`.
    pub fn subscribe(&self) -> watch::Receiver<BreakerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether an execution attempt may proceed right now. Transitions
    /// `Open` -> `HalfOpen` when the cooldown has elapsed, counting this
    /// call as the first probe attempt.
    pub fn can_execute(&self, now: i64) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| now - t).unwrap_or(0);
                if elapsed >= self.config.cooldown_period.as_secs() as i64 {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_attempts = 1;
                    self.emit(inner.state);
                    info!("circuit breaker entering half-open state");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_attempts < self.config.half_open_max_attempts {
                    inner.half_open_attempts += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            info!("circuit breaker closing after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_attempts = 0;
        self.emit(inner.state);
    }

    pub fn record_failure(&self, now: i64) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                warn!("probe failed while half-open, reopening circuit");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.half_open_attempts = 0;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker tripped"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                }
            }
            BreakerState::Open => {}
        }
        self.emit(inner.state);
    }

    pub fn force_open(&self, now: i64) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Open;
        inner.opened_at = Some(now);
        inner.half_open_attempts = 0;
        self.emit(inner.state);
    }

    pub fn force_close(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_attempts = 0;
        self.emit(inner.state);
    }

    fn emit(&self, state: BreakerState) {
        let _ = self.state_tx.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown_period: Duration::from_secs(300),
            half_open_max_attempts: 1,
        })
        .unwrap()
    }

    #[test]
    fn starts_closed_and_allows_execution() {
        let b = breaker(5);
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.can_execute(0));
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let b = breaker(3);
        for _ in 0..2 {
            b.record_failure(1000);
        }
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure(1000);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.can_execute(1001));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(3);
        b.record_failure(1000);
        b.record_failure(1000);
        b.record_success();
        b.record_failure(1000);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn transitions_to_half_open_after_cooldown() {
        let b = breaker(1);
        b.record_failure(1000);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.can_execute(1100));
        assert!(b.can_execute(1000 + 300));
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let b = breaker(1);
        b.record_failure(1000);
        assert!(b.can_execute(1300));
        b.record_failure(1300);
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_probe_success_closes() {
        let b = breaker(1);
        b.record_failure(1000);
        assert!(b.can_execute(1300));
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_max_attempts_limits_concurrent_probes() {
        let b = breaker(1);
        b.record_failure(1000);
        assert!(b.can_execute(1300));
        assert!(!b.can_execute(1300));
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = BreakerConfig {
            failure_threshold: 0,
            ..BreakerConfig::default()
        };
        assert!(CircuitBreaker::new(cfg).is_err());
    }

    #[test]
    fn force_open_and_close() {
        let b = breaker(5);
        b.force_open(0);
        assert_eq!(b.state(), BreakerState::Open);
        b.force_close();
        assert_eq!(b.state(), BreakerState::Closed);
    }
}
