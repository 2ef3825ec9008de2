pub mod pending;
pub mod provider;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{instrument, warn};

use crate::model::errors::ErrorCode;
use crate::model::stats::ExecutionStats;
use provider::{SimulationProvider, SimulationResult};

/// Aggregated per-provider counters (§4.9): request volume split by
/// outcome, latency, how often this provider was reached only because
/// an earlier one failed, and cache hits (no caching layer is wired up
/// yet — the counter exists for when one is).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderMetrics {
    pub total: u64,
    pub successful: u64,
    pub predicted_reverts: u64,
    pub failed: u64,
    pub total_latency_ms: u64,
    pub fallback_count: u64,
    pub cache_hits: u64,
}

impl ProviderMetrics {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ProviderHealth {
    consecutive_failures: u32,
    last_check: i64,
    metrics: ProviderMetrics,
}

/// Point-in-time view of one provider's health + aggregated metrics,
/// named per §4.9's "health struct (healthy flag, last check,
/// consecutive failures, success rate)".
#[derive(Debug, Clone, Copy)]
pub struct ProviderHealthSnapshot {
    pub name: &'static str,
    pub healthy: bool,
    pub last_check: i64,
    pub consecutive_failures: u32,
    pub success_rate: f64,
    pub metrics: ProviderMetrics,
}

/// Aggregate health of the whole simulation subsystem (§4.9): `Healthy`
/// if at least one provider is healthy, `Degraded` if every registered
/// provider is unhealthy, `NotConfigured` if none is registered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateHealth {
    Healthy,
    Degraded,
    NotConfigured,
}

/// Gating + multi-provider aggregation around simulation (§4.7/§4.9):
/// whether to simulate at all (skipped for low-value or time-critical
/// opportunities), which provider answers, and provider health
/// tracking so a degraded provider's position in the fallback order can
/// be deprioritized. Grounded in the `Bonsai515-SolanaTraderNexus`
/// `Validator`'s health/history bookkeeping pattern, adapted from a
/// validation history map to a simulation-provider health map.
pub struct SimulationService {
    providers: Vec<Arc<dyn SimulationProvider>>,
    min_profit_for_simulation: f64,
    time_critical_threshold: Duration,
    use_fallback: bool,
    health: DashMap<&'static str, ProviderHealth>,
    stats: Arc<ExecutionStats>,
}

impl SimulationService {
    pub fn new(
        providers: Vec<Arc<dyn SimulationProvider>>,
        min_profit_for_simulation: f64,
        time_critical_threshold: Duration,
        use_fallback: bool,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        SimulationService {
            providers,
            min_profit_for_simulation,
            time_critical_threshold,
            use_fallback,
            health: DashMap::new(),
            stats,
        }
    }

    /// Whether this opportunity should be simulated before broadcast.
    /// Opportunities under the profit floor, or with less time budget
    /// than `time_critical_threshold` remaining before expiry, skip
    /// simulation entirely — the cost of simulating would eat more of
    /// the execution window than the revert-protection is worth.
    pub fn should_simulate(&self, expected_profit_usd: f64, time_remaining: Duration) -> bool {
        if expected_profit_usd < self.min_profit_for_simulation {
            return false;
        }
        if time_remaining < self.time_critical_threshold {
            return false;
        }
        true
    }

    /// Run the gated simulation: skip if no provider is configured or
    /// per policy, else try providers in order, falling back to the
    /// next when one errors (not when one predicts a revert).
    #[instrument(skip(self, raw_tx))]
    pub async fn simulate(
        &self,
        chain: &str,
        raw_tx: &[u8],
        expected_profit_usd: f64,
        time_remaining: Duration,
    ) -> Result<Option<SimulationResult>, ErrorCode> {
        if self.providers.is_empty() || !self.should_simulate(expected_profit_usd, time_remaining) {
            self.stats.inc_simulation_skipped();
            return Ok(None);
        }

        let mut last_err = None;
        for (i, provider) in self.providers.iter().enumerate() {
            let started = Instant::now();
            let outcome = provider.simulate(chain, raw_tx).await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let now = chrono::Utc::now().timestamp();

            match outcome {
                Ok(result) => {
                    let mut entry = self.health.entry(provider.name()).or_default();
                    entry.consecutive_failures = 0;
                    entry.last_check = now;
                    entry.metrics.total += 1;
                    entry.metrics.total_latency_ms += latency_ms;
                    if result.would_revert {
                        entry.metrics.predicted_reverts += 1;
                    } else {
                        entry.metrics.successful += 1;
                    }
                    if i > 0 {
                        entry.metrics.fallback_count += 1;
                    }
                    drop(entry);

                    self.stats.inc_simulated();
                    if result.would_revert {
                        self.stats.inc_simulation_predicted_revert();
                    }
                    return Ok(Some(result));
                }
                Err(e) => {
                    let mut entry = self.health.entry(provider.name()).or_default();
                    entry.consecutive_failures += 1;
                    entry.last_check = now;
                    entry.metrics.total += 1;
                    entry.metrics.total_latency_ms += latency_ms;
                    entry.metrics.failed += 1;
                    drop(entry);

                    warn!(provider = provider.name(), error = %e, "simulation provider failed");
                    last_err = Some(e);
                    if !self.use_fallback {
                        break;
                    }
                }
            }
        }

        Err(ErrorCode::ErrSimError(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no simulation providers configured".into()),
        ))
    }

    /// Snapshot of each provider's consecutive-failure count — kept for
    /// callers that only care about the failure streak.
    pub fn provider_health(&self) -> Vec<(&'static str, u32)> {
        self.health
            .iter()
            .map(|e| (*e.key(), e.value().consecutive_failures))
            .collect()
    }

    /// Full per-provider health + metrics snapshot (§4.9).
    pub fn provider_health_snapshots(&self) -> Vec<ProviderHealthSnapshot> {
        self.health
            .iter()
            .map(|e| {
                let h = e.value();
                ProviderHealthSnapshot {
                    name: *e.key(),
                    healthy: h.consecutive_failures == 0,
                    last_check: h.last_check,
                    consecutive_failures: h.consecutive_failures,
                    success_rate: h.metrics.success_rate(),
                    metrics: h.metrics,
                }
            })
            .collect()
    }

    /// Aggregate health of the simulation subsystem (§4.9): healthy if
    /// any registered provider is healthy, degraded if every registered
    /// provider is unhealthy, not-configured if none was ever observed.
    pub fn aggregate_health(&self) -> AggregateHealth {
        if self.providers.is_empty() {
            return AggregateHealth::NotConfigured;
        }
        let any_healthy = self.providers.iter().any(|p| {
            self.health
                .get(p.name())
                .map(|h| h.consecutive_failures == 0)
                .unwrap_or(true)
        });
        if any_healthy {
            AggregateHealth::Healthy
        } else {
            AggregateHealth::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysOk;
    #[async_trait]
    impl SimulationProvider for AlwaysOk {
        fn name(&self) -> &'static str {
            "always-ok"
        }
        async fn simulate(&self, _chain: &str, _raw_tx: &[u8]) -> anyhow::Result<SimulationResult> {
            Ok(SimulationResult::success(21_000))
        }
    }

    struct AlwaysErr;
    #[async_trait]
    impl SimulationProvider for AlwaysErr {
        fn name(&self) -> &'static str {
            "always-err"
        }
        async fn simulate(&self, _chain: &str, _raw_tx: &[u8]) -> anyhow::Result<SimulationResult> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    fn stats() -> Arc<ExecutionStats> {
        Arc::new(ExecutionStats::default())
    }

    #[tokio::test]
    async fn no_providers_configured_skips_rather_than_errors() {
        let svc = SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, stats());
        let result = svc
            .simulate("arbitrum", b"tx", 100.0, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn low_profit_opportunities_skip_simulation() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysOk)],
            10.0,
            Duration::from_secs(1),
            true,
            stats(),
        );
        let result = svc
            .simulate("arbitrum", b"tx", 1.0, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn time_critical_opportunities_skip_simulation() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysOk)],
            1.0,
            Duration::from_secs(5),
            true,
            stats(),
        );
        let result = svc
            .simulate("arbitrum", b"tx", 10.0, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_error() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysErr), Arc::new(AlwaysOk)],
            1.0,
            Duration::from_secs(1),
            true,
            stats(),
        );
        let result = svc
            .simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(result.is_some());
        assert!(!result.unwrap().would_revert);
    }

    #[tokio::test]
    async fn fallback_disabled_stops_at_first_failure() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysErr), Arc::new(AlwaysOk)],
            1.0,
            Duration::from_secs(1),
            false,
            stats(),
        );
        let err = svc
            .simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "ERR_SIM_ERROR");
    }

    #[tokio::test]
    async fn provider_health_tracks_consecutive_failures() {
        let svc = SimulationService::new(vec![Arc::new(AlwaysErr)], 1.0, Duration::from_secs(1), false, stats());
        let _ = svc.simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60)).await;
        let health = svc.provider_health();
        assert_eq!(health, vec![("always-err", 1)]);
    }

    #[tokio::test]
    async fn snapshot_reports_full_metrics_after_a_success() {
        let svc = SimulationService::new(vec![Arc::new(AlwaysOk)], 1.0, Duration::from_secs(1), true, stats());
        svc.simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60)).await.unwrap();
        let snapshots = svc.provider_health_snapshots();
        assert_eq!(snapshots.len(), 1);
        let snap = snapshots[0];
        assert!(snap.healthy);
        assert_eq!(snap.metrics.total, 1);
        assert_eq!(snap.metrics.successful, 1);
        assert_eq!(snap.metrics.failed, 0);
        assert_eq!(snap.success_rate, 1.0);
    }

    #[tokio::test]
    async fn fallback_provider_is_counted_as_a_fallback() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysErr), Arc::new(AlwaysOk)],
            1.0,
            Duration::from_secs(1),
            true,
            stats(),
        );
        svc.simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60)).await.unwrap();
        let snapshots = svc.provider_health_snapshots();
        let ok = snapshots.iter().find(|s| s.name == "always-ok").unwrap();
        assert_eq!(ok.metrics.fallback_count, 1);
    }

    #[test]
    fn aggregate_health_is_not_configured_with_no_providers() {
        let svc = SimulationService::new(vec![], 1.0, Duration::from_secs(1), true, stats());
        assert_eq!(svc.aggregate_health(), AggregateHealth::NotConfigured);
    }

    #[tokio::test]
    async fn aggregate_health_is_degraded_when_the_only_provider_is_unhealthy() {
        let svc = SimulationService::new(vec![Arc::new(AlwaysErr)], 1.0, Duration::from_secs(1), false, stats());
        svc.simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60)).await.unwrap_err();
        assert_eq!(svc.aggregate_health(), AggregateHealth::Degraded);
    }

    #[tokio::test]
    async fn aggregate_health_is_healthy_if_any_provider_is_healthy() {
        let svc = SimulationService::new(
            vec![Arc::new(AlwaysErr), Arc::new(AlwaysOk)],
            1.0,
            Duration::from_secs(1),
            true,
            stats(),
        );
        svc.simulate("arbitrum", b"tx", 10.0, Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.aggregate_health(), AggregateHealth::Healthy);
    }
}
