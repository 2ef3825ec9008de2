use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::model::stats::ExecutionStats;

/// Histogram buckets for execution latency, in milliseconds. Chosen to
/// straddle the timeout range most strategies configure (single-digit
/// seconds) rather than the sub-millisecond buckets a generic HTTP
/// histogram would use.
const LATENCY_BUCKETS_MS: [u64; 8] = [50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000];

#[derive(Default)]
struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len()],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    fn observe(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        for (i, bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            if ms <= *bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Process-wide metrics surface, exposed as Prometheus text exposition
/// format (§4.9). No HTTP server lives in this crate — whatever embeds
/// this core wires [`Metrics::render_text`] behind its own `/metrics`
/// route, the same boundary the teacher draws around `backtest::metrics`
/// producing a [`BacktestResult`] for its own caller to serve or print
/// rather than owning a server itself.
pub struct Metrics {
    stats: Arc<ExecutionStats>,
    queue_depth: AtomicUsize,
    active_executions: AtomicUsize,
    dlq_length: AtomicUsize,
    consumer_lag: AtomicUsize,
    gas_price_gwei: DashMap<String, f64>,
    latency: LatencyHistogram,
}

impl Metrics {
    pub fn new(stats: Arc<ExecutionStats>) -> Self {
        Metrics {
            stats,
            queue_depth: AtomicUsize::new(0),
            active_executions: AtomicUsize::new(0),
            dlq_length: AtomicUsize::new(0),
            consumer_lag: AtomicUsize::new(0),
            gas_price_gwei: DashMap::new(),
            latency: LatencyHistogram::default(),
        }
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn set_active_executions(&self, count: usize) {
        self.active_executions.store(count, Ordering::Relaxed);
    }

    pub fn set_dlq_length(&self, length: usize) {
        self.dlq_length.store(length, Ordering::Relaxed);
    }

    pub fn set_consumer_lag(&self, lag: usize) {
        self.consumer_lag.store(lag, Ordering::Relaxed);
    }

    pub fn observe_gas_price(&self, chain: &str, gwei: f64) {
        self.gas_price_gwei.insert(chain.to_string(), gwei);
    }

    pub fn observe_execution_latency(&self, elapsed: Duration) {
        self.latency.observe(elapsed);
    }

    /// Render every metric as Prometheus text exposition format. Counter
    /// names mirror [`ExecutionStats`]' field names so the two never
    /// drift apart.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        macro_rules! counter {
            ($name:literal, $help:literal, $value:expr) => {
                out.push_str(&format!("# HELP arb_exec_{0} {1}\n", $name, $help));
                out.push_str(&format!("# TYPE arb_exec_{0} counter\n", $name));
                out.push_str(&format!("arb_exec_{0} {1}\n", $name, $value));
            };
        }

        counter!("opportunities_received_total", "opportunities accepted off the stream", self.stats.received());
        counter!("opportunities_rejected_total", "opportunities rejected during validation", self.stats.rejected());
        counter!("executions_attempted_total", "executions dispatched to a strategy", self.stats.attempted());
        counter!("executions_succeeded_total", "executions that settled successfully", self.stats.succeeded());
        counter!("executions_failed_total", "executions that returned an error", self.stats.failed());
        counter!("executions_timed_out_total", "executions that exceeded the wall-clock budget", self.stats.timed_out());
        counter!("simulations_run_total", "simulation calls that returned a result", self.stats.simulated());
        counter!("simulations_skipped_total", "simulation calls skipped by policy", self.stats.simulation_skipped());
        counter!("simulations_predicted_revert_total", "simulations that predicted a revert", self.stats.simulation_predicted_revert());
        counter!("circuit_trips_total", "times the circuit breaker opened", self.stats.circuit_trips());
        counter!("circuit_blocks_total", "executions rejected by an open circuit", self.stats.circuit_blocks());
        counter!("lock_conflicts_total", "executions rejected for a duplicate in-flight id", self.stats.lock_conflicts());
        counter!("queue_rejects_total", "executions rejected for exceeding the concurrency cap", self.stats.queue_rejects());
        counter!("risk_caution_total", "opportunities flagged by the risk-caution path", self.stats.risk_caution());

        macro_rules! gauge {
            ($name:literal, $help:literal, $value:expr) => {
                out.push_str(&format!("# HELP arb_exec_{0} {1}\n", $name, $help));
                out.push_str(&format!("# TYPE arb_exec_{0} gauge\n", $name));
                out.push_str(&format!("arb_exec_{0} {1}\n", $name, $value));
            };
        }

        gauge!("queue_depth", "opportunities awaiting a free execution slot", self.queue_depth.load(Ordering::Relaxed));
        gauge!("active_executions", "executions currently in flight", self.active_executions.load(Ordering::Relaxed));
        gauge!("dlq_length", "entries currently parked in the dead-letter queue", self.dlq_length.load(Ordering::Relaxed));
        gauge!("consumer_lag", "stream entries behind the consumer's cursor", self.consumer_lag.load(Ordering::Relaxed));

        out.push_str("# HELP arb_exec_gas_price_gwei last observed gas price per chain\n");
        out.push_str("# TYPE arb_exec_gas_price_gwei gauge\n");
        for entry in self.gas_price_gwei.iter() {
            out.push_str(&format!("arb_exec_gas_price_gwei{{chain=\"{}\"}} {}\n", entry.key(), entry.value()));
        }

        out.push_str("# HELP arb_exec_execution_latency_ms execution wall-clock latency\n");
        out.push_str("# TYPE arb_exec_execution_latency_ms histogram\n");
        let mut cumulative = 0u64;
        for (i, bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            cumulative += self.latency.buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!("arb_exec_execution_latency_ms_bucket{{le=\"{bound}\"}} {cumulative}\n"));
        }
        let total = self.latency.count.load(Ordering::Relaxed);
        out.push_str(&format!("arb_exec_execution_latency_ms_bucket{{le=\"+Inf\"}} {total}\n"));
        out.push_str(&format!("arb_exec_execution_latency_ms_sum {}\n", self.latency.sum_ms.load(Ordering::Relaxed)));
        out.push_str(&format!("arb_exec_execution_latency_ms_count {total}\n"));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_counters_and_gauges() {
        let stats = Arc::new(ExecutionStats::default());
        stats.inc_received();
        stats.inc_succeeded();
        let metrics = Metrics::new(stats);
        metrics.set_queue_depth(4);
        metrics.observe_gas_price("arbitrum", 0.25);

        let text = metrics.render_text();
        assert!(text.contains("arb_exec_opportunities_received_total 1"));
        assert!(text.contains("arb_exec_executions_succeeded_total 1"));
        assert!(text.contains("arb_exec_queue_depth 4"));
        assert!(text.contains("arb_exec_gas_price_gwei{chain=\"arbitrum\"} 0.25"));
    }

    #[test]
    fn latency_histogram_buckets_are_cumulative() {
        let metrics = Metrics::new(Arc::new(ExecutionStats::default()));
        metrics.observe_execution_latency(Duration::from_millis(75));
        metrics.observe_execution_latency(Duration::from_millis(3_000));

        let text = metrics.render_text();
        assert!(text.contains("arb_exec_execution_latency_ms_bucket{le=\"50\"} 0"));
        assert!(text.contains("arb_exec_execution_latency_ms_bucket{le=\"100\"} 1"));
        assert!(text.contains("arb_exec_execution_latency_ms_bucket{le=\"5000\"} 2"));
        assert!(text.contains("arb_exec_execution_latency_ms_count 2"));
    }
}
