use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for every decision point named in §3. Backed by
/// `AtomicU64` fields rather than a mutex-guarded struct since every
/// counter is independently incremented and reads are eventually
/// consistent snapshots, matching how the teacher's backtest
/// `ArbitrageMetrics`-style structs are updated from multiple call sites.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    pub received: AtomicU64,
    pub rejected: AtomicU64,
    pub attempted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub simulated: AtomicU64,
    pub simulation_skipped: AtomicU64,
    pub simulation_predicted_revert: AtomicU64,
    pub circuit_trips: AtomicU64,
    pub circuit_blocks: AtomicU64,
    pub lock_conflicts: AtomicU64,
    pub queue_rejects: AtomicU64,
    pub risk_caution: AtomicU64,
    pub provider_reconnects: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident, $get:ident);* $(;)?) => {
        $(
            pub fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
            pub fn $get(&self) -> u64 {
                self.$field.load(Ordering::Relaxed)
            }
        )*
    };
}

impl ExecutionStats {
    counter_accessors! {
        received => inc_received, received;
        rejected => inc_rejected, rejected;
        attempted => inc_attempted, attempted;
        succeeded => inc_succeeded, succeeded;
        failed => inc_failed, failed;
        timed_out => inc_timed_out, timed_out;
        simulated => inc_simulated, simulated;
        simulation_skipped => inc_simulation_skipped, simulation_skipped;
        simulation_predicted_revert => inc_simulation_predicted_revert, simulation_predicted_revert;
        circuit_trips => inc_circuit_trips, circuit_trips;
        circuit_blocks => inc_circuit_blocks, circuit_blocks;
        lock_conflicts => inc_lock_conflicts, lock_conflicts;
        queue_rejects => inc_queue_rejects, queue_rejects;
        risk_caution => inc_risk_caution, risk_caution;
        provider_reconnects => inc_provider_reconnects, provider_reconnects;
    }
}
