use clap::{Parser, Subcommand};

/// Cross-venue arbitrage execution core — consumes validated
/// opportunities off a stream, dispatches them through a strategy, and
/// guards every submission with a circuit breaker.
#[derive(Parser)]
#[command(name = "arbctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the opportunity consumer, DLQ subsystem, and execution
    /// orchestrator until interrupted.
    Run {
        #[arg(long, default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        #[arg(long, default_value = "opportunities")]
        source_stream: String,

        #[arg(long, default_value = "opportunities:dlq")]
        dlq_stream: String,

        /// `chain=rpc_url`, repeatable. Only EVM chains need an entry —
        /// Solana strategies read a blockhash through the same provider
        /// lookup keyed on "solana".
        #[arg(long = "evm-rpc", value_parser = parse_chain_url)]
        evm_rpc: Vec<(String, String)>,

        /// Route every opportunity through the simulator instead of a
        /// live submitter. Concrete submitters for single-chain,
        /// cross-chain, commit-reveal, intent-fill, and Solana-bundle
        /// execution are supplied by embedding this crate as a library;
        /// this binary only demonstrates the self-contained simulation
        /// path end to end.
        #[arg(long, default_value_t = true)]
        simulation_mode: bool,

        /// Process whatever is currently queued, then exit, instead of
        /// running the scan loops indefinitely.
        #[arg(long)]
        once: bool,
    },

    /// Re-publish one opportunity's dead-lettered entries back onto the
    /// source stream, bypassing the retryable-code filter auto-recovery
    /// applies.
    Replay {
        opportunity_id: String,

        #[arg(long, default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        #[arg(long, default_value = "opportunities:dlq")]
        dlq_stream: String,

        #[arg(long, default_value = "opportunities")]
        target_stream: String,
    },

    /// One-shot snapshot of DLQ depth, per-code counts, and provider
    /// reachability — for health checks and manual triage.
    Status {
        #[arg(long, default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        #[arg(long, default_value = "opportunities:dlq")]
        dlq_stream: String,

        #[arg(long = "evm-rpc", value_parser = parse_chain_url)]
        evm_rpc: Vec<(String, String)>,
    },
}

fn parse_chain_url(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(chain, url)| (chain.to_string(), url.to_string()))
        .ok_or_else(|| format!("expected `chain=url`, got `{raw}`"))
}
