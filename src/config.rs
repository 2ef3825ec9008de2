use std::collections::HashSet;
use std::time::Duration;

use alloy::primitives::Address;

use crate::breaker::BreakerConfig;
use crate::model::errors::ErrorCode;
use crate::orchestrator::OrchestratorConfig;
use crate::stream::{ConsumerConfig, DlqConfig, ValidationConfig};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Every tunable named in the config surface (§6), collected behind one
/// struct the way [`crate::provider::wallet`] collects secret resolution
/// behind one function — `from_env` is the single place that knows the
/// `ARB_EXEC_CORE_*` variable names, everything downstream takes a typed
/// config struct instead of reading the environment itself.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Consumer / DLQ
    pub scan_interval: Duration,
    pub max_messages_per_scan: usize,
    pub max_message_age: Duration,
    pub max_stream_length: usize,
    pub auto_recovery_enabled: bool,
    pub max_auto_replays_per_scan: usize,
    pub replay_cooldown: Duration,

    // Validation
    pub confidence_threshold: f64,
    pub min_profit_percentage: f64,
    pub supported_chains: HashSet<String>,

    // Circuit breaker
    pub breaker_enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_period: Duration,
    pub half_open_max_attempts: u32,

    // Simulation gating
    pub min_profit_for_simulation: f64,
    pub time_critical_threshold: Duration,
    pub use_fallback: bool,

    // Solana bundle strategy
    pub max_price_deviation_pct: f64,
    pub tip_lamports: u64,
    pub max_slippage_bps: u32,
    pub min_profit_lamports: u64,

    // Intent-fill strategy
    pub min_profit_usd: f64,
    pub max_gas_price_gwei: f64,

    // Swap-step builder
    pub slippage_bps: u32,

    // Orchestrator
    pub max_inflight: usize,
    pub execution_timeout: Duration,

    pub service_name: String,
    pub instance_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            scan_interval: Duration::from_secs(60),
            max_messages_per_scan: 100,
            max_message_age: Duration::from_secs(86_400),
            max_stream_length: 10_000,
            auto_recovery_enabled: true,
            max_auto_replays_per_scan: 5,
            replay_cooldown: Duration::from_secs(300),

            confidence_threshold: 0.70,
            min_profit_percentage: 0.01,
            supported_chains: ["ethereum", "arbitrum", "optimism", "base", "solana"]
                .into_iter()
                .map(String::from)
                .collect(),

            breaker_enabled: true,
            failure_threshold: 5,
            cooldown_period: Duration::from_secs(300),
            half_open_max_attempts: 1,

            min_profit_for_simulation: 5.0,
            time_critical_threshold: Duration::from_millis(500),
            use_fallback: true,

            max_price_deviation_pct: 1.0,
            tip_lamports: 10_000,
            max_slippage_bps: 50,
            min_profit_lamports: 1_000,

            min_profit_usd: 1.0,
            max_gas_price_gwei: 500.0,

            slippage_bps: 50,

            max_inflight: 16,
            execution_timeout: Duration::from_secs(30),

            service_name: "arb-exec-core".into(),
            instance_id: "default".into(),
        }
    }
}

impl AppConfig {
    /// Overlay `ARB_EXEC_CORE_*` environment variables on top of the
    /// documented defaults. Unset or unparsable variables fall back to
    /// the default silently — an operator running with no environment
    /// configured at all still gets a working (conservative) core.
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            scan_interval: Duration::from_millis(env_or("ARB_EXEC_CORE_SCAN_INTERVAL_MS", defaults.scan_interval.as_millis() as u64)),
            max_messages_per_scan: env_or("ARB_EXEC_CORE_MAX_MESSAGES_PER_SCAN", defaults.max_messages_per_scan),
            max_message_age: Duration::from_millis(env_or("ARB_EXEC_CORE_MAX_MESSAGE_AGE_MS", defaults.max_message_age.as_millis() as u64)),
            max_stream_length: env_or("ARB_EXEC_CORE_MAX_STREAM_LENGTH", defaults.max_stream_length),
            auto_recovery_enabled: env_bool("ARB_EXEC_CORE_AUTO_RECOVERY_ENABLED", defaults.auto_recovery_enabled),
            max_auto_replays_per_scan: env_or("ARB_EXEC_CORE_MAX_AUTO_REPLAYS_PER_SCAN", defaults.max_auto_replays_per_scan),
            replay_cooldown: defaults.replay_cooldown,

            confidence_threshold: env_or("ARB_EXEC_CORE_CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            min_profit_percentage: env_or("ARB_EXEC_CORE_MIN_PROFIT_PERCENTAGE", defaults.min_profit_percentage),
            supported_chains: defaults.supported_chains.clone(),

            breaker_enabled: env_bool("ARB_EXEC_CORE_BREAKER_ENABLED", defaults.breaker_enabled),
            failure_threshold: env_or("ARB_EXEC_CORE_FAILURE_THRESHOLD", defaults.failure_threshold),
            cooldown_period: Duration::from_millis(env_or("ARB_EXEC_CORE_COOLDOWN_PERIOD_MS", defaults.cooldown_period.as_millis() as u64)),
            half_open_max_attempts: env_or("ARB_EXEC_CORE_HALF_OPEN_MAX_ATTEMPTS", defaults.half_open_max_attempts),

            min_profit_for_simulation: env_or("ARB_EXEC_CORE_MIN_PROFIT_FOR_SIMULATION", defaults.min_profit_for_simulation),
            time_critical_threshold: Duration::from_millis(env_or(
                "ARB_EXEC_CORE_TIME_CRITICAL_THRESHOLD_MS",
                defaults.time_critical_threshold.as_millis() as u64,
            )),
            use_fallback: env_bool("ARB_EXEC_CORE_USE_FALLBACK", defaults.use_fallback),

            max_price_deviation_pct: env_or("ARB_EXEC_CORE_MAX_PRICE_DEVIATION_PCT", defaults.max_price_deviation_pct),
            tip_lamports: env_or("ARB_EXEC_CORE_TIP_LAMPORTS", defaults.tip_lamports),
            max_slippage_bps: env_or("ARB_EXEC_CORE_MAX_SLIPPAGE_BPS", defaults.max_slippage_bps),
            min_profit_lamports: env_or("ARB_EXEC_CORE_MIN_PROFIT_LAMPORTS", defaults.min_profit_lamports),

            min_profit_usd: env_or("ARB_EXEC_CORE_MIN_PROFIT_USD", defaults.min_profit_usd),
            max_gas_price_gwei: env_or("ARB_EXEC_CORE_MAX_GAS_PRICE_GWEI", defaults.max_gas_price_gwei),

            slippage_bps: env_or("ARB_EXEC_CORE_SLIPPAGE_BPS", defaults.slippage_bps),

            max_inflight: env_or("ARB_EXEC_CORE_MAX_INFLIGHT", defaults.max_inflight),
            execution_timeout: Duration::from_millis(env_or("ARB_EXEC_CORE_EXECUTION_TIMEOUT_MS", defaults.execution_timeout.as_millis() as u64)),

            service_name: std::env::var("ARB_EXEC_CORE_SERVICE_NAME").unwrap_or(defaults.service_name),
            instance_id: std::env::var("ARB_EXEC_CORE_INSTANCE_ID").unwrap_or(defaults.instance_id),
        }
    }

    pub fn consumer_config(&self, source_stream: impl Into<String>) -> ConsumerConfig {
        ConsumerConfig {
            source_stream: source_stream.into(),
            scan_interval: self.scan_interval,
            max_messages_per_scan: self.max_messages_per_scan,
            service_name: self.service_name.clone(),
            instance_id: self.instance_id.clone(),
        }
    }

    pub fn dlq_config(&self, dlq_stream: impl Into<String>, target_stream: impl Into<String>) -> DlqConfig {
        DlqConfig {
            dlq_stream: dlq_stream.into(),
            target_stream: target_stream.into(),
            scan_interval: self.scan_interval,
            max_messages_per_scan: self.max_messages_per_scan,
            max_message_age: self.max_message_age,
            max_stream_length: self.max_stream_length,
            auto_recovery_enabled: self.auto_recovery_enabled,
            max_auto_replays_per_scan: self.max_auto_replays_per_scan,
            replay_cooldown: self.replay_cooldown,
            service_name: self.service_name.clone(),
            instance_id: self.instance_id.clone(),
        }
    }

    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            confidence_threshold: self.confidence_threshold,
            min_profit_percentage: self.min_profit_percentage,
            supported_chains: self.supported_chains.clone(),
        }
    }

    pub fn breaker_config(&self) -> Result<BreakerConfig, ErrorCode> {
        let config = BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown_period: self.cooldown_period,
            half_open_max_attempts: self.half_open_max_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_inflight: self.max_inflight,
            execution_timeout: self.execution_timeout,
        }
    }

    pub fn solana_bundle_config(&self, tip_accounts: Vec<solana_sdk::pubkey::Pubkey>) -> crate::strategies::solana_bundle::SolanaBundleConfig {
        crate::strategies::solana_bundle::SolanaBundleConfig {
            max_price_deviation_pct: self.max_price_deviation_pct,
            min_profit_lamports: self.min_profit_lamports,
            tip_lamports: self.tip_lamports,
            tip_accounts,
        }
    }

    pub fn intent_fill_config(&self, reactor_whitelist: HashSet<Address>) -> crate::strategies::intent_fill::IntentFillConfig {
        crate::strategies::intent_fill::IntentFillConfig {
            reactor_whitelist,
            min_profit_usd: self.min_profit_usd,
            max_gas_price_gwei: self.max_gas_price_gwei,
        }
    }
}
