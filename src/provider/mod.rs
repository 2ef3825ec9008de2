pub mod wallet;

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::gas::GasPolicy;
use crate::model::stats::ExecutionStats;
use crate::nonce::NonceManager;

/// What this core needs from a live chain connection: the current
/// block height (health + commit-reveal block waits) and the wallet's
/// transaction count (nonce re-seeding after reconnect).
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn block_number(&self) -> anyhow::Result<u64>;
    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64>;
    /// Current gas price in gwei, fed into [`crate::gas::GasPolicy`]'s
    /// spike guard ahead of a submission.
    async fn gas_price_gwei(&self) -> anyhow::Result<f64>;
}

/// Builds a fresh [`ChainProvider`] for a chain's RPC URL — the
/// reconnect factory. One connector is shared across every EVM chain
/// since reconnecting is identical modulo the URL.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, rpc_url: &str) -> anyhow::Result<Arc<dyn ChainProvider>>;
}

/// `alloy`-backed connector: `ProviderBuilder::new().connect_http(url)`,
/// type-erased via `.erased()` so every chain's provider is stored
/// behind one trait object instead of `ProviderBuilder`'s concrete
/// generic output type.
pub struct AlloyProviderConnector;

#[async_trait]
impl ProviderConnector for AlloyProviderConnector {
    async fn connect(&self, rpc_url: &str) -> anyhow::Result<Arc<dyn ChainProvider>> {
        use alloy::providers::{Provider, ProviderBuilder};
        let url = rpc_url
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid rpc url `{rpc_url}`: {e}"))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Arc::new(AlloyChainProvider { provider }))
    }
}

struct AlloyChainProvider {
    provider: alloy::providers::DynProvider,
}

#[async_trait]
impl ChainProvider for AlloyChainProvider {
    async fn block_number(&self) -> anyhow::Result<u64> {
        use alloy::providers::Provider;
        Ok(self.provider.get_block_number().await?)
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        use alloy::providers::Provider;
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn gas_price_gwei(&self) -> anyhow::Result<f64> {
        use alloy::providers::Provider;
        let wei = self.provider.get_gas_price().await?;
        Ok(wei as f64 / 1e9)
    }
}

struct Registration {
    provider: Arc<dyn ChainProvider>,
    rpc_url: String,
    consecutive_failures: u32,
}

/// Owns every chain's live provider, the per-chain health state, and
/// wires reconnection into the gas baseline and nonce manager —
/// grounded in how the teacher rebuilds a fresh `ProviderBuilder`
/// connection per call in `venues/evm.rs`/`bridge2.rs` rather than
/// holding a long-lived handle, generalized here into an explicit
/// health-checked lifecycle since this core runs as a long-lived
/// daemon instead of a one-shot CLI invocation.
pub struct ProviderManager {
    connector: Arc<dyn ProviderConnector>,
    registrations: DashMap<String, Mutex<Registration>>,
    failure_threshold: u32,
    gas_policy: Arc<GasPolicy>,
    nonce_manager: Arc<NonceManager>,
    wallet_address: Address,
    stats: Arc<ExecutionStats>,
}

impl ProviderManager {
    pub fn new(
        connector: Arc<dyn ProviderConnector>,
        gas_policy: Arc<GasPolicy>,
        nonce_manager: Arc<NonceManager>,
        wallet_address: Address,
        failure_threshold: u32,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        ProviderManager {
            connector,
            registrations: DashMap::new(),
            failure_threshold,
            gas_policy,
            nonce_manager,
            wallet_address,
            stats,
        }
    }

    pub async fn connect(&self, chain: &str, rpc_url: &str) -> anyhow::Result<()> {
        let provider = self.connector.connect(rpc_url).await?;
        let starting_nonce = provider.transaction_count(self.wallet_address).await?;
        self.nonce_manager.seed(chain, self.wallet_address, starting_nonce);
        self.registrations.insert(
            chain.to_string(),
            Mutex::new(Registration {
                provider,
                rpc_url: rpc_url.to_string(),
                consecutive_failures: 0,
            }),
        );
        Ok(())
    }

    pub fn provider(&self, chain: &str) -> Option<Arc<dyn ChainProvider>> {
        self.registrations
            .get(chain)
            .map(|r| Arc::clone(&r.lock().provider))
    }

    /// Run one health-check tick for `chain`: a failing block-number
    /// call increments the chain's failure counter; once it reaches
    /// `failure_threshold`, reconnect — and on a successful reconnect,
    /// clear the chain's gas baseline and re-seed its nonce, since both
    /// were derived from a connection that's now known stale.
    pub async fn check_health(&self, chain: &str) -> anyhow::Result<()> {
        let Some(reg) = self.registrations.get(chain) else {
            return Err(anyhow::anyhow!("no provider registered for {chain}"));
        };
        let (provider, rpc_url, failures) = {
            let guard = reg.lock();
            (Arc::clone(&guard.provider), guard.rpc_url.clone(), guard.consecutive_failures)
        };

        match provider.block_number().await {
            Ok(_) => {
                let mut guard = reg.lock();
                guard.consecutive_failures = 0;
                Ok(())
            }
            Err(e) => {
                let new_failures = failures + 1;
                warn!(chain, consecutive_failures = new_failures, error = %e, "provider health check failed");
                if new_failures >= self.failure_threshold {
                    drop(reg);
                    self.reconnect(chain, &rpc_url).await
                } else {
                    reg.lock().consecutive_failures = new_failures;
                    Ok(())
                }
            }
        }
    }

    async fn reconnect(&self, chain: &str, rpc_url: &str) -> anyhow::Result<()> {
        info!(chain, "reconnecting provider after repeated health check failures");
        let provider = self.connector.connect(rpc_url).await?;
        let fresh_nonce = provider.transaction_count(self.wallet_address).await?;

        self.gas_policy.clear(chain);
        self.nonce_manager
            .reset_chain(chain, self.wallet_address, fresh_nonce);

        if let Some(reg) = self.registrations.get(chain) {
            let mut guard = reg.lock();
            guard.provider = provider;
            guard.consecutive_failures = 0;
        }
        self.stats.inc_provider_reconnects();
        info!(chain, "provider reconnected");
        Ok(())
    }

    pub fn registered_chains(&self) -> Vec<String> {
        self.registrations.iter().map(|e| e.key().clone()).collect()
    }

    /// Synchronously register a provider for `chain`, bypassing the
    /// connector. Test-only — production registration always goes
    /// through [`Self::connect`] so the nonce manager gets re-seeded.
    #[cfg(test)]
    pub(crate) fn register_for_test(&self, chain: &str, provider: Arc<dyn ChainProvider>) {
        self.registrations.insert(
            chain.to_string(),
            Mutex::new(Registration {
                provider,
                rpc_url: String::new(),
                consecutive_failures: 0,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::sync::atomic::{AtomicU32, Ordering};

    const WALLET: Address = address!("1111111111111111111111111111111111111111");

    struct FlakyProvider {
        fail_calls: AtomicU32,
        fails_remaining: u32,
    }

    #[async_trait]
    impl ChainProvider for FlakyProvider {
        async fn block_number(&self) -> anyhow::Result<u64> {
            let n = self.fail_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fails_remaining {
                Err(anyhow::anyhow!("rpc unreachable"))
            } else {
                Ok(100)
            }
        }
        async fn transaction_count(&self, _address: Address) -> anyhow::Result<u64> {
            Ok(42)
        }
        async fn gas_price_gwei(&self) -> anyhow::Result<f64> {
            Ok(50.0)
        }
    }

    struct FakeConnector {
        fails_remaining: u32,
        reconnects: AtomicU32,
    }

    #[async_trait]
    impl ProviderConnector for FakeConnector {
        async fn connect(&self, _rpc_url: &str) -> anyhow::Result<Arc<dyn ChainProvider>> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FlakyProvider {
                fail_calls: AtomicU32::new(0),
                fails_remaining: self.fails_remaining,
            }))
        }
    }

    fn manager(connector: Arc<FakeConnector>) -> ProviderManager {
        ProviderManager::new(
            connector,
            Arc::new(GasPolicy::new(3.0)),
            Arc::new(NonceManager::new()),
            WALLET,
            3,
            Arc::new(ExecutionStats::default()),
        )
    }

    #[tokio::test]
    async fn connect_seeds_nonce_from_transaction_count() {
        let connector = Arc::new(FakeConnector {
            fails_remaining: 0,
            reconnects: AtomicU32::new(0),
        });
        let mgr = manager(connector);
        mgr.connect("arbitrum", "https://example.invalid").await.unwrap();
        assert_eq!(mgr.nonce_manager.reserve("arbitrum", WALLET).unwrap(), 42);
    }

    #[tokio::test]
    async fn reconnects_after_failure_threshold() {
        let connector = Arc::new(FakeConnector {
            fails_remaining: 0,
            reconnects: AtomicU32::new(0),
        });
        let mgr = manager(connector.clone());
        mgr.connect("arbitrum", "https://example.invalid").await.unwrap();

        // Swap in a provider that always fails to force reconnection.
        {
            let reg = mgr.registrations.get("arbitrum").unwrap();
            reg.lock().provider = Arc::new(FlakyProvider {
                fail_calls: AtomicU32::new(0),
                fails_remaining: 999,
            });
        }

        mgr.check_health("arbitrum").await.unwrap();
        mgr.check_health("arbitrum").await.unwrap();
        assert_eq!(connector.reconnects.load(Ordering::SeqCst), 1);
        mgr.check_health("arbitrum").await.unwrap();
        assert_eq!(connector.reconnects.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.stats.provider_reconnects(), 2);
    }

    #[tokio::test]
    async fn gas_baseline_cleared_on_reconnect() {
        let connector = Arc::new(FakeConnector {
            fails_remaining: 0,
            reconnects: AtomicU32::new(0),
        });
        let mgr = manager(connector);
        mgr.connect("arbitrum", "https://example.invalid").await.unwrap();
        mgr.gas_policy.check("arbitrum", 50.0).unwrap();

        {
            let reg = mgr.registrations.get("arbitrum").unwrap();
            reg.lock().provider = Arc::new(FlakyProvider {
                fail_calls: AtomicU32::new(0),
                fails_remaining: 999,
            });
        }
        for _ in 0..3 {
            mgr.check_health("arbitrum").await.unwrap();
        }
        // baseline cleared means a 200gwei reading is treated as a fresh
        // first observation instead of a spike against the old 50gwei baseline.
        assert!(mgr.gas_policy.check("arbitrum", 200.0).is_ok());
    }
}
