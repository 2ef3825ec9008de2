use std::num::NonZeroUsize;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use lru::LruCache;
use parking_lot::Mutex;

use crate::dex::DexRegistry;
use crate::model::commitment::SwapPathStep;
use crate::model::errors::ErrorCode;

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    opportunity_id: String,
    chain: String,
    slippage_bps: u32,
}

struct CacheEntry {
    steps: Vec<SwapPathStep>,
    inserted_at: i64,
}

/// Builds the ordered swap path for a route, applying a uniform
/// slippage tolerance to each hop's minimum output, and caches the
/// result for 60 seconds per `(opportunityId, chain, slippageBps)` —
/// repeated strategy retries within one opportunity's lifetime don't
/// re-derive the same path. Grounded in the `zircuit-labs-zr-kona-public`
/// pack member's `lru`-backed block/receipt cache, generalized here from
/// a fixed-capacity-only cache to one with an additional manual TTL
/// check on read, since `lru` itself has no notion of expiry.
pub struct SwapStepBuilder {
    dex_registry: DexRegistry,
    cache: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl SwapStepBuilder {
    pub fn new(dex_registry: DexRegistry, capacity: usize) -> Self {
        SwapStepBuilder {
            dex_registry,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
        }
    }

    /// `route` is an ordered list of `(dex_name, token_in, token_out,
    /// expected_amount_out)` hops. `slippage_bps` applies uniformly to
    /// every hop's `amount_out_min`.
    pub fn build(
        &self,
        opportunity_id: &str,
        chain_id: u64,
        chain_name: &str,
        slippage_bps: u32,
        route: &[(String, Address, Address, U256)],
        now: i64,
    ) -> Result<Vec<SwapPathStep>, ErrorCode> {
        let key = CacheKey {
            opportunity_id: opportunity_id.to_string(),
            chain: chain_name.to_string(),
            slippage_bps,
        };

        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(&key) {
                if now - entry.inserted_at < CACHE_TTL.as_secs() as i64 {
                    return Ok(entry.steps.clone());
                }
                cache.pop(&key);
            }
        }

        let mut steps = Vec::with_capacity(route.len());
        for (dex_name, token_in, token_out, amount_out) in route {
            let router = self
                .dex_registry
                .router(chain_id, dex_name)
                .ok_or_else(|| ErrorCode::ErrNoRoute(token_in.to_string(), token_out.to_string()))?;
            let amount_out_min = apply_slippage(*amount_out, slippage_bps);
            steps.push(SwapPathStep {
                router,
                token_in: *token_in,
                token_out: *token_out,
                amount_out_min,
            });
        }

        self.cache.lock().put(
            key,
            CacheEntry {
                steps: steps.clone(),
                inserted_at: now,
            },
        );
        Ok(steps)
    }
}

fn apply_slippage(amount_out: U256, slippage_bps: u32) -> U256 {
    let bps = U256::from(slippage_bps as u64);
    let discount = amount_out.saturating_mul(bps) / U256::from(10_000u64);
    amount_out.saturating_sub(discount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::collections::HashSet;

    fn builder() -> SwapStepBuilder {
        SwapStepBuilder::new(DexRegistry::build(&HashSet::new()), 16)
    }

    fn route() -> Vec<(String, Address, Address, U256)> {
        vec![(
            "uniswap-v3".to_string(),
            address!("1111111111111111111111111111111111111111"),
            address!("2222222222222222222222222222222222222222"),
            U256::from(1_000_000u64),
        )]
    }

    #[test]
    fn slippage_reduces_amount_out_min() {
        let steps = builder()
            .build("opp-1", 1, "ethereum", 50, &route(), 1_700_000_000)
            .unwrap();
        assert_eq!(steps[0].amount_out_min, U256::from(995_000u64));
    }

    #[test]
    fn unknown_dex_errors() {
        let mut route = route();
        route[0].0 = "not-a-dex".to_string();
        let err = builder()
            .build("opp-1", 1, "ethereum", 50, &route, 1_700_000_000)
            .unwrap_err();
        assert_eq!(err.tag(), "ERR_NO_ROUTE");
    }

    #[test]
    fn cached_result_is_reused_within_ttl() {
        let b = builder();
        let first = b.build("opp-1", 1, "ethereum", 50, &route(), 1_700_000_000).unwrap();
        let second = b.build("opp-1", 1, "ethereum", 50, &route(), 1_700_000_059).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cache_expires_after_ttl() {
        let b = builder();
        b.build("opp-1", 1, "ethereum", 50, &route(), 1_700_000_000).unwrap();
        let mut later_route = route();
        later_route[0].3 = U256::from(2_000_000u64);
        let refreshed = b
            .build("opp-1", 1, "ethereum", 50, &later_route, 1_700_000_061)
            .unwrap();
        assert_eq!(refreshed[0].amount_out_min, U256::from(1_990_000u64));
    }
}
