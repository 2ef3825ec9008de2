use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use alloy::primitives::Address;

macro_rules! lazy_static_router_registry {
    ( $( ($chain_id:expr, $name:expr) => $addr:expr ),* $(,)? ) => {
        fn build_router_registry() -> HashMap<(u64, String), Address> {
            let mut m = HashMap::new();
            $(
                m.insert(($chain_id, $name.to_string()), $addr.parse::<Address>().unwrap());
            )*
            m
        }

        static KNOWN_ROUTERS: LazyLock<HashMap<(u64, String), Address>> =
            LazyLock::new(build_router_registry);
    };
}

lazy_static_router_registry! {
    (1, "uniswap-v2") => "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
    (1, "uniswap-v3") => "0xE592427A0AEce92De3Edee1F18E0157C05861564",
    (1, "sushiswap") => "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F",
    (42161, "uniswap-v3") => "0xE592427A0AEce92De3Edee1F18E0157C05861564",
    (42161, "camelot") => "0xc873fEcbd354f5A56E00E710B90EF4201db2448d",
    (42161, "sushiswap") => "0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506",
    (8453, "uniswap-v3") => "0x2626664c2603336E57B271c5C0b26F421741e481",
    (8453, "aerodrome") => "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43",
    (10, "uniswap-v3") => "0xE592427A0AEce92De3Edee1F18E0157C05861564",
    (10, "velodrome") => "0x9c12939390052919aF3155f41Bf4160Fd3666A6f",
}

/// Constant-time chain x dex-name -> router lookup (and its reverse),
/// built once at startup per config — reuses the teacher's
/// `lazy_static_token_registry!` shape from `venues/evm.rs` but
/// resolved into an instance-owned map instead of a process-global
/// static, since which DEXes are disabled is a runtime config choice,
/// not a compile-time constant.
pub struct DexRegistry {
    by_name: HashMap<(u64, String), Address>,
    by_address: HashMap<(u64, Address), String>,
}

impl DexRegistry {
    /// `disabled` names are excluded from both directions of the
    /// lookup; matching is case-insensitive, names are lowercase
    /// internally.
    pub fn build(disabled: &HashSet<String>) -> Self {
        let disabled_lower: HashSet<String> = disabled.iter().map(|s| s.to_lowercase()).collect();
        let mut by_name = HashMap::new();
        let mut by_address = HashMap::new();
        for ((chain_id, name), addr) in KNOWN_ROUTERS.iter() {
            if disabled_lower.contains(name) {
                continue;
            }
            by_name.insert((*chain_id, name.clone()), *addr);
            by_address.insert((*chain_id, *addr), name.clone());
        }
        DexRegistry {
            by_name,
            by_address,
        }
    }

    pub fn router(&self, chain_id: u64, dex_name: &str) -> Option<Address> {
        self.by_name
            .get(&(chain_id, dex_name.to_lowercase()))
            .copied()
    }

    pub fn dex_name(&self, chain_id: u64, router: Address) -> Option<&str> {
        self.by_address.get(&(chain_id, router)).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_router_resolves_case_insensitively() {
        let reg = DexRegistry::build(&HashSet::new());
        assert!(reg.router(1, "Uniswap-V2").is_some());
        assert!(reg.router(1, "uniswap-v2").is_some());
    }

    #[test]
    fn unknown_chain_or_dex_is_none() {
        let reg = DexRegistry::build(&HashSet::new());
        assert!(reg.router(999, "uniswap-v2").is_none());
        assert!(reg.router(1, "not-a-dex").is_none());
    }

    #[test]
    fn disabled_dex_is_excluded() {
        let mut disabled = HashSet::new();
        disabled.insert("uniswap-v3".to_string());
        let reg = DexRegistry::build(&disabled);
        assert!(reg.router(1, "uniswap-v3").is_none());
        assert!(reg.router(1, "sushiswap").is_some());
    }

    #[test]
    fn reverse_lookup_matches_forward() {
        let reg = DexRegistry::build(&HashSet::new());
        let addr = reg.router(8453, "aerodrome").unwrap();
        assert_eq!(reg.dex_name(8453, addr), Some("aerodrome"));
    }
}
