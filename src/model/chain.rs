use serde::{Deserialize, Serialize};

/// Discriminates the execution family a [`Chain`] belongs to — EVM chains
/// share a signer/provider stack, Solana does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    Evm,
    Solana,
}

/// A blockchain the execution core can submit transactions to.
///
/// In JSON, chains are always objects:
/// - EVM chain: `{"name": "arbitrum", "kind": "evm", "chain_id": 42161, "rpc_url": "..."}`
/// - Solana: `{"name": "solana", "kind": "solana", "rpc_url": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    pub kind: ChainKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl Chain {
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_evm(&self) -> bool {
        self.kind == ChainKind::Evm
    }
}

// ── Convenience constructors ─────────────────────────────────────────

impl Chain {
    pub fn ethereum() -> Self {
        Chain::evm("ethereum", 1, "https://eth.llamarpc.com")
    }
    pub fn arbitrum() -> Self {
        Chain::evm("arbitrum", 42161, "https://arb1.arbitrum.io/rpc")
    }
    pub fn optimism() -> Self {
        Chain::evm("optimism", 10, "https://mainnet.optimism.io")
    }
    pub fn base() -> Self {
        Chain::evm("base", 8453, "https://mainnet.base.org")
    }
    pub fn solana() -> Self {
        Chain {
            name: "solana".into(),
            kind: ChainKind::Solana,
            chain_id: None,
            rpc_url: Some("https://api.mainnet-beta.solana.com".into()),
        }
    }

    pub fn evm(name: impl Into<String>, chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Chain {
            name: name.into(),
            kind: ChainKind::Evm,
            chain_id: Some(chain_id),
            rpc_url: Some(rpc_url.into()),
        }
    }

    /// Construct a chain from its name, matching known chains. Returns
    /// `None` for unrecognized names — callers reject those as
    /// `[VAL_UNKNOWN_CHAIN]` in the consumer validation pipeline rather
    /// than silently accepting a chain with no RPC endpoint.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ethereum" => Some(Self::ethereum()),
            "arbitrum" => Some(Self::arbitrum()),
            "optimism" => Some(Self::optimism()),
            "base" => Some(Self::base()),
            "solana" => Some(Self::solana()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_chain_names_resolve() {
        assert!(Chain::from_name("arbitrum").is_some());
        assert!(Chain::from_name("Solana").is_some());
        assert!(Chain::from_name("not-a-chain").is_none());
    }

    #[test]
    fn evm_vs_solana_kind() {
        assert!(Chain::arbitrum().is_evm());
        assert!(!Chain::solana().is_evm());
    }
}
