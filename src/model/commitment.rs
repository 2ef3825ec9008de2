use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// One step of the swap path committed to on-chain — must match the
/// on-chain contract's struct layout byte-for-byte (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathStep {
    pub router: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_out_min: U256,
}

/// The plaintext parameters hidden behind a commitment hash during the
/// commit phase and revealed one block later (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealParams {
    pub asset: Address,
    pub amount_in: U256,
    pub swap_path: Vec<SwapPathStep>,
    pub min_profit: U256,
    pub deadline: U256,
    pub salt: B256,
}

/// Storage record for an in-flight commitment (§3, §4.4). Keyed by
/// `(chain, commitment_hash)` at the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRecord {
    pub commitment_hash: B256,
    pub chain: String,
    pub submitted_block: u64,
    /// Always `submitted_block + 1` — invariant P5.
    pub reveal_block: u64,
    pub reveal_params: RevealParams,
    pub expected_profit: Option<f64>,
    /// Unix seconds the record was created; used by the in-memory store
    /// to emulate the ~10 minute TTL the distributed store enforces
    /// natively.
    pub created_at: i64,
}

impl CommitmentRecord {
    pub fn new(
        commitment_hash: B256,
        chain: String,
        submitted_block: u64,
        reveal_params: RevealParams,
        expected_profit: Option<f64>,
        now: i64,
    ) -> Self {
        CommitmentRecord {
            commitment_hash,
            chain,
            submitted_block,
            reveal_block: submitted_block + 1,
            reveal_params,
            expected_profit,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: i64, ttl_secs: i64) -> bool {
        now - self.created_at >= ttl_secs
    }
}
