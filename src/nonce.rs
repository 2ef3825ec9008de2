use std::collections::HashMap;

use alloy::primitives::Address;
use parking_lot::Mutex;

use crate::model::errors::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NonceKey {
    chain: String,
    wallet: Address,
}

/// Tracks strictly increasing per-(chain, wallet) nonces so concurrent
/// strategy dispatch never double-assigns one. `reserve` hands out the
/// next nonce optimistically; `confirm`/`fail` are the terminal calls
/// that close out a reservation — `fail` does not roll the counter
/// back, matching the teacher's own nonce handling in
/// `venues/evm.rs`-style submission paths, where a failed broadcast
/// still burns the nonce on-chain.
pub struct NonceManager {
    next: Mutex<HashMap<NonceKey, u64>>,
}

impl NonceManager {
    pub fn new() -> Self {
        NonceManager {
            next: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the starting nonce for a wallet on a chain, e.g. from an
    /// `eth_getTransactionCount` call at provider connect time. A
    /// no-op if a nonce is already tracked for this key.
    pub fn seed(&self, chain: &str, wallet: Address, starting_nonce: u64) {
        self.next
            .lock()
            .entry(NonceKey {
                chain: chain.to_string(),
                wallet,
            })
            .or_insert(starting_nonce);
    }

    pub fn reserve(&self, chain: &str, wallet: Address) -> Result<u64, ErrorCode> {
        let mut next = self.next.lock();
        let entry = next
            .get_mut(&NonceKey {
                chain: chain.to_string(),
                wallet,
            })
            .ok_or_else(|| ErrorCode::ErrNonce(format!("no nonce tracked for {wallet} on {chain}")))?;
        let nonce = *entry;
        *entry += 1;
        Ok(nonce)
    }

    /// Confirmed on-chain — no-op, the reservation already advanced the
    /// counter. Kept as a distinct call so callers don't need to know
    /// that confirm/fail are symmetric here.
    pub fn confirm(&self, _chain: &str, _wallet: Address, _nonce: u64) {}

    pub fn fail(&self, _chain: &str, _wallet: Address, _nonce: u64) {}

    /// Re-seed after a provider reconnect — the prior in-memory nonce
    /// may be stale if a transaction was dropped without confirmation.
    pub fn reset_chain(&self, chain: &str, wallet: Address, fresh_nonce: u64) {
        self.next.lock().insert(
            NonceKey {
                chain: chain.to_string(),
                wallet,
            },
            fresh_nonce,
        );
    }
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}
