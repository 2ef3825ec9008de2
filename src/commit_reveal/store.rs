use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::commitment::CommitmentRecord;
use crate::model::errors::ErrorCode;

/// Boundary to a distributed key-value store supporting atomic
/// set-if-absent with a TTL — the collision check that makes
/// `ERR_DUPLICATE_COMMITMENT` race-free across multiple instances of
/// this service. No production implementation ships in this crate (the
/// concrete store is a deployment choice); [`CommitmentStore`] degrades
/// to its in-memory mirror alone when none is configured.
#[async_trait]
pub trait DistributedKvStore: Send + Sync {
    /// Returns `true` if `key` was absent and is now set, `false` if it
    /// already existed (no write performed).
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// Commitment TTL mirrors the ~10 minute window a commit has to be
/// revealed before it's considered abandoned (§3, §4.4).
pub const COMMITMENT_TTL: Duration = Duration::from_secs(600);

/// Hybrid store for in-flight commitments: an optional distributed
/// backend for cross-instance collision detection, always mirrored
/// in-process via `dashmap` so a lookup never round-trips to the
/// network. Keyed by `"{chain}:{commitment_hash}"`.
pub struct CommitmentStore {
    distributed: Option<Arc<dyn DistributedKvStore>>,
    mirror: DashMap<String, CommitmentRecord>,
}

impl CommitmentStore {
    pub fn new(distributed: Option<Arc<dyn DistributedKvStore>>) -> Self {
        CommitmentStore {
            distributed,
            mirror: DashMap::new(),
        }
    }

    fn key(chain: &str, commitment_hash: &alloy::primitives::B256) -> String {
        format!("{chain}:{commitment_hash}")
    }

    /// Record a new commitment, failing with `ERR_DUPLICATE_COMMITMENT`
    /// if the same `(chain, commitment_hash)` was already recorded and
    /// hasn't expired.
    pub async fn record(&self, record: CommitmentRecord) -> Result<(), ErrorCode> {
        let key = Self::key(&record.chain, &record.commitment_hash);

        if let Some(store) = &self.distributed {
            let value = serde_json::to_string(&record)
                .map_err(|e| ErrorCode::ErrUnexpected(e.to_string()))?;
            let inserted = store
                .set_if_absent(&key, &value, COMMITMENT_TTL)
                .await
                .map_err(|e| ErrorCode::ErrUnexpected(e.to_string()))?;
            if !inserted {
                return Err(ErrorCode::ErrDuplicateCommitment(key));
            }
        } else if self.mirror.contains_key(&key) {
            return Err(ErrorCode::ErrDuplicateCommitment(key));
        }

        self.mirror.insert(key, record);
        Ok(())
    }

    pub fn get(&self, chain: &str, commitment_hash: &alloy::primitives::B256) -> Option<CommitmentRecord> {
        self.mirror.get(&Self::key(chain, commitment_hash)).map(|r| r.clone())
    }

    /// Drop a commitment once its state machine concludes: revealed,
    /// cancelled, or expired (§4.4).
    pub fn remove(&self, chain: &str, commitment_hash: &alloy::primitives::B256) {
        self.mirror.remove(&Self::key(chain, commitment_hash));
    }

    /// Drop mirrored entries past their TTL — called periodically by
    /// whatever owns this store, since the in-memory mirror has no
    /// native expiry unlike the distributed backend.
    pub fn sweep_expired(&self, now: i64) {
        self.mirror
            .retain(|_, record| !record.is_expired(now, COMMITMENT_TTL.as_secs() as i64));
    }
}
