pub mod hash;
pub mod store;

use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::model::commitment::{CommitmentRecord, RevealParams};
use crate::model::errors::ErrorCode;
use hash::commitment_hash;
use store::CommitmentStore;

/// Boundary to the chain-specific bits of commit-reveal this core
/// doesn't own: submitting the two transactions and reading the current
/// block height. A concrete implementation wraps an `alloy` provider +
/// the commit-reveal contract's `sol!` bindings; tests use a fake.
#[async_trait]
pub trait CommitRevealChain: Send + Sync {
    async fn current_block(&self, chain: &str) -> anyhow::Result<u64>;
    async fn submit_commit(&self, chain: &str, commitment_hash: B256) -> anyhow::Result<u64>;
    async fn submit_reveal(&self, chain: &str, reveal: &RevealParams) -> anyhow::Result<String>;
}

/// The two-phase commit-reveal state machine (§4.4): submit a
/// commitment hash, wait exactly one block, then reveal the plaintext
/// parameters the hash was built over. Grounded in the teacher's
/// `Bridge2Movement` venue, which holds the same "sign/submit one
/// transaction, wait, then submit the dependent one" shape around a
/// permit signature instead of a hash commitment.
pub struct CommitRevealService {
    chain_client: Arc<dyn CommitRevealChain>,
    store: Arc<CommitmentStore>,
}

impl CommitRevealService {
    pub fn new(chain_client: Arc<dyn CommitRevealChain>, store: Arc<CommitmentStore>) -> Self {
        CommitRevealService {
            chain_client,
            store,
        }
    }

    /// Submit the commit transaction and record the pending reveal.
    /// `expected_profit` and `now` are carried through to the stored
    /// record for later introspection and TTL expiry.
    #[instrument(skip(self, reveal))]
    pub async fn commit(
        &self,
        chain: &str,
        reveal: RevealParams,
        expected_profit: Option<f64>,
        now: i64,
    ) -> Result<CommitmentRecord, ErrorCode> {
        let hash = commitment_hash(
            reveal.asset,
            reveal.amount_in,
            &reveal.swap_path,
            reveal.min_profit,
            reveal.deadline,
            reveal.salt,
        );

        let submitted_block = self
            .chain_client
            .submit_commit(chain, hash)
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("commit submission failed: {e}")))?;

        let record = CommitmentRecord::new(
            hash,
            chain.to_string(),
            submitted_block,
            reveal,
            expected_profit,
            now,
        );
        self.store.record(record.clone()).await?;
        info!(chain, commitment_hash = %hash, submitted_block, "commitment submitted");
        Ok(record)
    }

    /// Reveal a previously committed opportunity. Refuses to reveal
    /// before `reveal_block` (invariant P5: exactly one block after
    /// commit) and refuses once the commitment's TTL has expired.
    #[instrument(skip(self))]
    pub async fn reveal(&self, chain: &str, commitment_hash: B256, now: i64) -> Result<String, ErrorCode> {
        let record = self
            .store
            .get(chain, &commitment_hash)
            .ok_or_else(|| ErrorCode::ErrUnexpected("Commitment state not found (may have expired)".into()))?;

        if record.is_expired(now, store::COMMITMENT_TTL.as_secs() as i64) {
            return Err(ErrorCode::ErrQuoteExpired {
                expiry: record.created_at + store::COMMITMENT_TTL.as_secs() as i64,
                now,
            });
        }

        let current_block = self
            .chain_client
            .current_block(chain)
            .await
            .map_err(|e| ErrorCode::ErrUnexpected(format!("block query failed: {e}")))?;
        if current_block < record.reveal_block {
            warn!(
                chain,
                current_block,
                reveal_block = record.reveal_block,
                "reveal attempted before reveal block"
            );
            return Err(ErrorCode::ErrUnexpected(format!(
                "Too early to reveal. Current: {current_block}, Need: {}",
                record.reveal_block
            )));
        }

        let tx_hash = match self.chain_client.submit_reveal(chain, &record.reveal_params).await {
            Ok(tx) => tx,
            Err(first_err) => {
                warn!(chain, error = %first_err, "reveal submission failed, retrying once");
                self.chain_client
                    .submit_reveal(chain, &record.reveal_params)
                    .await
                    .map_err(|e| ErrorCode::ErrRevert(e.to_string()))?
            }
        };
        self.store.remove(chain, &commitment_hash);
        info!(chain, commitment_hash = %commitment_hash, tx_hash, "commitment revealed");
        Ok(tx_hash)
    }

    /// Abandon a pending commitment without revealing — the
    /// `cancelCommit` path of §4.4's state machine.
    pub fn cancel(&self, chain: &str, commitment_hash: B256) {
        self.store.remove(chain, &commitment_hash);
    }
}
