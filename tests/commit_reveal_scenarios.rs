use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, b256, B256, U256};
use arb_exec_core::commit_reveal::store::CommitmentStore;
use arb_exec_core::commit_reveal::{CommitRevealChain, CommitRevealService};
use arb_exec_core::model::commitment::{RevealParams, SwapPathStep};
use async_trait::async_trait;

struct MockChain {
    block: AtomicU64,
}

#[async_trait]
impl CommitRevealChain for MockChain {
    async fn current_block(&self, _chain: &str) -> anyhow::Result<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }
    async fn submit_commit(&self, _chain: &str, _commitment_hash: B256) -> anyhow::Result<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }
    async fn submit_reveal(&self, _chain: &str, _reveal: &RevealParams) -> anyhow::Result<String> {
        Ok("0xreveal".into())
    }
}

fn reveal_params() -> RevealParams {
    RevealParams {
        asset: address!("2222222222222222222222222222222222222222"),
        amount_in: U256::from(1_000_000_000_000_000_000u128),
        swap_path: vec![SwapPathStep {
            router: address!("3333333333333333333333333333333333333333"),
            token_in: address!("2222222222222222222222222222222222222222"),
            token_out: address!("4444444444444444444444444444444444444444"),
            amount_out_min: U256::from(1u64),
        }],
        min_profit: U256::from(1u64),
        deadline: U256::from(9_999_999_999u64),
        salt: b256!("0000000000000000000000000000000000000000000000000000000000000001"),
    }
}

/// Scenario 5: commit -> reveal happy path. Block advances by exactly
/// one, reveal succeeds on the first try, and the commitment is gone
/// from storage afterwards.
#[tokio::test]
async fn commit_then_reveal_happy_path() {
    let chain = Arc::new(MockChain { block: AtomicU64::new(100) });
    let store = Arc::new(CommitmentStore::new(None));
    let service = CommitRevealService::new(Arc::clone(&chain) as Arc<dyn CommitRevealChain>, Arc::clone(&store));

    let record = service.commit("arbitrum", reveal_params(), Some(25.0), 1_700_000_000).await.unwrap();
    assert_eq!(record.reveal_block, record.submitted_block + 1);

    chain.block.store(record.reveal_block, Ordering::SeqCst);
    let tx_hash = service.reveal("arbitrum", record.commitment_hash, 1_700_000_010).await.unwrap();
    assert!(!tx_hash.is_empty());
    assert!(store.get("arbitrum", &record.commitment_hash).is_none());
}

/// Scenario 6: commit -> reveal too early. Reveal is attempted while the
/// chain is still on the commit block; the error message names the
/// current and required block, the record survives, and a later retry
/// after the block advances succeeds.
#[tokio::test]
async fn reveal_too_early_then_succeeds_after_advance() {
    let chain = Arc::new(MockChain { block: AtomicU64::new(100) });
    let store = Arc::new(CommitmentStore::new(None));
    let service = CommitRevealService::new(Arc::clone(&chain) as Arc<dyn CommitRevealChain>, Arc::clone(&store));

    let record = service.commit("arbitrum", reveal_params(), Some(25.0), 1_700_000_000).await.unwrap();

    let err = service.reveal("arbitrum", record.commitment_hash, 1_700_000_001).await.unwrap_err();
    assert!(err.to_string().contains(&format!(
        "Too early to reveal. Current: {}, Need: {}",
        record.submitted_block, record.reveal_block
    )));
    assert!(store.get("arbitrum", &record.commitment_hash).is_some());

    chain.block.store(record.reveal_block, Ordering::SeqCst);
    let tx_hash = service.reveal("arbitrum", record.commitment_hash, 1_700_000_002).await.unwrap();
    assert!(!tx_hash.is_empty());
}
