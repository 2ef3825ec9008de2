use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::model::dlq::DlqEntry;
use crate::stream::client::StreamClient;

/// Tunables for the co-located DLQ subsystem (§4.1 "DLQ subsystem").
#[derive(Debug, Clone)]
pub struct DlqConfig {
    pub dlq_stream: String,
    /// Stream auto-recovery replays rejected opportunities back onto.
    pub target_stream: String,
    pub scan_interval: Duration,
    pub max_messages_per_scan: usize,
    pub max_message_age: Duration,
    pub max_stream_length: usize,
    pub auto_recovery_enabled: bool,
    pub max_auto_replays_per_scan: usize,
    pub replay_cooldown: Duration,
    pub service_name: String,
    pub instance_id: String,
}

impl Default for DlqConfig {
    fn default() -> Self {
        DlqConfig {
            dlq_stream: "opportunities:dlq".into(),
            target_stream: "opportunities".into(),
            scan_interval: Duration::from_secs(60),
            max_messages_per_scan: 100,
            max_message_age: Duration::from_secs(86_400),
            max_stream_length: 10_000,
            auto_recovery_enabled: true,
            max_auto_replays_per_scan: 5,
            replay_cooldown: Duration::from_secs(300),
            service_name: "arb-exec-core".into(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Snapshot of one scan's findings. Cheap to clone — handed to metrics
/// and to callers of [`DlqSubsystem::stats`] as a copy, never a live
/// reference, so a concurrent scan can't mutate it out from under a
/// reader.
#[derive(Debug, Clone, Default)]
pub struct DlqStats {
    /// Authoritative length from `XLEN`, not the sampled page size —
    /// a scan only ever reads `max_messages_per_scan` entries at a time.
    pub total_count: u64,
    pub sampled_count: usize,
    pub counts_by_code: HashMap<String, u64>,
    pub oldest_entry_age_secs: Option<i64>,
    pub trimmed_this_scan: u64,
    pub auto_replayed_this_scan: usize,
}

/// Periodic scan + auto-trim + auto-recovery + manual replay over the
/// dead-letter stream. Grounded on the teacher's own retry/backoff
/// posture in `src/run/scheduler.rs` (a timer-driven loop that performs
/// bounded, idempotent work per tick) generalized from a single cron
/// trigger to the DLQ's scan/trim/recover cycle.
pub struct DlqSubsystem {
    client: Arc<dyn StreamClient>,
    config: DlqConfig,
    /// opportunity_id -> unix seconds of last auto-replay, for the
    /// per-entry cooldown.
    last_replay_at: DashMap<String, i64>,
    stats: Mutex<DlqStats>,
}

impl DlqSubsystem {
    pub fn new(client: Arc<dyn StreamClient>, config: DlqConfig) -> Self {
        DlqSubsystem {
            client,
            config,
            last_replay_at: DashMap::new(),
            stats: Mutex::new(DlqStats::default()),
        }
    }

    /// Copy-on-read snapshot of the last completed scan's findings.
    pub fn stats(&self) -> DlqStats {
        self.stats.lock().clone()
    }

    /// Append one rejected opportunity to the DLQ stream, capped at
    /// `max_stream_length` (approximate `MAXLEN`, applied at insert).
    pub async fn push(&self, entry: &DlqEntry) -> anyhow::Result<String> {
        let record = serde_json::to_string(entry)?;
        self.client
            .xadd_with_limit(
                &self.config.dlq_stream,
                &json!({ "record": record }),
                self.config.max_stream_length,
            )
            .await
    }

    fn parse_entry(raw: &Value) -> Option<DlqEntry> {
        let record = raw.get("record")?.as_str()?;
        serde_json::from_str(record).ok()
    }

    /// Run one scan cycle: tally entries by bracketed code, track the
    /// oldest entry's age, trim entries past `max_message_age`, and —
    /// if enabled — auto-replay a bounded number of retryable entries.
    /// `now` is unix seconds.
    pub async fn scan(&self, now: i64) -> anyhow::Result<DlqStats> {
        let total_count = self.client.xlen(&self.config.dlq_stream).await?;
        let raw_entries = self
            .client
            .xread(&self.config.dlq_stream, "0", self.config.max_messages_per_scan)
            .await?;

        let mut counts_by_code: HashMap<String, u64> = HashMap::new();
        let mut oldest_age: Option<i64> = None;
        let mut auto_replayed = 0usize;

        for raw in &raw_entries {
            let Some(entry) = Self::parse_entry(&raw.data) else {
                warn!(message_id = %raw.id, "dlq entry failed to parse, skipping in scan");
                continue;
            };
            let code = entry.bracketed_code().unwrap_or("UNKNOWN").to_string();
            *counts_by_code.entry(code).or_insert(0) += 1;

            let age = now - entry.timestamp;
            oldest_age = Some(oldest_age.map_or(age, |a: i64| a.max(age)));

            if self.config.auto_recovery_enabled
                && auto_replayed < self.config.max_auto_replays_per_scan
            {
                let replayable = entry
                    .bracketed_code()
                    .is_some_and(is_retryable_tag);
                if replayable && self.cooldown_elapsed(&entry.opportunity_id, now) {
                    match self.replay_entry(&entry, now).await {
                        Ok(()) => {
                            auto_replayed += 1;
                            self.last_replay_at
                                .insert(entry.opportunity_id.clone(), now);
                            info!(opportunity_id = %entry.opportunity_id, "dlq auto-replayed entry");
                        }
                        Err(e) => {
                            warn!(opportunity_id = %entry.opportunity_id, error = %e, "dlq auto-replay failed");
                        }
                    }
                }
            }
        }

        let max_age_secs = self.config.max_message_age.as_secs() as i64;
        let cutoff_millis = (now - max_age_secs) * 1000;
        let trimmed = self
            .client
            .xtrim(
                &self.config.dlq_stream,
                crate::stream::client::XTrimOptions {
                    min_id: Some(format!("{cutoff_millis}-0")),
                    max_len: Some(self.config.max_stream_length),
                },
            )
            .await?;

        let snapshot = DlqStats {
            total_count,
            sampled_count: raw_entries.len(),
            counts_by_code,
            oldest_entry_age_secs: oldest_age,
            trimmed_this_scan: trimmed,
            auto_replayed_this_scan: auto_replayed,
        };
        *self.stats.lock() = snapshot.clone();
        Ok(snapshot)
    }

    fn cooldown_elapsed(&self, opportunity_id: &str, now: i64) -> bool {
        match self.last_replay_at.get(opportunity_id) {
            Some(last) => now - *last >= self.config.replay_cooldown.as_secs() as i64,
            None => true,
        }
    }

    async fn replay_entry(&self, entry: &DlqEntry, now: i64) -> anyhow::Result<()> {
        let payload: Value = serde_json::from_str(&entry.original_payload)
            .map_err(|e| anyhow::anyhow!("original_payload is not valid JSON: {e}"))?;
        self.client.xadd(&self.config.target_stream, &payload).await?;
        let mut replayed = entry.clone();
        replayed.replayed = Some(true);
        replayed.original_error = Some(entry.error.clone());
        let record = serde_json::to_string(&replayed)?;
        self.client
            .xadd_with_limit(
                &self.config.dlq_stream,
                &json!({ "record": record }),
                self.config.max_stream_length,
            )
            .await?;
        let _ = now;
        Ok(())
    }

    /// Manually replay every DLQ entry matching `opportunity_id`,
    /// regardless of whether its code is in the auto-replayable set.
    /// Paginates up to 100 pages of `max_messages_per_scan` entries;
    /// refuses (skips, counts as a failure) any entry whose payload is
    /// missing or fails to parse.
    pub async fn replay_by_opportunity_id(
        &self,
        opportunity_id: &str,
        now: i64,
    ) -> anyhow::Result<usize> {
        const MAX_PAGES: usize = 100;
        let mut cursor = "0".to_string();
        let mut replayed = 0usize;

        for _ in 0..MAX_PAGES {
            let page = self
                .client
                .xread(&self.config.dlq_stream, &cursor, self.config.max_messages_per_scan)
                .await?;
            if page.is_empty() {
                break;
            }
            cursor = page.last().unwrap().id.clone();

            for raw in &page {
                let Some(entry) = Self::parse_entry(&raw.data) else {
                    continue;
                };
                if entry.opportunity_id != opportunity_id {
                    continue;
                }
                match self.replay_entry(&entry, now).await {
                    Ok(()) => replayed += 1,
                    Err(e) => warn!(opportunity_id, error = %e, "manual replay failed"),
                }
            }

            if page.len() < self.config.max_messages_per_scan {
                break;
            }
        }
        Ok(replayed)
    }
}

fn is_retryable_tag(tag: &str) -> bool {
    matches!(
        tag,
        "ERR_NONCE" | "ERR_NO_PROVIDER" | "ERR_APPROVAL" | "ERR_NO_ROUTE" | "ERR_NO_BRIDGE"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::client::FakeStreamClient;

    fn sample_entry(id: &str, error: &str) -> DlqEntry {
        DlqEntry {
            original_message_id: "1700000000000-0".into(),
            original_stream: "opportunities".into(),
            opportunity_id: id.into(),
            opportunity_type: "single-chain".into(),
            error: error.into(),
            timestamp: 1_700_000_000,
            service: "arb-exec-core".into(),
            instance_id: "test".into(),
            original_payload: serde_json::json!({"id": id, "kind": "single-chain"}).to_string(),
            replayed: None,
            original_error: None,
        }
    }

    fn subsystem() -> DlqSubsystem {
        let client: Arc<dyn StreamClient> = Arc::new(FakeStreamClient::new());
        DlqSubsystem::new(client, DlqConfig::default())
    }

    #[tokio::test]
    async fn push_then_scan_counts_by_code() {
        let dlq = subsystem();
        dlq.push(&sample_entry("a", "[VAL_ZERO_AMOUNT] amountIn is zero"))
            .await
            .unwrap();
        dlq.push(&sample_entry("b", "[VAL_ZERO_AMOUNT] amountIn is zero"))
            .await
            .unwrap();

        let stats = dlq.scan(1_700_000_100).await.unwrap();
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.counts_by_code.get("VAL_ZERO_AMOUNT"), Some(&2));
    }

    #[tokio::test]
    async fn auto_recovery_replays_retryable_codes_only() {
        let dlq = subsystem();
        dlq.push(&sample_entry("a", "[ERR_NONCE] nonce error: stuck"))
            .await
            .unwrap();
        dlq.push(&sample_entry("b", "[VAL_ZERO_AMOUNT] amountIn is zero"))
            .await
            .unwrap();

        let stats = dlq.scan(1_700_000_100).await.unwrap();
        assert_eq!(stats.auto_replayed_this_scan, 1);

        let target_len = dlq.client.xlen("opportunities").await.unwrap();
        assert_eq!(target_len, 1);
    }

    #[tokio::test]
    async fn replay_cooldown_blocks_immediate_re_replay() {
        let dlq = subsystem();
        dlq.push(&sample_entry("a", "[ERR_NONCE] nonce error: stuck"))
            .await
            .unwrap();

        let first = dlq.scan(1_700_000_000).await.unwrap();
        assert_eq!(first.auto_replayed_this_scan, 1);

        dlq.push(&sample_entry("a", "[ERR_NONCE] nonce error: stuck still"))
            .await
            .unwrap();
        let second = dlq.scan(1_700_000_010).await.unwrap();
        assert_eq!(second.auto_replayed_this_scan, 0);
    }

    #[tokio::test]
    async fn manual_replay_works_for_non_retryable_codes() {
        let dlq = subsystem();
        dlq.push(&sample_entry("a", "[VAL_ZERO_AMOUNT] amountIn is zero"))
            .await
            .unwrap();

        let n = dlq.replay_by_opportunity_id("a", 1_700_000_100).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(dlq.client.xlen("opportunities").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replay_refuses_unparseable_payload() {
        let dlq = subsystem();
        let mut entry = sample_entry("a", "[VAL_ZERO_AMOUNT] amountIn is zero");
        entry.original_payload = "not json".into();
        dlq.push(&entry).await.unwrap();

        let n = dlq.replay_by_opportunity_id("a", 1_700_000_100).await.unwrap();
        assert_eq!(n, 0);
    }
}
