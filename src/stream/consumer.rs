use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::model::dlq::DlqEntry;
use crate::model::opportunity::Opportunity;
use crate::model::stats::ExecutionStats;
use crate::stream::client::StreamClient;
use crate::stream::dlq::DlqSubsystem;
use crate::stream::validate::{validate_entry, ValidationConfig, ValidationOutcome};

/// Tunables for the consumer's scan loop (§4.1).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub source_stream: String,
    pub scan_interval: Duration,
    pub max_messages_per_scan: usize,
    pub service_name: String,
    pub instance_id: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            source_stream: "opportunities".into(),
            scan_interval: Duration::from_millis(500),
            max_messages_per_scan: 100,
            service_name: "arb-exec-core".into(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Reads the inbound opportunity stream, validates each entry (§4.1),
/// forwards accepted opportunities to the orchestrator via an mpsc
/// channel, and dead-letters rejections. The scan loop is a single
/// owned `tokio::task`, generalized from the teacher's synchronous
/// `Engine` tick loop (`engine/mod.rs`) to an async task with a
/// `watch`-based shutdown signal, matching §5's cancellation model.
pub struct OpportunityConsumer {
    client: Arc<dyn StreamClient>,
    dlq: Arc<DlqSubsystem>,
    out_tx: mpsc::Sender<Opportunity>,
    config: ConsumerConfig,
    validation_config: ValidationConfig,
    stats: Arc<ExecutionStats>,
    cursor: Mutex<String>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl OpportunityConsumer {
    pub fn new(
        client: Arc<dyn StreamClient>,
        dlq: Arc<DlqSubsystem>,
        out_tx: mpsc::Sender<Opportunity>,
        config: ConsumerConfig,
        validation_config: ValidationConfig,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        OpportunityConsumer {
            client,
            dlq,
            out_tx,
            config,
            validation_config,
            stats,
            cursor: Mutex::new("0".to_string()),
            task: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Start the scan loop. Idempotent: calling `start` while already
    /// running logs a warning and returns without spawning a second
    /// task.
    pub fn start(self: &Arc<Self>) {
        if self.task.lock().is_some() {
            warn!("consumer start() called while already running");
            return;
        }
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.scan_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = this.scan_once().await {
                            warn!(error = %e, "consumer scan failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("consumer scan loop shutting down");
                            break;
                        }
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);
        *self.shutdown_tx.lock() = Some(shutdown_tx);
    }

    /// Signal shutdown and await the scan task's graceful exit.
    pub async fn stop(&self) {
        let tx = self.shutdown_tx.lock().take();
        let Some(tx) = tx else {
            warn!("consumer stop() called while not running");
            return;
        };
        let _ = tx.send(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// One iteration: read up to `max_messages_per_scan` new entries,
    /// validate each, forward accepted ones, dead-letter the rest.
    #[instrument(skip(self))]
    pub async fn scan_once(&self) -> anyhow::Result<usize> {
        let cursor = self.cursor.lock().clone();
        let entries = self
            .client
            .xread(
                &self.config.source_stream,
                &cursor,
                self.config.max_messages_per_scan,
            )
            .await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut processed = 0;
        for entry in &entries {
            self.stats.inc_received();
            match validate_entry(&entry.data, &self.validation_config, now) {
                ValidationOutcome::SystemControl => {}
                ValidationOutcome::Accepted(opportunity) => {
                    if self.out_tx.send(opportunity).await.is_err() {
                        warn!("orchestrator channel closed, dropping accepted opportunity");
                    }
                }
                ValidationOutcome::Rejected {
                    code,
                    opportunity_id,
                    opportunity_type,
                } => {
                    self.stats.inc_rejected();
                    warn!(
                        code = code.tag(),
                        opportunity_id = %opportunity_id,
                        "rejected incoming opportunity, dead-lettering"
                    );
                    let dlq_entry = DlqEntry {
                        original_message_id: entry.id.clone(),
                        original_stream: self.config.source_stream.clone(),
                        opportunity_id,
                        opportunity_type,
                        error: code.wire(),
                        timestamp: now,
                        service: self.config.service_name.clone(),
                        instance_id: self.config.instance_id.clone(),
                        original_payload: entry.data.to_string(),
                        replayed: None,
                        original_error: None,
                    };
                    if let Err(e) = self.dlq.push(&dlq_entry).await {
                        warn!(error = %e, "failed to write dlq entry");
                    }
                }
            }
            *self.cursor.lock() = entry.id.clone();
            processed += 1;
        }
        Ok(processed)
    }
}
