use async_trait::async_trait;

use crate::model::errors::ErrorCode;

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub would_revert: bool,
    pub revert_reason: Option<String>,
    pub gas_used: Option<u64>,
}

impl SimulationResult {
    pub fn success(gas_used: u64) -> Self {
        SimulationResult {
            would_revert: false,
            revert_reason: None,
            gas_used: Some(gas_used),
        }
    }

    pub fn revert(reason: impl Into<String>) -> Self {
        SimulationResult {
            would_revert: true,
            revert_reason: Some(reason.into()),
            gas_used: None,
        }
    }
}

/// One simulation backend. A chain's simulation pipeline tries
/// providers in priority order, falling back on the next when one
/// errors (not when one simply predicts a revert — that's a real
/// answer, not a failure).
#[async_trait]
pub trait SimulationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn simulate(&self, chain: &str, raw_tx: &[u8]) -> anyhow::Result<SimulationResult>;
}

/// Calls a managed third-party simulation API (Tenderly-style). No
/// concrete HTTP wire format ships in this crate — out of scope per
/// the external-interface boundary — but the shape (reqwest client,
/// base URL, bearer token) mirrors the teacher's other HTTP
/// collaborators.
pub struct ManagedApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ManagedApiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        ManagedApiProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SimulationProvider for ManagedApiProvider {
    fn name(&self) -> &'static str {
        "managed-api"
    }

    async fn simulate(&self, chain: &str, raw_tx: &[u8]) -> anyhow::Result<SimulationResult> {
        let resp = self
            .client
            .post(format!("{}/simulate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "chain": chain,
                "rawTx": hex::encode(raw_tx),
            }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(ErrorCode::ErrSimError(e.to_string())))?;

        let body: serde_json::Value = resp.json().await?;
        let would_revert = body
            .get("willRevert")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if would_revert {
            let reason = body
                .get("revertReason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Ok(SimulationResult::revert(reason));
        }
        let gas_used = body.get("gasUsed").and_then(serde_json::Value::as_u64);
        Ok(SimulationResult {
            would_revert: false,
            revert_reason: None,
            gas_used,
        })
    }
}

/// Falls back to the chain's own RPC `debug_traceCall` (or an `eth_call`
/// dry-run where trace isn't available) when no managed API is
/// reachable. Stubbed here at the trait boundary — a concrete
/// implementation would hold an `alloy` provider.
pub struct RpcTraceProvider;

#[async_trait]
impl SimulationProvider for RpcTraceProvider {
    fn name(&self) -> &'static str {
        "rpc-trace"
    }

    async fn simulate(&self, _chain: &str, _raw_tx: &[u8]) -> anyhow::Result<SimulationResult> {
        Err(anyhow::anyhow!(ErrorCode::ErrSimError(
            "rpc-trace provider requires a configured alloy provider".into()
        )))
    }
}
