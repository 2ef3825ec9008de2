use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::model::ErrorCode;

/// One entry read off a durable stream: an opaque id (timestamp-prefixed,
/// monotonically increasing) and its JSON payload.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub data: Value,
}

/// Options for [`StreamClient::xtrim`] — trim by minimum id (everything
/// older is discarded) or by maximum length (oldest entries discarded
/// until the stream is at most this long). Both may be set; the stream
/// client applies whichever trims more.
#[derive(Debug, Clone, Default)]
pub struct XTrimOptions {
    pub min_id: Option<String>,
    pub max_len: Option<usize>,
}

/// The wire contract §6 describes for the inbound durable stream and the
/// DLQ — the shape of Redis Streams (`XREAD`, `XADD`, `XLEN`, `XTRIM`).
/// Implemented against `redis` in production and against an in-memory
/// fake in tests.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn xread(
        &self,
        stream: &str,
        cursor: &str,
        count: usize,
    ) -> anyhow::Result<Vec<StreamEntry>>;

    async fn xadd(&self, stream: &str, fields: &Value) -> anyhow::Result<String>;

    /// `XADD` with an approximate `MAXLEN` cap applied at insert time.
    async fn xadd_with_limit(
        &self,
        stream: &str,
        fields: &Value,
        max_len: usize,
    ) -> anyhow::Result<String>;

    async fn xlen(&self, stream: &str) -> anyhow::Result<u64>;

    async fn xtrim(&self, stream: &str, opts: XTrimOptions) -> anyhow::Result<u64>;
}

// ── Redis-backed implementation ─────────────────────────────────────

/// Production `StreamClient`, backed by Redis Streams over a
/// connection-managed multiplexed async connection (reconnects
/// transparently, matching the provider-reconnection posture §4.8
/// expects of every external connection this core holds open).
pub struct RedisStreamClient {
    conn: redis::aio::ConnectionManager,
}

impl RedisStreamClient {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| anyhow::anyhow!(ErrorCode::ErrConfig(format!("redis url: {e}"))))?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisStreamClient { conn })
    }
}

#[async_trait]
impl StreamClient for RedisStreamClient {
    async fn xread(
        &self,
        stream: &str,
        cursor: &str,
        count: usize,
    ) -> anyhow::Result<Vec<StreamEntry>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamReadReply = conn
            .xread_options(
                &[stream],
                &[cursor],
                &redis::streams::StreamReadOptions::default().count(count),
            )
            .await?;

        let mut out = Vec::new();
        for key in reply.keys {
            for id_entry in key.ids {
                let mut map = serde_json::Map::new();
                for (field, value) in id_entry.map {
                    if let redis::Value::BulkString(bytes) = value {
                        let s = String::from_utf8_lossy(&bytes).to_string();
                        map.insert(field, Value::String(s));
                    }
                }
                out.push(StreamEntry {
                    id: id_entry.id,
                    data: Value::Object(map),
                });
            }
        }
        Ok(out)
    }

    async fn xadd(&self, stream: &str, fields: &Value) -> anyhow::Result<String> {
        self.xadd_inner(stream, fields, None).await
    }

    async fn xadd_with_limit(
        &self,
        stream: &str,
        fields: &Value,
        max_len: usize,
    ) -> anyhow::Result<String> {
        self.xadd_inner(stream, fields, Some(max_len)).await
    }

    async fn xlen(&self, stream: &str) -> anyhow::Result<u64> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let len: u64 = conn.xlen(stream).await?;
        Ok(len)
    }

    async fn xtrim(&self, stream: &str, opts: XTrimOptions) -> anyhow::Result<u64> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let mut trimmed = 0u64;
        if let Some(max_len) = opts.max_len {
            trimmed += conn
                .xtrim(
                    stream,
                    redis::streams::StreamMaxlen::Approx(max_len as usize),
                )
                .await?;
        }
        if let Some(min_id) = opts.min_id {
            let n: u64 = redis::cmd("XTRIM")
                .arg(stream)
                .arg("MINID")
                .arg("~")
                .arg(min_id)
                .query_async(&mut conn)
                .await?;
            trimmed += n;
        }
        Ok(trimmed)
    }
}

impl RedisStreamClient {
    async fn xadd_inner(
        &self,
        stream: &str,
        fields: &Value,
        max_len: Option<usize>,
    ) -> anyhow::Result<String> {
        let obj = fields
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("xadd fields must be a JSON object"))?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream);
        if let Some(n) = max_len {
            cmd.arg("MAXLEN").arg("~").arg(n);
        }
        cmd.arg("*");
        for (k, v) in obj {
            let as_str = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            cmd.arg(k).arg(as_str);
        }
        let mut conn = self.conn.clone();
        let id: String = cmd.query_async(&mut conn).await?;
        Ok(id)
    }
}

// ── In-memory fake for tests ────────────────────────────────────────

/// Deterministic in-memory `StreamClient` used by unit and integration
/// tests so the consumer/DLQ pipeline can be exercised without a Redis
/// instance. Ids are monotonically increasing `"{millis}-{seq}"`
/// strings, mirroring Redis Streams' own id format closely enough that
/// the auto-trim "timestamp-prefixed id" logic in §4.1 behaves the same
/// way against both.
pub struct FakeStreamClient {
    streams: Mutex<BTreeMap<String, Vec<StreamEntry>>>,
    clock: Mutex<i64>,
    seq: Mutex<u64>,
}

impl FakeStreamClient {
    pub fn new() -> Self {
        FakeStreamClient {
            streams: Mutex::new(BTreeMap::new()),
            clock: Mutex::new(1_700_000_000_000),
            seq: Mutex::new(0),
        }
    }

    /// Advance the fake's internal millisecond clock — lets tests control
    /// DLQ entry ages deterministically.
    pub fn advance_millis(&self, millis: i64) {
        *self.clock.lock() += millis;
    }

    fn next_id(&self) -> String {
        *self.clock.lock() += 1;
        let ts = *self.clock.lock();
        let mut seq = self.seq.lock();
        let id = format!("{ts}-{seq}");
        *seq += 1;
        id
    }

    fn push(&self, stream: &str, data: Value, cap: Option<usize>) -> String {
        let id = self.next_id();
        let mut streams = self.streams.lock();
        let entries = streams.entry(stream.to_string()).or_default();
        entries.push(StreamEntry {
            id: id.clone(),
            data,
        });
        if let Some(cap) = cap {
            if entries.len() > cap {
                let excess = entries.len() - cap;
                entries.drain(0..excess);
            }
        }
        id
    }
}

impl Default for FakeStreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamClient for FakeStreamClient {
    async fn xread(
        &self,
        stream: &str,
        cursor: &str,
        count: usize,
    ) -> anyhow::Result<Vec<StreamEntry>> {
        let streams = self.streams.lock();
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        let start = if cursor == "0" || cursor == "0-0" {
            0
        } else {
            entries
                .iter()
                .position(|e| e.id == cursor)
                .map(|i| i + 1)
                .unwrap_or(entries.len())
        };
        Ok(entries.iter().skip(start).take(count).cloned().collect())
    }

    async fn xadd(&self, stream: &str, fields: &Value) -> anyhow::Result<String> {
        Ok(self.push(stream, fields.clone(), None))
    }

    async fn xadd_with_limit(
        &self,
        stream: &str,
        fields: &Value,
        max_len: usize,
    ) -> anyhow::Result<String> {
        Ok(self.push(stream, fields.clone(), Some(max_len)))
    }

    async fn xlen(&self, stream: &str) -> anyhow::Result<u64> {
        let streams = self.streams.lock();
        Ok(streams.get(stream).map(|e| e.len()).unwrap_or(0) as u64)
    }

    async fn xtrim(&self, stream: &str, opts: XTrimOptions) -> anyhow::Result<u64> {
        let mut streams = self.streams.lock();
        let Some(entries) = streams.get_mut(stream) else {
            return Ok(0);
        };
        let before = entries.len();
        if let Some(min_id) = &opts.min_id {
            entries.retain(|e| e.id.as_str() >= min_id.as_str());
        }
        if let Some(max_len) = opts.max_len {
            if entries.len() > max_len {
                let excess = entries.len() - max_len;
                entries.drain(0..excess);
            }
        }
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn xadd_then_xread_from_zero() {
        let client = FakeStreamClient::new();
        client.xadd("opps", &json!({"id": "a"})).await.unwrap();
        client.xadd("opps", &json!({"id": "b"})).await.unwrap();

        let entries = client.xread("opps", "0", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data["id"], "a");
    }

    #[tokio::test]
    async fn xread_resumes_from_cursor() {
        let client = FakeStreamClient::new();
        client.xadd("opps", &json!({"id": "a"})).await.unwrap();
        let first = client.xread("opps", "0", 10).await.unwrap();
        client.xadd("opps", &json!({"id": "b"})).await.unwrap();

        let resumed = client
            .xread("opps", &first[0].id, 10)
            .await
            .unwrap();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].data["id"], "b");
    }

    #[tokio::test]
    async fn xadd_with_limit_caps_stream_length() {
        let client = FakeStreamClient::new();
        for i in 0..5 {
            client
                .xadd_with_limit("dlq", &json!({"i": i}), 3)
                .await
                .unwrap();
        }
        assert_eq!(client.xlen("dlq").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn xtrim_by_max_len() {
        let client = FakeStreamClient::new();
        for i in 0..5 {
            client.xadd("s", &json!({"i": i})).await.unwrap();
        }
        let trimmed = client
            .xtrim(
                "s",
                XTrimOptions {
                    min_id: None,
                    max_len: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(trimmed, 3);
        assert_eq!(client.xlen("s").await.unwrap(), 2);
    }
}
