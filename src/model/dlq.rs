use serde::{Deserialize, Serialize};

/// The wire contract for a dead-letter entry (§6). `original_payload` is
/// the full JSON string of the rejected message's `data` field, preserved
/// losslessly so replay can revalidate the exact original bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub original_message_id: String,
    pub original_stream: String,
    pub opportunity_id: String,
    pub opportunity_type: String,
    /// `"[CODE] message"`, e.g. `"[VAL_ZERO_AMOUNT] amountIn is zero"`.
    pub error: String,
    pub timestamp: i64,
    pub service: String,
    pub instance_id: String,
    pub original_payload: String,
    /// Set by auto-recovery when this entry is replayed to the execution
    /// stream (§4.1 "Auto-recovery").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replayed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
}

impl DlqEntry {
    pub fn bracketed_code(&self) -> Option<&str> {
        crate::model::ErrorCode::tag_from_wire(&self.error)
    }
}
