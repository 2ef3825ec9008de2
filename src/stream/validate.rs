use std::collections::HashSet;

use alloy::primitives::U256;
use serde_json::Value;

use crate::model::errors::ErrorCode;
use crate::model::opportunity::{Opportunity, OpportunityKind};

/// Business-rule thresholds and the supported-chain set, per §6's config
/// surface (`confidence ≥ threshold`, `expectedProfit ≥
/// minProfitPercentage`).
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub confidence_threshold: f64,
    pub min_profit_percentage: f64,
    pub supported_chains: HashSet<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            confidence_threshold: 0.70,
            min_profit_percentage: 0.01,
            supported_chains: ["ethereum", "arbitrum", "optimism", "base", "solana"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Result of running one stream entry through the validation pipeline.
pub enum ValidationOutcome {
    /// A recognized control message (e.g. `stream-init`) — discarded
    /// silently, never DLQ'd.
    SystemControl,
    Accepted(Opportunity),
    /// `opportunity_id`/`opportunity_type` are best-effort — pulled from
    /// whatever fields parsed before the failure, so the DLQ entry is
    /// still useful even when the payload is badly malformed.
    Rejected {
        code: ErrorCode,
        opportunity_id: String,
        opportunity_type: String,
    },
}

fn reject(code: ErrorCode, id: &Value, kind: &Value) -> ValidationOutcome {
    ValidationOutcome::Rejected {
        code,
        opportunity_id: id.as_str().unwrap_or("unknown").to_string(),
        opportunity_type: kind.as_str().unwrap_or("unknown").to_string(),
    }
}

/// Run the §4.1 validation pipeline, in order: envelope, required
/// fields, kind, amount, expiry, cross-chain fields, business rules.
/// `now` is the current unix timestamp in seconds.
pub fn validate_entry(raw: &Value, config: &ValidationConfig, now: i64) -> ValidationOutcome {
    // 1. Envelope.
    let Some(obj) = raw.as_object() else {
        return reject(
            ErrorCode::ValMalformed("payload is not a JSON object".into()),
            &Value::Null,
            &Value::Null,
        );
    };
    if let Some(control) = obj.get("type").and_then(Value::as_str) {
        if control == "stream-init" {
            return ValidationOutcome::SystemControl;
        }
    }

    let id_val = obj.get("id").cloned().unwrap_or(Value::Null);
    let kind_val = obj.get("kind").cloned().unwrap_or(Value::Null);

    // 2. Required fields.
    let id = match obj.get("id").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return reject(ErrorCode::ValMissingField("id".into()), &id_val, &kind_val),
    };
    let kind_str = match obj.get("kind").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => return reject(ErrorCode::ValMissingField("kind".into()), &id_val, &kind_val),
    };
    let token_in = match obj.get("tokenIn").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => {
            return reject(
                ErrorCode::ValMissingField("tokenIn".into()),
                &id_val,
                &kind_val,
            );
        }
    };
    let token_out = match obj.get("tokenOut").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => {
            return reject(
                ErrorCode::ValMissingField("tokenOut".into()),
                &id_val,
                &kind_val,
            );
        }
    };
    let amount_str = match obj.get("amountIn").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => {
            return reject(
                ErrorCode::ValMissingField("amountIn".into()),
                &id_val,
                &kind_val,
            );
        }
    };

    // 3. Kind.
    let Some(kind) = OpportunityKind::parse(&kind_str) else {
        return reject(ErrorCode::ValUnknownKind(kind_str), &id_val, &kind_val);
    };

    // 4. Amount — digit-only decimal string, no sign/fraction/hex.
    if amount_str.is_empty() || !amount_str.bytes().all(|b| b.is_ascii_digit()) {
        return reject(
            ErrorCode::ValNonNumericAmount(amount_str),
            &id_val,
            &kind_val,
        );
    }
    let Ok(amount_in) = amount_str.parse::<U256>() else {
        return reject(
            ErrorCode::ValAmountOverflow(amount_str),
            &id_val,
            &kind_val,
        );
    };
    if amount_in.is_zero() {
        return reject(ErrorCode::ValZeroAmount, &id_val, &kind_val);
    }

    // 5. Expiry.
    let expiry = obj.get("expiry").and_then(Value::as_i64);
    if let Some(exp) = expiry {
        if exp <= now {
            return reject(
                ErrorCode::ValExpired { expiry: exp, now },
                &id_val,
                &kind_val,
            );
        }
    }

    // 6. Cross-chain fields.
    let buy_chain = obj
        .get("buyChain")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let sell_chain = obj
        .get("sellChain")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if kind == OpportunityKind::CrossChain {
        if buy_chain.is_empty() || sell_chain.is_empty() {
            return reject(
                ErrorCode::ValMissingField("buyChain/sellChain".into()),
                &id_val,
                &kind_val,
            );
        }
        if buy_chain == sell_chain {
            return reject(ErrorCode::ValSameChain(buy_chain), &id_val, &kind_val);
        }
        for chain in [&buy_chain, &sell_chain] {
            if !config.supported_chains.contains(chain.as_str()) {
                return reject(
                    ErrorCode::ValUnknownChain(chain.clone()),
                    &id_val,
                    &kind_val,
                );
            }
        }
    }

    // 7. Business rules — low-confidence takes priority over low-profit.
    let confidence = obj.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
    let expected_profit = obj
        .get("expectedProfit")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    if confidence < config.confidence_threshold {
        return reject(
            ErrorCode::ValLowConfidence {
                actual: confidence,
                threshold: config.confidence_threshold,
            },
            &id_val,
            &kind_val,
        );
    }
    if expected_profit < config.min_profit_percentage {
        return reject(
            ErrorCode::ValLowProfit {
                actual: expected_profit,
                threshold: config.min_profit_percentage,
            },
            &id_val,
            &kind_val,
        );
    }

    let buy_venue = obj
        .get("buyVenue")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let sell_venue = obj
        .get("sellVenue")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let intent_payload = obj
        .get("intentPayload")
        .and_then(Value::as_str)
        .map(|s| s.as_bytes().to_vec());
    let path_hints = obj.get("pathHints").and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    });

    let (buy_chain, sell_chain) = if kind == OpportunityKind::CrossChain {
        (buy_chain, sell_chain)
    } else {
        // Single-chain kinds: buyChain == sellChain by invariant (§3);
        // fall back to one declared field if only one was sent.
        let chain = if !buy_chain.is_empty() {
            buy_chain
        } else {
            sell_chain
        };
        (chain.clone(), chain)
    };

    ValidationOutcome::Accepted(Opportunity {
        id,
        kind,
        buy_chain,
        sell_chain,
        buy_venue,
        sell_venue,
        token_in,
        token_out,
        amount_in,
        expected_profit,
        confidence,
        expiry,
        intent_payload,
        path_hints,
    })
}
