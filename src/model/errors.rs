use thiserror::Error;

/// The bracketed error taxonomy shared by the consumer, the orchestrator,
/// and every strategy. `VAL_*` variants are permanent (malformed input,
/// never auto-replayed); `ERR_*` variants occur post-acceptance and a
/// subset of them is retryable (see [`ErrorCode::is_auto_replayable`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorCode {
    // ── Validation (permanent) ──────────────────────────────────────
    #[error("[VAL_MALFORMED] {0}")]
    ValMalformed(String),
    #[error("[VAL_MISSING_FIELD] missing required field `{0}`")]
    ValMissingField(String),
    #[error("[VAL_UNKNOWN_KIND] unrecognized opportunity kind `{0}`")]
    ValUnknownKind(String),
    #[error("[VAL_ZERO_AMOUNT] amountIn is zero")]
    ValZeroAmount,
    #[error("[VAL_NON_NUMERIC_AMOUNT] amountIn `{0}` is not a digit-only integer string")]
    ValNonNumericAmount(String),
    #[error("[VAL_AMOUNT_OVERFLOW] amountIn `{0}` exceeds the maximum representable amount")]
    ValAmountOverflow(String),
    #[error("[VAL_EXPIRED] opportunity expiry {expiry} is not after now ({now})")]
    ValExpired { expiry: i64, now: i64 },
    #[error("[VAL_SAME_CHAIN] cross-chain opportunity has buyChain == sellChain (`{0}`)")]
    ValSameChain(String),
    #[error("[VAL_UNKNOWN_CHAIN] unknown chain `{0}`")]
    ValUnknownChain(String),
    #[error("[VAL_LOW_CONFIDENCE] confidence {actual} below threshold {threshold}")]
    ValLowConfidence { actual: f64, threshold: f64 },
    #[error("[VAL_LOW_PROFIT] expectedProfit {actual} below minimum {threshold}")]
    ValLowProfit { actual: f64, threshold: f64 },

    // ── Environment (mostly retryable) ───────────────────────────────
    #[error("[ERR_NO_PROVIDER] no RPC provider configured for chain `{0}`")]
    ErrNoProvider(String),
    #[error("[ERR_NO_CHAIN] chain `{0}` is not configured")]
    ErrNoChain(String),
    #[error("[ERR_NO_BRIDGE] no bridge route available for `{0}` -> `{1}`")]
    ErrNoBridge(String, String),
    #[error("[ERR_NO_ROUTE] no swap route found for `{0}` -> `{1}`")]
    ErrNoRoute(String, String),
    #[error("[ERR_NONCE] nonce error: {0}")]
    ErrNonce(String),
    #[error("[ERR_APPROVAL] token approval failed: {0}")]
    ErrApproval(String),

    // ── Concurrency (fast-fail, never DLQ'd) ─────────────────────────
    #[error("[ERR_LOCK_CONFLICT] opportunity `{0}` is already executing")]
    ErrLockConflict(String),
    #[error("[ERR_CIRCUIT_OPEN] circuit breaker is open")]
    ErrCircuitOpen,
    #[error("[ERR_QUEUE_FULL] in-flight execution cap reached")]
    ErrQueueFull,

    // ── Economic (abort before broadcast) ────────────────────────────
    #[error("[ERR_GAS_SPIKE] gas price on `{chain}` ({current} gwei) exceeds {multiplier}x baseline ({baseline} gwei)")]
    ErrGasSpike {
        chain: String,
        current: f64,
        baseline: f64,
        multiplier: f64,
    },
    #[error("[ERR_LOW_PROFIT] net profit after costs is not positive")]
    ErrLowProfit,
    #[error("[ERR_PRICE_DEVIATION] quote deviates {actual}% from detection estimate (max {max}%)")]
    ErrPriceDeviation { actual: f64, max: f64 },
    #[error("[ERR_QUOTE_EXPIRED] bridge/route quote expired at {expiry}, now {now}")]
    ErrQuoteExpired { expiry: i64, now: i64 },

    // ── Simulation ────────────────────────────────────────────────────
    #[error("[ERR_SIM_REVERT] simulation predicts revert: {0}")]
    ErrSimRevert(String),
    #[error("[ERR_SIM_REVERT_DEST] simulated destination sell predicts revert: {0}")]
    ErrSimRevertDest(String),
    #[error("[ERR_SIM_ERROR] simulation provider error: {0}")]
    ErrSimError(String),

    // ── On-chain (post-broadcast) ─────────────────────────────────────
    #[error("[ERR_REVERT] transaction reverted: {0}")]
    ErrRevert(String),
    #[error("[ERR_BRIDGE_TIMEOUT] bridge did not reach a terminal state; source tx {tx_hash}")]
    ErrBridgeTimeout { tx_hash: String },

    // ── Commit-reveal ──────────────────────────────────────────────────
    #[error("[ERR_DUPLICATE_COMMITMENT] commitment already recorded for `{0}`")]
    ErrDuplicateCommitment(String),

    // ── Fatal (refuse to start) ────────────────────────────────────────
    #[error("[ERR_CONFIG] invalid configuration: {0}")]
    ErrConfig(String),
    #[error("[ERR_UNTRUSTED_HOST] host `{0}` is not in the trusted allowlist")]
    ErrUntrustedHost(String),

    // ── Catch-all ────────────────────────────────────────────────────
    #[error("[ERR_UNEXPECTED] {0}")]
    ErrUnexpected(String),
    #[error("[ERR_SHUTDOWN] execution aborted by shutdown signal")]
    ErrShutdown,
    #[error("[ERR_TIMEOUT] execution exceeded its wall-clock budget")]
    ErrTimeout,
}

impl ErrorCode {
    /// The bracketed tag alone, e.g. `"[VAL_ZERO_AMOUNT]"` — used as a
    /// structured metrics/log field independent of the human message.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorCode::ValMalformed(_) => "VAL_MALFORMED",
            ErrorCode::ValMissingField(_) => "VAL_MISSING_FIELD",
            ErrorCode::ValUnknownKind(_) => "VAL_UNKNOWN_KIND",
            ErrorCode::ValZeroAmount => "VAL_ZERO_AMOUNT",
            ErrorCode::ValNonNumericAmount(_) => "VAL_NON_NUMERIC_AMOUNT",
            ErrorCode::ValAmountOverflow(_) => "VAL_AMOUNT_OVERFLOW",
            ErrorCode::ValExpired { .. } => "VAL_EXPIRED",
            ErrorCode::ValSameChain(_) => "VAL_SAME_CHAIN",
            ErrorCode::ValUnknownChain(_) => "VAL_UNKNOWN_CHAIN",
            ErrorCode::ValLowConfidence { .. } => "VAL_LOW_CONFIDENCE",
            ErrorCode::ValLowProfit { .. } => "VAL_LOW_PROFIT",
            ErrorCode::ErrNoProvider(_) => "ERR_NO_PROVIDER",
            ErrorCode::ErrNoChain(_) => "ERR_NO_CHAIN",
            ErrorCode::ErrNoBridge(_, _) => "ERR_NO_BRIDGE",
            ErrorCode::ErrNoRoute(_, _) => "ERR_NO_ROUTE",
            ErrorCode::ErrNonce(_) => "ERR_NONCE",
            ErrorCode::ErrApproval(_) => "ERR_APPROVAL",
            ErrorCode::ErrLockConflict(_) => "ERR_LOCK_CONFLICT",
            ErrorCode::ErrCircuitOpen => "ERR_CIRCUIT_OPEN",
            ErrorCode::ErrQueueFull => "ERR_QUEUE_FULL",
            ErrorCode::ErrGasSpike { .. } => "ERR_GAS_SPIKE",
            ErrorCode::ErrLowProfit => "ERR_LOW_PROFIT",
            ErrorCode::ErrPriceDeviation { .. } => "ERR_PRICE_DEVIATION",
            ErrorCode::ErrQuoteExpired { .. } => "ERR_QUOTE_EXPIRED",
            ErrorCode::ErrSimRevert(_) => "ERR_SIM_REVERT",
            ErrorCode::ErrSimRevertDest(_) => "ERR_SIM_REVERT_DEST",
            ErrorCode::ErrSimError(_) => "ERR_SIM_ERROR",
            ErrorCode::ErrRevert(_) => "ERR_REVERT",
            ErrorCode::ErrBridgeTimeout { .. } => "ERR_BRIDGE_TIMEOUT",
            ErrorCode::ErrDuplicateCommitment(_) => "ERR_DUPLICATE_COMMITMENT",
            ErrorCode::ErrConfig(_) => "ERR_CONFIG",
            ErrorCode::ErrUntrustedHost(_) => "ERR_UNTRUSTED_HOST",
            ErrorCode::ErrUnexpected(_) => "ERR_UNEXPECTED",
            ErrorCode::ErrShutdown => "ERR_SHUTDOWN",
            ErrorCode::ErrTimeout => "ERR_TIMEOUT",
        }
    }

    /// Bracketed code family: permanent validation failures are never
    /// auto-replayed (§4.1); on-chain/environment errors might be.
    pub fn is_validation(&self) -> bool {
        self.tag().starts_with("VAL_")
    }

    /// Whether the DLQ auto-recovery scan may re-publish this entry.
    /// The retryable set from §4.1: `{ERR_NONCE, ERR_NO_PROVIDER,
    /// ERR_APPROVAL, ERR_NO_ROUTE, ERR_NO_BRIDGE}`.
    pub fn is_auto_replayable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ErrNonce(_)
                | ErrorCode::ErrNoProvider(_)
                | ErrorCode::ErrApproval(_)
                | ErrorCode::ErrNoRoute(_, _)
                | ErrorCode::ErrNoBridge(_, _)
        )
    }

    /// Render as the wire string stored in a DLQ entry's `error` field:
    /// `"[CODE] message"`.
    pub fn wire(&self) -> String {
        format!("{self}")
    }

    /// Parse a wire-format error string's bracketed tag back out, e.g.
    /// from a replayed DLQ entry's `originalError` annotation.
    pub fn tag_from_wire(wire: &str) -> Option<&str> {
        let start = wire.find('[')?;
        let end = wire.find(']')?;
        if end > start {
            Some(&wire[start + 1..end])
        } else {
            None
        }
    }
}
