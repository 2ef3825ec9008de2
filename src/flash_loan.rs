use alloy::primitives::U256;

/// Aave-style flash-loan fee is 9 bps on most deployments; a handful of
/// chains run their own pool with a different fee. Falls back to the
/// 9bps default for anything not explicitly listed.
const DEFAULT_FEE_BPS: u32 = 9;

fn fee_bps_for_chain(chain: &str) -> u32 {
    match chain {
        "arbitrum" | "ethereum" | "base" | "optimism" => 9,
        _ => DEFAULT_FEE_BPS,
    }
}

pub fn flash_loan_fee(chain: &str, amount: U256) -> U256 {
    let bps = U256::from(fee_bps_for_chain(chain) as u64);
    amount.saturating_mul(bps) / U256::from(10_000u64)
}

/// Funding recommendation for a given opportunity: borrow the amount via
/// flash loan, execute directly with capital on hand, or skip because
/// neither path clears a profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingRecommendation {
    FlashLoan,
    Direct,
    Skip,
}

/// Whether borrowing via flash loan is worth it versus using capital
/// already on hand: the flash-loan fee must leave more of the expected
/// profit than direct execution's opportunity cost of tying up that
/// capital. `available_capital` is what's on hand without borrowing;
/// if it already covers `amount`, direct execution avoids the fee
/// entirely. If neither path clears a profit, recommend skipping.
pub fn recommend_flash_loan(
    chain: &str,
    amount: U256,
    available_capital: U256,
    expected_profit: U256,
) -> FundingRecommendation {
    if available_capital >= amount {
        return FundingRecommendation::Direct;
    }
    let fee = flash_loan_fee(chain, amount);
    if fee < expected_profit {
        FundingRecommendation::FlashLoan
    } else {
        FundingRecommendation::Skip
    }
}
