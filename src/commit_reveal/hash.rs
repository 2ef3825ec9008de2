use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolValue;

use crate::model::commitment::SwapPathStep;

sol! {
    struct SwapStep {
        address router;
        address tokenIn;
        address tokenOut;
        uint256 amountOutMin;
    }
}

/// Keccak-256 over the ABI-encoded reveal tuple (§6): `(address asset,
/// uint256 amountIn, (address,address,address,uint256)[] swapPath,
/// uint256 minProfit, uint256 deadline, bytes32 salt)`. Must match the
/// on-chain contract's hashing exactly — grounded in the teacher's own
/// EIP-712 `eip712_signing_hash` usage in `venues/movement/bridge2.rs`,
/// generalized from struct-hashing to plain ABI tuple-hashing since the
/// commit phase has no typed-data signature, just a hash commitment.
pub fn commitment_hash(
    asset: Address,
    amount_in: U256,
    swap_path: &[SwapPathStep],
    min_profit: U256,
    deadline: U256,
    salt: B256,
) -> B256 {
    let steps: Vec<SwapStep> = swap_path
        .iter()
        .map(|s| SwapStep {
            router: s.router,
            tokenIn: s.token_in,
            tokenOut: s.token_out,
            amountOutMin: s.amount_out_min,
        })
        .collect();
    let encoded = (asset, amount_in, steps, min_profit, deadline, salt).abi_encode();
    keccak256(encoded)
}
