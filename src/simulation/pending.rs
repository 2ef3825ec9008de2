use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::model::commitment::SwapPathStep;
use crate::model::errors::ErrorCode;

sol! {
    function swapExactTokensForTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] path,
        address to,
        uint256 deadline
    ) external returns (uint256[] memory amounts);
}

sol! {
    struct ExactInputSingleParams {
        address tokenIn;
        address tokenOut;
        uint24 fee;
        address recipient;
        uint256 deadline;
        uint256 amountIn;
        uint256 amountOutMinimum;
        uint160 sqrtPriceLimitX96;
    }

    function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut);
}

sol! {
    struct ExactInputParams {
        bytes path;
        address recipient;
        uint256 deadline;
        uint256 amountIn;
        uint256 amountOutMinimum;
    }

    function exactInput(ExactInputParams params) external payable returns (uint256 amountOut);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolVersion {
    V2,
    V3,
}

#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub pool_address: Address,
    pub dex_name: String,
    pub version: PoolVersion,
    /// Required for `exactInputSingle` on V3 pools; unused for V2.
    pub fee_tier: u32,
}

/// Unordered token-pair key so `(A, B)` and `(B, A)` resolve to the
/// same pool lookup in O(1).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct PoolKey(Address, Address);

impl PoolKey {
    fn new(a: Address, b: Address) -> Self {
        if a < b {
            PoolKey(a, b)
        } else {
            PoolKey(b, a)
        }
    }
}

/// Builds pending-state simulation inputs: pool discovery, raw
/// calldata for the relevant router function, and a slippage check of
/// the simulated output against what the opportunity declared. Pool
/// lookup is O(1) regardless of the order tokens are passed in, since
/// an unordered pair key backs the map — mirroring how an AMM pool
/// itself has no canonical token0/token1 a caller should need to know
/// in advance.
pub struct PendingStateSimulator {
    pools: HashMap<PoolKey, PoolInfo>,
}

impl PendingStateSimulator {
    pub fn new(pools: HashMap<(Address, Address), PoolInfo>) -> Self {
        let pools = pools
            .into_iter()
            .map(|((a, b), info)| (PoolKey::new(a, b), info))
            .collect();
        PendingStateSimulator { pools }
    }

    pub fn lookup_pool(&self, token_a: Address, token_b: Address) -> Option<&PoolInfo> {
        self.pools.get(&PoolKey::new(token_a, token_b))
    }

    /// Build the raw calldata a pending-state simulator would submit
    /// for a single hop, dispatching on the pool's router version.
    pub fn build_raw_tx(
        &self,
        step: &SwapPathStep,
        amount_in: U256,
        recipient: Address,
        deadline: U256,
    ) -> Result<Vec<u8>, ErrorCode> {
        let pool = self
            .lookup_pool(step.token_in, step.token_out)
            .ok_or_else(|| ErrorCode::ErrNoRoute(step.token_in.to_string(), step.token_out.to_string()))?;

        match pool.version {
            PoolVersion::V2 => {
                let call = swapExactTokensForTokensCall {
                    amountIn: amount_in,
                    amountOutMin: step.amount_out_min,
                    path: vec![step.token_in, step.token_out],
                    to: recipient,
                    deadline,
                };
                Ok(call.abi_encode())
            }
            PoolVersion::V3 => {
                let call = exactInputSingleCall {
                    params: ExactInputSingleParams {
                        tokenIn: step.token_in,
                        tokenOut: step.token_out,
                        fee: pool.fee_tier,
                        recipient,
                        deadline,
                        amountIn: amount_in,
                        amountOutMinimum: step.amount_out_min,
                        sqrtPriceLimitX96: alloy::primitives::Uint::<160, 3>::ZERO,
                    },
                };
                Ok(call.abi_encode())
            }
        }
    }

    /// Build the raw calldata for an entire route. A single-hop route
    /// dispatches to [`Self::build_raw_tx`] as before; a multi-hop route
    /// requires every pool along the path to be V3 (V2 has no tight-path
    /// multi-hop encoding here) and is submitted as one `exactInput` call
    /// with the hops packed tokenIn(20) | fee(3) | tokenOut(20) | fee(3) | ...
    pub fn build_raw_tx_route(
        &self,
        steps: &[SwapPathStep],
        amount_in: U256,
        recipient: Address,
        deadline: U256,
    ) -> Result<Vec<u8>, ErrorCode> {
        match steps {
            [] => Err(ErrorCode::ErrNoRoute(String::new(), String::new())),
            [only] => self.build_raw_tx(only, amount_in, recipient, deadline),
            hops => {
                let mut path = Vec::new();
                let mut amount_out_min = U256::ZERO;
                for (i, hop) in hops.iter().enumerate() {
                    let pool = self
                        .lookup_pool(hop.token_in, hop.token_out)
                        .ok_or_else(|| ErrorCode::ErrNoRoute(hop.token_in.to_string(), hop.token_out.to_string()))?;
                    if pool.version != PoolVersion::V3 {
                        return Err(ErrorCode::ErrNoRoute(hop.token_in.to_string(), hop.token_out.to_string()));
                    }
                    if i == 0 {
                        path.extend_from_slice(hop.token_in.as_slice());
                    }
                    path.extend_from_slice(&pool.fee_tier.to_be_bytes()[1..]);
                    path.extend_from_slice(hop.token_out.as_slice());
                    if i == hops.len() - 1 {
                        amount_out_min = hop.amount_out_min;
                    }
                }
                let call = exactInputCall {
                    params: ExactInputParams {
                        path: path.into(),
                        recipient,
                        deadline,
                        amountIn: amount_in,
                        amountOutMinimum: amount_out_min,
                    },
                };
                Ok(call.abi_encode())
            }
        }
    }

    /// Reject a simulated output that falls short of what the
    /// opportunity declared it expected, beyond the configured
    /// slippage tolerance.
    pub fn check_min_output(
        &self,
        simulated_amount_out: U256,
        declared_expected_out: U256,
        max_slippage_bps: u32,
    ) -> Result<(), ErrorCode> {
        let bps = U256::from(max_slippage_bps as u64);
        let tolerance = declared_expected_out.saturating_mul(bps) / U256::from(10_000u64);
        let floor = declared_expected_out.saturating_sub(tolerance);
        if simulated_amount_out < floor {
            let actual_bps = if declared_expected_out.is_zero() {
                0.0
            } else {
                let diff = declared_expected_out.saturating_sub(simulated_amount_out);
                (diff.to::<u128>() as f64 / declared_expected_out.to::<u128>() as f64) * 10_000.0
            };
            return Err(ErrorCode::ErrPriceDeviation {
                actual: actual_bps / 100.0,
                max: max_slippage_bps as f64 / 100.0,
            });
        }
        Ok(())
    }
}
