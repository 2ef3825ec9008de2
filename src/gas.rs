use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::errors::ErrorCode;

/// Per-chain gas-spike guard: rejects execution when the current gas
/// price has jumped well past a rolling baseline, the same "compare
/// against a remembered baseline, abort before broadcast" shape as the
/// teacher's `evm.rs` gas-estimation helpers, generalized here from a
/// single estimate into a running baseline per chain.
pub struct GasPolicy {
    max_multiplier: f64,
    baselines: Mutex<HashMap<String, f64>>,
}

impl GasPolicy {
    pub fn new(max_multiplier: f64) -> Self {
        GasPolicy {
            max_multiplier,
            baselines: Mutex::new(HashMap::new()),
        }
    }

    /// Record an observed gas price as the new baseline for `chain`.
    pub fn observe(&self, chain: &str, gwei: f64) {
        self.baselines.lock().insert(chain.to_string(), gwei);
    }

    /// Check `current_gwei` against the chain's baseline. The first
    /// observation for a chain always passes (there is no baseline to
    /// spike against yet) and becomes the baseline.
    pub fn check(&self, chain: &str, current_gwei: f64) -> Result<(), ErrorCode> {
        let mut baselines = self.baselines.lock();
        let baseline = match baselines.get(chain) {
            Some(b) => *b,
            None => {
                baselines.insert(chain.to_string(), current_gwei);
                return Ok(());
            }
        };
        if baseline > 0.0 && current_gwei > baseline * self.max_multiplier {
            return Err(ErrorCode::ErrGasSpike {
                chain: chain.to_string(),
                current: current_gwei,
                baseline,
                multiplier: self.max_multiplier,
            });
        }
        baselines.insert(chain.to_string(), current_gwei);
        Ok(())
    }

    /// Clear a chain's baseline — called on provider reconnect, since a
    /// stale baseline measured before an outage isn't trustworthy.
    pub fn clear(&self, chain: &str) {
        self.baselines.lock().remove(chain);
    }
}
