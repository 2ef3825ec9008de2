pub mod breaker;
pub mod commit_reveal;
pub mod config;
pub mod cross_chain;
pub mod dex;
pub mod flash_loan;
pub mod gas;
pub mod metrics;
pub mod model;
pub mod nonce;
pub mod orchestrator;
pub mod provider;
pub mod simulation;
pub mod strategies;
pub mod stream;
pub mod swap_step;

#[cfg(test)]
pub mod test_support;
