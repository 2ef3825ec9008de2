use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer as _;

use crate::model::errors::ErrorCode;

/// One EVM wallet, derived once at startup and reused across every
/// chain this core trades on. Resolution order mirrors the teacher's
/// `RuntimeConfig::from_cli`: an env var holding the key directly, or
/// an env var pointing at a file — the file form is preferred in
/// containerized deployments since the key never shows up in `env`
/// output.
pub struct EvmWallet {
    pub signer: PrivateKeySigner,
    pub address: Address,
}

impl EvmWallet {
    pub fn from_private_key(private_key: &str) -> Result<Self, ErrorCode> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ErrorCode::ErrConfig(format!("invalid EVM private key: {e}")))?;
        let address = signer.address();
        Ok(EvmWallet { signer, address })
    }

    pub fn from_env(key_var: &str, file_var: &str) -> Result<Self, ErrorCode> {
        let private_key = resolve_secret(key_var, file_var)?;
        Self::from_private_key(&private_key)
    }
}

/// A Solana keypair, resolved separately from the EVM wallet since the
/// two chains don't share a key format.
pub struct SolanaWallet {
    pub keypair: Keypair,
}

impl SolanaWallet {
    pub fn from_base58(encoded: &str) -> Result<Self, ErrorCode> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ErrorCode::ErrConfig(format!("invalid Solana key encoding: {e}")))?;
        let keypair = Keypair::try_from(bytes.as_slice())
            .map_err(|e| ErrorCode::ErrConfig(format!("invalid Solana keypair: {e}")))?;
        Ok(SolanaWallet { keypair })
    }

    pub fn from_env(key_var: &str, file_var: &str) -> Result<Self, ErrorCode> {
        let encoded = resolve_secret(key_var, file_var)?;
        Self::from_base58(&encoded)
    }

    pub fn pubkey(&self) -> solana_sdk::pubkey::Pubkey {
        self.keypair.pubkey()
    }
}

fn resolve_secret(key_var: &str, file_var: &str) -> Result<String, ErrorCode> {
    if let Ok(value) = std::env::var(key_var) {
        return Ok(value);
    }
    if let Ok(path) = std::env::var(file_var) {
        return std::fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|e| ErrorCode::ErrConfig(format!("failed to read {path}: {e}")));
    }
    Err(ErrorCode::ErrConfig(format!(
        "secret not configured: set {key_var} or {file_var}"
    )))
}
