// src/wallet.rs
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Invalid key length: {0} bytes")]
    InvalidLength(usize),
    #[error("Public key does not match private key")]
    PublicKeyMismatch,
    #[error("Decode error: {0}")]
    Decode(String),
}

/// On-disk form of the bridge keypair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletInfo {
    pub name: String,
    pub address: String,
    /// Base58 64-byte Solana keypair (secret || public)
    pub keypair: String,
}

/// ed25519 keypair that answers for the bridge's single account
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    pub name: String,
}

impl Wallet {
    /// Generate a new random wallet
    pub fn generate(name: impl Into<String>) -> Self {
        let secret: [u8; 32] = OsRng.gen();
        Self {
            signing_key: SigningKey::from_bytes(&secret),
            name: name.into(),
        }
    }

    /// Accepts a 32-byte secret or a 64-byte Solana keypair
    pub fn from_private_key(bytes: &[u8], name: impl Into<String>) -> Result<Self, WalletError> {
        let secret: [u8; 32] = match bytes.len() {
            32 | 64 => {
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&bytes[..32]);
                secret
            }
            len => return Err(WalletError::InvalidLength(len)),
        };

        let signing_key = SigningKey::from_bytes(&secret);
        if bytes.len() == 64 && signing_key.verifying_key().as_bytes() != &bytes[32..] {
            return Err(WalletError::PublicKeyMismatch);
        }

        Ok(Self {
            signing_key,
            name: name.into(),
        })
    }

    pub fn from_wallet_info(info: &WalletInfo) -> Result<Self, WalletError> {
        let bytes = bs58::decode(&info.keypair)
            .into_vec()
            .map_err(|e| WalletError::Decode(e.to_string()))?;
        let wallet = Self::from_private_key(&bytes, info.name.clone())?;
        if !info.address.is_empty() && info.address != wallet.address() {
            log::warn!(
                "⚠️  Stored address {} does not match keypair, using {}",
                info.address,
                wallet.address()
            );
        }
        Ok(wallet)
    }

    pub fn to_wallet_info(&self) -> WalletInfo {
        let mut keypair = Vec::with_capacity(64);
        keypair.extend_from_slice(&self.signing_key.to_bytes());
        keypair.extend_from_slice(self.verifying_key().as_bytes());
        WalletInfo {
            name: self.name.clone(),
            address: self.address(),
            keypair: bs58::encode(keypair).into_string(),
        }
    }

    /// Base58 Solana address
    pub fn address(&self) -> String {
        bs58::encode(self.verifying_key().as_bytes()).into_string()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_wallet_info_restores_same_key() {
        let wallet = Wallet::generate("Bridge");
        let restored = Wallet::from_wallet_info(&wallet.to_wallet_info()).unwrap();
        assert_eq!(restored.address(), wallet.address());
    }

    #[test]
    fn test_signature_verifies() {
        let wallet = Wallet::generate("Bridge");
        let signature = wallet.sign(b"hello");
        assert!(wallet.verifying_key().verify(b"hello", &signature).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_keypair() {
        let wallet = Wallet::generate("Bridge");
        let mut bytes = bs58::decode(wallet.to_wallet_info().keypair).into_vec().unwrap();
        bytes[40] ^= 0xff;
        assert_eq!(
            Wallet::from_private_key(&bytes, "Bridge").unwrap_err(),
            WalletError::PublicKeyMismatch
        );
        assert_eq!(
            Wallet::from_private_key(&[1u8; 10], "Bridge").unwrap_err(),
            WalletError::InvalidLength(10)
        );
    }
}
