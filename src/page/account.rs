use serde::{Deserialize, Serialize};

use crate::page::standard::{ACCOUNT_FEATURES, SOLANA_CHAINS};

/// Account exposed to page scripts. Rebuilt, never mutated, when the address changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    address: String,
    public_key: Vec<u8>,
    label: String,
    icon: String,
    chains: Vec<String>,
    features: Vec<String>,
}

impl WalletAccount {
    pub fn new(address: &str, label: &str, icon: &str) -> Self {
        let public_key = match bs58::decode(address).into_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("⚠️  Account address {} is not base58 ({}), keeping raw bytes", address, e);
                address.as_bytes().to_vec()
            }
        };

        Self {
            address: address.to_string(),
            public_key,
            label: label.to_string(),
            icon: icon.to_string(),
            chains: SOLANA_CHAINS.iter().map(|c| c.to_string()).collect(),
            features: ACCOUNT_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}
