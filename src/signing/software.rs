// src/signing/software.rs
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};

use crate::bridge::payload::WirePayload;
use crate::signing::{ProviderRequest, SigningProvider, TransactionSender};
use crate::wallet::Wallet;

/// Signs with an in-process keypair. Sign-and-send needs a sender.
pub struct LocalSigner {
    wallet: Wallet,
    sender: Option<Arc<dyn TransactionSender>>,
}

impl LocalSigner {
    pub fn new(wallet: Wallet) -> Self {
        Self { wallet, sender: None }
    }

    pub fn with_sender(mut self, sender: Arc<dyn TransactionSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn address(&self) -> String {
        self.wallet.address()
    }

    /// Places our signature in the slot matching our key among the required signers.
    fn sign_transaction(&self, transaction: &WirePayload) -> anyhow::Result<VersionedTransaction> {
        let tx_bytes = transaction.transaction_bytes().map_err(|e| anyhow!(e))?;
        let mut versioned_tx: VersionedTransaction =
            bincode::deserialize(&tx_bytes).context("Failed to deserialize transaction")?;

        let signer_pubkey = Pubkey::from_str(&self.wallet.address()).context("Invalid wallet pubkey")?;
        let required_signers = versioned_tx.message.header().num_required_signatures as usize;
        let signer_index = versioned_tx
            .message
            .static_account_keys()
            .iter()
            .take(required_signers)
            .position(|key| key == &signer_pubkey)
            .ok_or_else(|| anyhow!("Wallet pubkey not found among required signers."))?;

        let signature = self.wallet.sign(&versioned_tx.message.serialize());

        if versioned_tx.signatures.len() != required_signers {
            versioned_tx.signatures = vec![Signature::default(); required_signers];
        }
        versioned_tx.signatures[signer_index] = Signature::from(signature.to_bytes());

        log::info!(
            "✅ Bridge: Transaction signed, signer slot {} of {}",
            signer_index,
            required_signers
        );
        Ok(versioned_tx)
    }

    fn sign_message(&self, message: &WirePayload) -> anyhow::Result<Value> {
        let bytes = message
            .to_bytes()
            .ok_or_else(|| anyhow!("Invalid message encoding"))?;
        if bytes.is_empty() {
            bail!("Empty message");
        }
        let signature = self.wallet.sign(&bytes);
        log::info!("✅ Bridge: Message signed ({} bytes)", bytes.len());
        Ok(Value::String(bs58::encode(signature.to_bytes()).into_string()))
    }
}

#[async_trait]
impl SigningProvider for LocalSigner {
    async fn accounts(&self) -> Vec<String> {
        vec![self.wallet.address()]
    }

    async fn request(&self, request: ProviderRequest) -> anyhow::Result<Value> {
        match request {
            ProviderRequest::SignMessage { message } => self.sign_message(&message),
            ProviderRequest::SignTransaction { transaction } => {
                let signed = self.sign_transaction(&transaction)?;
                let bytes = bincode::serialize(&signed).context("Failed to serialize signed transaction")?;
                log::info!("📦 Signed transaction encoded (length: {})", bytes.len());
                Ok(Value::String(bs58::encode(bytes).into_string()))
            }
            ProviderRequest::SignAndSendTransaction { transaction, .. } => {
                let sender = self
                    .sender
                    .as_ref()
                    .ok_or_else(|| anyhow!("No RPC endpoint configured for sending transactions"))?;
                let signed = self.sign_transaction(&transaction)?;
                let signature = sender.send(&signed).await?;
                log::info!("✅ Bridge: Transaction sent successfully!");
                Ok(Value::String(signature))
            }
        }
    }
}
