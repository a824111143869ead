use anyhow::Context;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::transaction::VersionedTransaction;

/// Submits an already signed transaction and returns its base58 signature.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send(&self, transaction: &VersionedTransaction) -> anyhow::Result<String>;
}

pub struct RpcSender {
    client: RpcClient,
}

impl RpcSender {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let rpc_url = rpc_url.into();
        log::info!("🌐 Bridge: Using RPC: {}", rpc_url);
        Self {
            client: RpcClient::new(rpc_url),
        }
    }
}

#[async_trait]
impl TransactionSender for RpcSender {
    async fn send(&self, transaction: &VersionedTransaction) -> anyhow::Result<String> {
        let signature = self
            .client
            .send_transaction(transaction)
            .await
            .context("Transaction send failed")?;
        log::info!("🔗 On-chain Signature: {}", signature);
        Ok(signature.to_string())
    }
}
