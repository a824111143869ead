// src/signing/mod.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::payload::WirePayload;

pub mod sender;
pub mod software;

pub use sender::{RpcSender, TransactionSender};
pub use software::LocalSigner;

/// Call into the signing collaborator, `{ method, params }` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ProviderRequest {
    SignMessage {
        message: WirePayload,
    },
    SignTransaction {
        transaction: WirePayload,
    },
    SignAndSendTransaction {
        transaction: WirePayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
}

impl ProviderRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ProviderRequest::SignMessage { .. } => "signMessage",
            ProviderRequest::SignTransaction { .. } => "signTransaction",
            ProviderRequest::SignAndSendTransaction { .. } => "signAndSendTransaction",
        }
    }
}

/// Whatever actually holds signing authority. Only the router talks to it.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Base58 addresses; empty means the wallet is not ready.
    async fn accounts(&self) -> Vec<String>;

    async fn request(&self, request: ProviderRequest) -> anyhow::Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = ProviderRequest::SignAndSendTransaction {
            transaction: WirePayload::from("3xyz"),
            options: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"method": "signAndSendTransaction", "params": {"transaction": "3xyz"}})
        );

        let parsed: ProviderRequest =
            serde_json::from_value(json!({"method": "signMessage", "params": {"message": [104, 105]}}))
                .unwrap();
        assert_eq!(parsed.method(), "signMessage");
    }
}
