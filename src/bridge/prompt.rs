use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::message::VersionedMessage;
use solana_sdk::transaction::VersionedTransaction;

use crate::bridge::payload::WirePayload;
use crate::bridge::protocol::{BridgeMessage, OperationPayload, RequestId};
use crate::bridge::sign_in::SignInInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

/// A signing-class request waiting for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPrompt {
    pub id: RequestId,
    pub origin: String,
    pub request: BridgeMessage,
    pub decision: Decision,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPreview {
    pub instruction_count: usize,
    pub account_count: usize,
    pub blockhash: String,
    pub byte_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PromptBody {
    Message { text: String, hex: String },
    Transaction { preview: TxPreview },
    UndecodableTransaction { error: String },
    SignIn { domain: Option<String>, statement: Option<String> },
}

/// Everything a confirmation surface needs to render a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptView {
    pub id: RequestId,
    pub title: &'static str,
    pub description: &'static str,
    pub primary_label: &'static str,
    pub origin: String,
    pub body: PromptBody,
}

pub fn decode_transaction_preview(transaction: &WirePayload) -> Result<TxPreview, String> {
    let tx_bytes = transaction
        .transaction_bytes()
        .map_err(|e| format!("Failed to decode transaction: {}", e))?;

    let tx: VersionedTransaction = bincode::deserialize(&tx_bytes)
        .map_err(|e| format!("Failed to parse transaction: {}", e))?;

    let (instruction_count, account_count, blockhash) = match &tx.message {
        VersionedMessage::Legacy(message) => (
            message.instructions.len(),
            message.account_keys.len(),
            message.recent_blockhash.to_string(),
        ),
        VersionedMessage::V0(message) => (
            message.instructions.len(),
            message.account_keys.len(),
            message.recent_blockhash.to_string(),
        ),
    };

    Ok(TxPreview {
        instruction_count,
        account_count,
        blockhash,
        byte_size: tx_bytes.len(),
    })
}

fn transaction_body(transaction: &WirePayload) -> PromptBody {
    match decode_transaction_preview(transaction) {
        Ok(preview) => PromptBody::Transaction { preview },
        Err(error) => PromptBody::UndecodableTransaction { error },
    }
}

impl ConfirmationPrompt {
    pub fn new(id: RequestId, origin: impl Into<String>, request: BridgeMessage) -> Self {
        Self {
            id,
            origin: origin.into(),
            request,
            decision: Decision::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn view(&self) -> PromptView {
        let (title, description, primary_label, body) = match &self.request.payload {
            OperationPayload::SignTransaction(input) => (
                "Approve Transaction",
                "This transaction will be signed by your wallet.",
                "Approve & Sign",
                transaction_body(&input.transaction),
            ),
            OperationPayload::SignAndSendTransaction(input) => (
                "Approve Transaction",
                "This transaction will be signed and sent from your wallet.",
                "Approve & Send",
                transaction_body(&input.transaction),
            ),
            OperationPayload::SignMessage(input) => {
                let bytes = input.message.to_bytes().unwrap_or_default();
                (
                    "Approve Message Signature",
                    "This message will be signed by your wallet.",
                    "Approve & Sign",
                    PromptBody::Message {
                        text: input.message.display_text(),
                        hex: hex::encode(bytes),
                    },
                )
            }
            OperationPayload::SignIn(request) => {
                let input = SignInInput::from_value(&request.input);
                (
                    "Sign In",
                    "This site is asking you to sign in with your wallet.",
                    "Sign In",
                    PromptBody::SignIn {
                        domain: input.domain,
                        statement: input.statement,
                    },
                )
            }
            other => (
                "Approve Request",
                "Review the request before approving.",
                "Approve",
                PromptBody::Message {
                    text: other.tag().label().to_string(),
                    hex: String::new(),
                },
            ),
        };

        PromptView {
            id: self.id,
            title,
            description,
            primary_label,
            origin: self.origin.clone(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{MessageInput, TransactionInput};

    fn prompt(payload: OperationPayload) -> ConfirmationPrompt {
        ConfirmationPrompt::new(RequestId(9), "https://dapp.example", BridgeMessage::new(RequestId(1), payload))
    }

    #[test]
    fn test_message_body_decodes_indexed_bytes() {
        let message: WirePayload = serde_json::from_str(r#"{"0":104,"1":105}"#).unwrap();
        let view = prompt(OperationPayload::SignMessage(MessageInput { message })).view();

        assert_eq!(view.title, "Approve Message Signature");
        assert_eq!(
            view.body,
            PromptBody::Message {
                text: "hi".to_string(),
                hex: "6869".to_string()
            }
        );
        assert_eq!(view.origin, "https://dapp.example");
    }

    #[test]
    fn test_garbage_transaction_shows_decode_error() {
        let view = prompt(OperationPayload::SignTransaction(TransactionInput {
            transaction: WirePayload::from("3mJr7AoUXx2Wqd"),
        }))
        .view();

        assert_eq!(view.primary_label, "Approve & Sign");
        match view.body {
            PromptBody::UndecodableTransaction { error } => {
                assert!(error.starts_with("Failed to parse transaction"))
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
