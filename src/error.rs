use thiserror::Error;

use crate::bridge::protocol::OperationTag;

/// Failure taxonomy shared by both sides of the boundary.
///
/// Request-class failures travel across the boundary as a `success: false` response whose
/// `error` field is the `Display` text of the variant, so the texts here are user facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Signing collaborator or account unavailable, or the bridge is switched off.
    #[error("{0}")]
    NotReady(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Host answered a connect with `success: false`.
    #[error("{0}")]
    ConnectionRejected(String),

    #[error("User cancelled")]
    UserRejected,

    /// Host answered a signing request with `success: false`.
    #[error("{0}")]
    SigningRejected(String),

    /// Collaborator threw or returned something unusable.
    #[error("{0}")]
    SigningFailed(String),

    #[error("{0} request timed out")]
    RequestTimeout(OperationTag),

    #[error("Approval timed out")]
    ApprovalTimeout,

    /// The pending request was dropped (disconnect, navigation, router shutdown).
    #[error("Request cancelled")]
    Abandoned,

    #[error("Malformed bridge message: {0}")]
    ProtocolMalformed(String),

    #[error("Bridge transport error: {0}")]
    Transport(String),

    #[error("Confirmation prompt {0} not found")]
    PromptNotFound(u64),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_text() {
        assert_eq!(BridgeError::UserRejected.to_string(), "User cancelled");
    }

    #[test]
    fn test_rejection_carries_host_text_verbatim() {
        let err = BridgeError::SigningRejected("Insufficient funds".to_string());
        assert_eq!(err.to_string(), "Insufficient funds");
    }
}
