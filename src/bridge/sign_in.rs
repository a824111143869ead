//! Sign-In-With-Solana message construction.

use serde::Deserialize;
use serde_json::Value;

/// The fields of a `solana:signIn` input. Every field is optional; pages send
/// anything from `{}` to the full set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignInInput {
    pub domain: Option<String>,
    pub address: Option<String>,
    pub statement: Option<String>,
    pub uri: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<String>,
    pub nonce: Option<String>,
    pub issued_at: Option<String>,
    pub expiration_time: Option<String>,
    pub not_before: Option<String>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl SignInInput {
    /// Unknown or mistyped input degrades to the empty input rather than failing.
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(input) => input,
            Err(e) => {
                log::debug!("Sign-in input not understood ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Renders the text the wallet signs. `fallback_domain` is used when the page did
    /// not name one.
    pub fn message(&self, address: &str, fallback_domain: &str) -> String {
        let domain = self.domain.as_deref().unwrap_or(fallback_domain);
        let mut message = format!(
            "{} wants you to sign in with your Solana account:\n{}",
            domain, address
        );

        if let Some(statement) = &self.statement {
            message.push_str("\n\n");
            message.push_str(statement);
        }

        let mut fields = Vec::new();
        let labelled = [
            ("URI", &self.uri),
            ("Version", &self.version),
            ("Chain ID", &self.chain_id),
            ("Nonce", &self.nonce),
            ("Issued At", &self.issued_at),
            ("Expiration Time", &self.expiration_time),
            ("Not Before", &self.not_before),
            ("Request ID", &self.request_id),
        ];
        for (label, value) in labelled {
            if let Some(value) = value {
                fields.push(format!("{}: {}", label, value));
            }
        }
        if !self.resources.is_empty() {
            fields.push("Resources:".to_string());
            fields.extend(self.resources.iter().map(|r| format!("- {}", r)));
        }

        if !fields.is_empty() {
            message.push_str("\n\n");
            message.push_str(&fields.join("\n"));
        }
        message
    }
}

/// Host part of an origin such as `https://dapp.example:8080/path`.
pub fn origin_domain(origin: &str) -> &str {
    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}
