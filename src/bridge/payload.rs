use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A byte-ish value as it arrives over the boundary.
///
/// Pages hand us `Uint8Array`s, which survive `JSON.stringify` as index-keyed objects
/// (`{"0":104,"1":105}`), plain arrays, or already-encoded strings. Anything else is
/// kept verbatim so it can still be forwarded or displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WirePayload {
    Bytes(Vec<u8>),
    Text(String),
    Indexed(BTreeMap<u32, u8>),
    Other(Value),
}

impl WirePayload {
    /// Raw bytes in index order. Text is taken as its UTF-8 encoding.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            WirePayload::Bytes(bytes) => Some(bytes.clone()),
            WirePayload::Text(text) => Some(text.as_bytes().to_vec()),
            WirePayload::Indexed(map) => Some(map.values().copied().collect()),
            WirePayload::Other(_) => None,
        }
    }

    /// Human-readable rendering used by the confirmation surface.
    ///
    /// Byte shapes decode leniently, replacing invalid UTF-8 the way a browser
    /// `TextDecoder` does, so all three encodings of one message render identically.
    pub fn display_text(&self) -> String {
        match self {
            WirePayload::Text(text) => text.clone(),
            WirePayload::Bytes(_) | WirePayload::Indexed(_) => {
                let bytes = self.to_bytes().unwrap_or_default();
                String::from_utf8_lossy(&bytes).into_owned()
            }
            WirePayload::Other(value) => value.to_string(),
        }
    }

    /// Serialized transaction bytes. Strings are base58 (wallet convention) with a
    /// base64 fallback for pages that use web3.js `serialize().toString("base64")`.
    pub fn transaction_bytes(&self) -> Result<Vec<u8>, String> {
        match self {
            WirePayload::Text(encoded) => bs58::decode(encoded).into_vec().or_else(|bs58_err| {
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| format!("Invalid transaction encoding: {}", bs58_err))
            }),
            WirePayload::Bytes(_) | WirePayload::Indexed(_) => {
                Ok(self.to_bytes().unwrap_or_default())
            }
            WirePayload::Other(value) => Err(format!(
                "Unsupported transaction encoding: {}",
                json_kind(value)
            )),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            WirePayload::Bytes(bytes) => bytes.is_empty(),
            WirePayload::Text(text) => text.is_empty(),
            WirePayload::Indexed(map) => map.is_empty(),
            WirePayload::Other(value) => value.is_null(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for WirePayload {
    fn from(text: &str) -> Self {
        WirePayload::Text(text.to_string())
    }
}

impl From<String> for WirePayload {
    fn from(text: String) -> Self {
        WirePayload::Text(text)
    }
}

impl From<Vec<u8>> for WirePayload {
    fn from(bytes: Vec<u8>) -> Self {
        WirePayload::Bytes(bytes)
    }
}

impl From<&[u8]> for WirePayload {
    fn from(bytes: &[u8]) -> Self {
        WirePayload::Bytes(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> WirePayload {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_three_message_shapes_display_identically() {
        let from_bytes = parse("[104,101,108,108,111]");
        let from_text = parse("\"hello\"");
        let from_indexed = parse(r#"{"0":104,"1":101,"2":108,"3":108,"4":111}"#);

        assert!(matches!(from_bytes, WirePayload::Bytes(_)));
        assert!(matches!(from_text, WirePayload::Text(_)));
        assert!(matches!(from_indexed, WirePayload::Indexed(_)));

        assert_eq!(from_bytes.display_text(), "hello");
        assert_eq!(from_text.display_text(), "hello");
        assert_eq!(from_indexed.display_text(), "hello");
    }

    #[test]
    fn test_indexed_keys_sort_numerically() {
        // Lexical order would put "10" before "2".
        let mut raw = String::from("{");
        let word = b"hello world";
        for (i, b) in word.iter().enumerate().rev() {
            raw.push_str(&format!("\"{}\":{},", i, b));
        }
        raw.pop();
        raw.push('}');

        assert_eq!(parse(&raw).display_text(), "hello world");
    }

    #[test]
    fn test_multibyte_utf8_survives_every_shape() {
        let text = "gm ☀️";
        let bytes: Vec<u8> = text.as_bytes().to_vec();
        let indexed: BTreeMap<u32, u8> = bytes.iter().enumerate().map(|(i, b)| (i as u32, *b)).collect();

        assert_eq!(WirePayload::Bytes(bytes).display_text(), text);
        assert_eq!(WirePayload::Indexed(indexed).display_text(), text);
        assert_eq!(WirePayload::from(text).display_text(), text);
    }

    #[test]
    fn test_unrecognized_shape_is_stringified() {
        let payload = parse(r#"{"foo":"bar"}"#);
        assert!(matches!(payload, WirePayload::Other(_)));
        assert_eq!(payload.display_text(), r#"{"foo":"bar"}"#);
    }

    #[test]
    fn test_transaction_bytes_from_base58_and_base64() {
        let raw = vec![1u8, 2, 3, 250];
        let b58 = WirePayload::Text(bs58::encode(&raw).into_string());
        assert_eq!(b58.transaction_bytes().unwrap(), raw);

        let b64 = WirePayload::Text("AQID+g==".to_string());
        assert_eq!(b64.transaction_bytes().unwrap(), raw);

        let other = WirePayload::Other(Value::Bool(true));
        assert!(other.transaction_bytes().unwrap_err().contains("boolean"));
    }
}
