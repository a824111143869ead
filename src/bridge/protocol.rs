use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bridge::payload::WirePayload;
use crate::error::BridgeError;

/// Suffix appended to a request tag to form its response tag.
pub const RESPONSE_SUFFIX: &str = "_RESPONSE";

/// Host → page notification that forces a local disconnect.
pub const DISCONNECTED_NOTIFICATION: &str = "WALLET_DISCONNECTED";

/// Operation carried by a [`BridgeMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationTag {
    #[serde(rename = "WALLET_CONNECT")]
    Connect,
    #[serde(rename = "WALLET_DISCONNECT")]
    Disconnect,
    #[serde(rename = "WALLET_SIGN_TRANSACTION")]
    SignTransaction,
    #[serde(rename = "WALLET_SIGN_MESSAGE")]
    SignMessage,
    #[serde(rename = "WALLET_SIGN_SEND_TRANSACTION")]
    SignAndSendTransaction,
    #[serde(rename = "WALLET_SIGN_IN")]
    SignIn,
    #[serde(rename = "WALLET_SEND_TRANSACTION")]
    SendTransaction,
}

impl OperationTag {
    pub const ALL: [OperationTag; 7] = [
        OperationTag::Connect,
        OperationTag::Disconnect,
        OperationTag::SignTransaction,
        OperationTag::SignMessage,
        OperationTag::SignAndSendTransaction,
        OperationTag::SignIn,
        OperationTag::SendTransaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationTag::Connect => "WALLET_CONNECT",
            OperationTag::Disconnect => "WALLET_DISCONNECT",
            OperationTag::SignTransaction => "WALLET_SIGN_TRANSACTION",
            OperationTag::SignMessage => "WALLET_SIGN_MESSAGE",
            OperationTag::SignAndSendTransaction => "WALLET_SIGN_SEND_TRANSACTION",
            OperationTag::SignIn => "WALLET_SIGN_IN",
            OperationTag::SendTransaction => "WALLET_SEND_TRANSACTION",
        }
    }

    pub fn from_wire(kind: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.as_str() == kind)
    }

    pub fn response_type(&self) -> String {
        format!("{}{}", self.as_str(), RESPONSE_SUFFIX)
    }

    pub fn from_response_type(kind: &str) -> Option<Self> {
        kind.strip_suffix(RESPONSE_SUFFIX).and_then(Self::from_wire)
    }

    /// Signing-class operations are never resolved without a human decision.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            OperationTag::SignTransaction
                | OperationTag::SignMessage
                | OperationTag::SignAndSendTransaction
                | OperationTag::SignIn
        )
    }

    /// Short human name, used in notifications ("Failed to sign message: ...").
    pub fn label(&self) -> &'static str {
        match self {
            OperationTag::Connect => "connect wallet",
            OperationTag::Disconnect => "disconnect wallet",
            OperationTag::SignTransaction => "sign transaction",
            OperationTag::SignMessage => "sign message",
            OperationTag::SignAndSendTransaction => "sign and send transaction",
            OperationTag::SignIn => "sign in",
            OperationTag::SendTransaction => "send transaction",
        }
    }

    /// Error text used when a failed response carries none.
    pub fn default_failure(&self) -> &'static str {
        match self {
            OperationTag::Connect => "Connection failed",
            OperationTag::Disconnect => "Disconnect failed",
            OperationTag::SignTransaction => "Signing failed",
            OperationTag::SignMessage => "Message signing failed",
            OperationTag::SignAndSendTransaction => "Transaction failed",
            OperationTag::SignIn => "Sign in failed",
            OperationTag::SendTransaction => "Send transaction failed",
        }
    }
}

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation id carried by a request and echoed by its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transaction: WirePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendTransactionInput {
    pub transaction: WirePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInput {
    pub message: WirePayload,
}

/// Sign-in input is opaque to the page and forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationPayload {
    Connect(ConnectInput),
    Disconnect,
    SignTransaction(TransactionInput),
    SignAndSendTransaction(SendTransactionInput),
    SignMessage(MessageInput),
    SignIn(SignInRequest),
    SendTransaction(TransactionInput),
}

impl OperationPayload {
    pub fn tag(&self) -> OperationTag {
        match self {
            OperationPayload::Connect(_) => OperationTag::Connect,
            OperationPayload::Disconnect => OperationTag::Disconnect,
            OperationPayload::SignTransaction(_) => OperationTag::SignTransaction,
            OperationPayload::SignAndSendTransaction(_) => OperationTag::SignAndSendTransaction,
            OperationPayload::SignMessage(_) => OperationTag::SignMessage,
            OperationPayload::SignIn(_) => OperationTag::SignIn,
            OperationPayload::SendTransaction(_) => OperationTag::SendTransaction,
        }
    }

    fn to_data(&self) -> Result<Value, serde_json::Error> {
        match self {
            OperationPayload::Connect(input) => serde_json::to_value(input),
            OperationPayload::Disconnect => Ok(Value::Object(Map::new())),
            OperationPayload::SignTransaction(input) => serde_json::to_value(input),
            OperationPayload::SignAndSendTransaction(input) => serde_json::to_value(input),
            OperationPayload::SignMessage(input) => serde_json::to_value(input),
            OperationPayload::SignIn(input) => serde_json::to_value(input),
            OperationPayload::SendTransaction(input) => serde_json::to_value(input),
        }
    }

    fn from_data(tag: OperationTag, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match tag {
            OperationTag::Connect => OperationPayload::Connect(serde_json::from_value(data)?),
            OperationTag::Disconnect => OperationPayload::Disconnect,
            OperationTag::SignTransaction => {
                OperationPayload::SignTransaction(serde_json::from_value(data)?)
            }
            OperationTag::SignAndSendTransaction => {
                OperationPayload::SignAndSendTransaction(serde_json::from_value(data)?)
            }
            OperationTag::SignMessage => OperationPayload::SignMessage(serde_json::from_value(data)?),
            OperationTag::SignIn => OperationPayload::SignIn(serde_json::from_value(data)?),
            OperationTag::SendTransaction => {
                OperationPayload::SendTransaction(serde_json::from_value(data)?)
            }
        })
    }
}

/// Page → host request, the wire unit of the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMessage {
    /// Absent when sent by a legacy page script; responses then correlate on tag alone.
    pub id: Option<RequestId>,
    pub payload: OperationPayload,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(rename = "type")]
    kind: &'a str,
    data: Value,
}

impl BridgeMessage {
    pub fn new(id: RequestId, payload: OperationPayload) -> Self {
        Self { id: Some(id), payload }
    }

    pub fn tag(&self) -> OperationTag {
        self.payload.tag()
    }

    pub fn encode(&self) -> Result<String, BridgeError> {
        let envelope = Envelope {
            id: self.id,
            kind: self.tag().as_str(),
            data: self
                .payload
                .to_data()
                .map_err(|e| BridgeError::ProtocolMalformed(e.to_string()))?,
        };
        serde_json::to_string(&envelope).map_err(|e| BridgeError::ProtocolMalformed(e.to_string()))
    }

    /// Validates tag membership and payload shape before anything is dispatched.
    ///
    /// Anything that is not a JSON object with a known `type` and an object `data`
    /// is rejected; the shared channel also carries unrelated debug chatter.
    pub fn decode(raw: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::ProtocolMalformed(format!("not JSON: {}", e)))?;
        let Value::Object(mut object) = value else {
            return Err(BridgeError::ProtocolMalformed("not an object".to_string()));
        };

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::ProtocolMalformed("missing type".to_string()))?;
        let tag = OperationTag::from_wire(kind)
            .ok_or_else(|| BridgeError::ProtocolMalformed(format!("unknown type {}", kind)))?;

        let id = decode_id(&object)?;

        let data = match object.remove("data") {
            Some(data @ Value::Object(_)) => data,
            _ => {
                return Err(BridgeError::ProtocolMalformed(format!(
                    "{} without object data",
                    tag
                )))
            }
        };

        let payload = OperationPayload::from_data(tag, data)
            .map_err(|e| BridgeError::ProtocolMalformed(format!("{} payload: {}", tag, e)))?;

        Ok(Self { id, payload })
    }
}

fn decode_id(object: &Map<String, Value>) -> Result<Option<RequestId>, BridgeError> {
    match object.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|id| Some(RequestId(id)))
            .ok_or_else(|| BridgeError::ProtocolMalformed("id is not an unsigned integer".to_string())),
    }
}

/// Result fields of a response, one variant per operation outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Connected { public_key: String },
    TransactionSigned { signed_transaction: Value },
    TransactionSent { signature: String },
    MessageSigned { signature: Value },
    SignedIn { output: Value },
    /// Success without result fields.
    Acknowledged,
    Failed { error: String },
}

impl ResponseBody {
    pub fn is_success(&self) -> bool {
        !matches!(self, ResponseBody::Failed { .. })
    }
}

/// Host → page response.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeResponse {
    pub id: Option<RequestId>,
    pub tag: OperationTag,
    pub body: ResponseBody,
}

impl BridgeResponse {
    pub fn new(id: Option<RequestId>, tag: OperationTag, body: ResponseBody) -> Self {
        Self { id, tag, body }
    }

    pub fn failure(id: Option<RequestId>, tag: OperationTag, error: impl Into<String>) -> Self {
        Self::new(id, tag, ResponseBody::Failed { error: error.into() })
    }

    /// Response answering `request`.
    pub fn to(request: &BridgeMessage, body: ResponseBody) -> Self {
        Self::new(request.id, request.tag(), body)
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        if let Some(id) = self.id {
            object.insert("id".to_string(), Value::from(id.0));
        }
        object.insert("type".to_string(), Value::from(self.tag.response_type()));
        object.insert("success".to_string(), Value::Bool(self.body.is_success()));

        match &self.body {
            ResponseBody::Connected { public_key } => {
                object.insert("publicKey".to_string(), Value::from(public_key.clone()));
            }
            ResponseBody::TransactionSigned { signed_transaction } => {
                object.insert("signedTransaction".to_string(), signed_transaction.clone());
            }
            ResponseBody::TransactionSent { signature } => {
                object.insert("signature".to_string(), Value::from(signature.clone()));
            }
            ResponseBody::MessageSigned { signature } => {
                object.insert("signature".to_string(), signature.clone());
            }
            ResponseBody::SignedIn { output } => {
                object.insert("output".to_string(), output.clone());
            }
            ResponseBody::Acknowledged => {}
            ResponseBody::Failed { error } => {
                object.insert("error".to_string(), Value::from(error.clone()));
            }
        }

        Value::Object(object)
    }

    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    /// Decodes a response. A `success: true` response missing the fields its operation
    /// promises decodes to a failure, so the waiting caller is rejected rather than
    /// handed a partial result.
    pub fn decode(raw: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::ProtocolMalformed(format!("not JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, BridgeError> {
        let object = value
            .as_object()
            .ok_or_else(|| BridgeError::ProtocolMalformed("not an object".to_string()))?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::ProtocolMalformed("missing type".to_string()))?;
        let tag = OperationTag::from_response_type(kind)
            .ok_or_else(|| BridgeError::ProtocolMalformed(format!("unknown type {}", kind)))?;
        let id = decode_id(object)?;

        let success = object.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !success {
            let error = object
                .get("error")
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .unwrap_or(tag.default_failure())
                .to_string();
            return Ok(Self::new(id, tag, ResponseBody::Failed { error }));
        }

        let present = |key: &str| object.get(key).filter(|v| !v.is_null()).cloned();
        let body = match tag {
            OperationTag::Connect => present("publicKey")
                .and_then(|v| v.as_str().map(str::to_string))
                .map(|public_key| ResponseBody::Connected { public_key }),
            OperationTag::SignTransaction => present("signedTransaction")
                .map(|signed_transaction| ResponseBody::TransactionSigned { signed_transaction }),
            OperationTag::SignAndSendTransaction => present("signature")
                .and_then(|v| v.as_str().map(str::to_string))
                .map(|signature| ResponseBody::TransactionSent { signature }),
            OperationTag::SignMessage => {
                present("signature").map(|signature| ResponseBody::MessageSigned { signature })
            }
            OperationTag::SignIn => present("output").map(|output| ResponseBody::SignedIn { output }),
            OperationTag::Disconnect | OperationTag::SendTransaction => Some(ResponseBody::Acknowledged),
        };

        let body = body.unwrap_or_else(|| ResponseBody::Failed {
            error: format!("Malformed {} response", tag.label()),
        });

        Ok(Self::new(id, tag, body))
    }
}

/// Host-originated message that is not a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNotification {
    Disconnected,
}

impl HostNotification {
    pub fn encode(&self) -> String {
        match self {
            HostNotification::Disconnected => {
                serde_json::json!({ "type": DISCONNECTED_NOTIFICATION }).to_string()
            }
        }
    }
}

/// Anything the page side may receive from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Response(BridgeResponse),
    Notification(HostNotification),
}

impl InboundMessage {
    pub fn decode(raw: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::ProtocolMalformed(format!("not JSON: {}", e)))?;
        if value.get("type").and_then(Value::as_str) == Some(DISCONNECTED_NOTIFICATION) {
            return Ok(InboundMessage::Notification(HostNotification::Disconnected));
        }
        BridgeResponse::from_value(&value).map(InboundMessage::Response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let message = BridgeMessage::new(
            RequestId(7),
            OperationPayload::SignMessage(MessageInput { message: "hello".into() }),
        );
        let value: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "id": 7, "type": "WALLET_SIGN_MESSAGE", "data": { "message": "hello" } })
        );
    }

    #[test]
    fn test_decode_legacy_request_without_id() {
        let message = BridgeMessage::decode(r#"{"type":"WALLET_CONNECT","data":{}}"#).unwrap();
        assert_eq!(message.id, None);
        assert_eq!(message.payload, OperationPayload::Connect(ConnectInput::default()));
    }

    #[test]
    fn test_decode_rejects_non_protocol_traffic() {
        let cases = [
            "Wallet registered: {}",
            "[1,2,3]",
            r#"{"type":"SOMETHING_ELSE","data":{}}"#,
            r#"{"type":"WALLET_CONNECT"}"#,
            r#"{"type":"WALLET_CONNECT","data":null}"#,
            r#"{"type":"WALLET_CONNECT","data":"silent"}"#,
            r#"{"type":"WALLET_SIGN_MESSAGE","data":{}}"#,
            r#"{"id":"seven","type":"WALLET_CONNECT","data":{}}"#,
        ];
        for raw in cases {
            let err = BridgeMessage::decode(raw).unwrap_err();
            assert!(matches!(err, BridgeError::ProtocolMalformed(_)), "{raw}");
        }
    }

    #[test]
    fn test_sign_and_send_keeps_options() {
        let raw = r#"{"id":3,"type":"WALLET_SIGN_SEND_TRANSACTION","data":{"transaction":"abc","options":{"skipPreflight":true}}}"#;
        let message = BridgeMessage::decode(raw).unwrap();
        match message.payload {
            OperationPayload::SignAndSendTransaction(input) => {
                assert_eq!(input.transaction, WirePayload::Text("abc".into()));
                assert_eq!(input.options, Some(json!({ "skipPreflight": true })));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_response_success_shape() {
        let response = BridgeResponse::new(
            Some(RequestId(1)),
            OperationTag::Connect,
            ResponseBody::Connected { public_key: "Addr1".into() },
        );
        assert_eq!(
            response.to_value(),
            json!({ "id": 1, "type": "WALLET_CONNECT_RESPONSE", "success": true, "publicKey": "Addr1" })
        );
        assert_eq!(BridgeResponse::decode(&response.encode()).unwrap(), response);
    }

    #[test]
    fn test_failed_response_defaults_error_text() {
        let response =
            BridgeResponse::decode(r#"{"type":"WALLET_SIGN_MESSAGE_RESPONSE","success":false}"#).unwrap();
        assert_eq!(
            response.body,
            ResponseBody::Failed { error: "Message signing failed".into() }
        );
    }

    #[test]
    fn test_success_missing_fields_decodes_as_failure() {
        let response = BridgeResponse::decode(
            r#"{"id":4,"type":"WALLET_SIGN_SEND_TRANSACTION_RESPONSE","success":true}"#,
        )
        .unwrap();
        assert!(!response.body.is_success());
    }

    #[test]
    fn test_inbound_disconnect_notification() {
        let raw = HostNotification::Disconnected.encode();
        assert_eq!(
            InboundMessage::decode(&raw).unwrap(),
            InboundMessage::Notification(HostNotification::Disconnected)
        );
    }

    #[test]
    fn test_every_tag_round_trips_its_wire_name() {
        for tag in OperationTag::ALL {
            assert_eq!(OperationTag::from_wire(tag.as_str()), Some(tag));
            assert_eq!(OperationTag::from_response_type(&tag.response_type()), Some(tag));
        }
    }
}
