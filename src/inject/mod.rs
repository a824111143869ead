//! Scripts a WebView host evaluates in the document.
//!
//! The bootstrap is the in-page rendition of [`crate::page::PageWallet`] and speaks the
//! same wire protocol. Every host value is embedded as JSON, never spliced into
//! JavaScript source, so names and error texts with quotes cannot break out.

use serde::Serialize;

use crate::bridge::protocol::OperationTag;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::page::standard::{
    ACCOUNT_FEATURES, FEATURE_VERSION, SOLANA_CHAINS, SUPPORTED_TRANSACTION_VERSIONS, WALLET_VERSION,
};

const BOOTSTRAP_TEMPLATE: &str = include_str!("bootstrap.js");
const CONFIG_PLACEHOLDER: &str = "__PLUTO_BRIDGE_CONFIG__";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapConfig<'a> {
    name: &'a str,
    icon: &'a str,
    version: &'static str,
    feature_version: &'static str,
    namespace: &'a str,
    vendor_marker: String,
    detection_flag: String,
    account_label: &'a str,
    chains: &'static [&'static str],
    account_features: &'static [&'static str],
    transaction_versions: &'static [&'static str],
    connect_timeout_ms: u128,
    request_timeout_ms: u128,
    public_key: Option<&'a str>,
    connected: bool,
    labels: std::collections::BTreeMap<&'static str, &'static str>,
    failures: std::collections::BTreeMap<&'static str, &'static str>,
}

/// The wallet bootstrap, carrying the host's current connection state.
pub fn render_bootstrap(
    config: &BridgeConfig,
    public_key: Option<&str>,
    connected: bool,
) -> Result<String, BridgeError> {
    let identity = &config.wallet;
    let detection_flag = identity.detection_flag();
    let bootstrap = BootstrapConfig {
        name: &identity.name,
        icon: &identity.icon,
        version: WALLET_VERSION,
        feature_version: FEATURE_VERSION,
        namespace: &identity.namespace,
        vendor_marker: detection_flag.trim_end_matches("WalletInjected").to_string(),
        detection_flag,
        account_label: &identity.account_label,
        chains: &SOLANA_CHAINS,
        account_features: &ACCOUNT_FEATURES,
        transaction_versions: &SUPPORTED_TRANSACTION_VERSIONS,
        connect_timeout_ms: config.connect_timeout().as_millis(),
        request_timeout_ms: config.request_timeout().as_millis(),
        public_key,
        connected: connected && public_key.is_some(),
        labels: OperationTag::ALL.iter().map(|t| (t.as_str(), t.label())).collect(),
        failures: OperationTag::ALL
            .iter()
            .map(|t| (t.as_str(), t.default_failure()))
            .collect(),
    };

    let json = serde_json::to_string(&bootstrap)
        .map_err(|e| BridgeError::Transport(format!("bootstrap config: {}", e)))?;
    Ok(BOOTSTRAP_TEMPLATE.replacen(CONFIG_PLACEHOLDER, &script_safe(&json), 1))
}

/// Script that dispatches `message` (already JSON) as a `message` event in the page.
pub fn response_script(message: &str) -> String {
    let literal = serde_json::Value::String(message.to_string()).to_string();
    format!(
        "window.dispatchEvent(new MessageEvent('message', {{ data: {} }}));\ntrue;",
        script_safe(&literal)
    )
}

/// JSON is not quite a JavaScript subset: line/paragraph separators and `</script>`
/// need escaping when embedded in a script.
fn script_safe(json: &str) -> String {
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::BridgeResponse;

    #[test]
    fn test_bootstrap_embeds_state_as_json() {
        let mut config = BridgeConfig::default();
        config.wallet.name = "Pluto \"Beta\"".to_string();

        let script = render_bootstrap(&config, Some("Addr1"), true).unwrap();

        assert!(!script.contains(CONFIG_PLACEHOLDER));
        assert!(script.contains(r#""name":"Pluto \"Beta\"""#));
        assert!(script.contains(r#""publicKey":"Addr1","connected":true"#));
        assert!(script.contains(r#""connectTimeoutMs":30000"#));
        assert!(script.contains(r#""detectionFlag":"isPlutoWalletInjected""#));
    }

    #[test]
    fn test_disconnected_bootstrap_has_no_account() {
        let script = render_bootstrap(&BridgeConfig::default(), None, true).unwrap();
        assert!(script.contains(r#""publicKey":null,"connected":false"#));
    }

    #[test]
    fn test_response_script_escapes_quotes_in_error() {
        let response = BridgeResponse::failure(None, OperationTag::SignMessage, "it's \"bad\"\u{2028}");
        let script = response_script(&response.encode());

        let start = script.find("data: ").unwrap() + "data: ".len();
        let end = script.rfind(" })").unwrap();
        let decoded: String = serde_json::from_str(&script[start..end]).unwrap();
        let inner: serde_json::Value = serde_json::from_str(&decoded).unwrap();

        assert_eq!(inner["error"], "it's \"bad\"\u{2028}");
        assert!(!script.contains('\u{2028}'));
    }
}
