use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Small placeholder mark; hosts normally override it with their own artwork.
pub const DEFAULT_WALLET_ICON: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHZpZXdCb3g9IjAgMCAzMiAzMiI+PGNpcmNsZSBjeD0iMTYiIGN5PSIxNiIgcj0iMTYiIGZpbGw9IiM0ZjQ2ZTUiLz48L3N2Zz4=";

/// What the page-side wallet calls itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletIdentity {
    pub name: String,
    pub icon: String,
    pub url: String,
    /// Vendor feature namespace and global slot, e.g. `pluto` → `pluto:` and `window.pluto`.
    pub namespace: String,
    pub account_label: String,
}

impl Default for WalletIdentity {
    fn default() -> Self {
        Self {
            name: "Pluto".to_string(),
            icon: DEFAULT_WALLET_ICON.to_string(),
            url: "https://plutomobile.app".to_string(),
            namespace: "pluto".to_string(),
            account_label: "Pluto Wallet".to_string(),
        }
    }
}

impl WalletIdentity {
    pub fn feature_namespace(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// `isPlutoWalletInjected` for the `pluto` namespace.
    pub fn detection_flag(&self) -> String {
        let mut chars = self.namespace.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("is{}WalletInjected", capitalized)
    }
}

/// Bridge configuration, loaded from a JSON file or the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub wallet: WalletIdentity,
    /// Page-side limit on a connect round trip.
    pub connect_timeout_secs: u64,
    /// Page-side limit on every other round trip.
    pub request_timeout_secs: u64,
    /// Host-side limit on an undecided confirmation prompt. Kept below
    /// `request_timeout_secs` so the host always answers before the page gives up.
    pub approval_timeout_secs: u64,
    /// Delay before re-injecting the wallet script after connect/disconnect.
    pub reinject_delay_ms: u64,
    pub enabled: bool,
    /// RPC endpoint used for sign-and-send. Without it sign-and-send fails.
    pub rpc_url: Option<String>,
    pub listen_port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wallet: WalletIdentity::default(),
            connect_timeout_secs: 30,
            request_timeout_secs: 300,
            approval_timeout_secs: 240,
            reinject_delay_ms: 100,
            enabled: true,
            rpc_url: None,
            listen_port: 9753,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let num = |key: &str, fallback: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };

        let mut wallet = defaults.wallet.clone();
        if let Ok(name) = std::env::var("PLUTO_BRIDGE_WALLET_NAME") {
            wallet.name = name;
        }
        if let Ok(icon) = std::env::var("PLUTO_BRIDGE_WALLET_ICON") {
            wallet.icon = icon;
        }

        Self {
            wallet,
            connect_timeout_secs: num("PLUTO_BRIDGE_CONNECT_TIMEOUT", defaults.connect_timeout_secs),
            request_timeout_secs: num("PLUTO_BRIDGE_REQUEST_TIMEOUT", defaults.request_timeout_secs),
            approval_timeout_secs: num("PLUTO_BRIDGE_APPROVAL_TIMEOUT", defaults.approval_timeout_secs),
            reinject_delay_ms: num("PLUTO_BRIDGE_REINJECT_DELAY_MS", defaults.reinject_delay_ms),
            enabled: std::env::var("PLUTO_BRIDGE_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.enabled),
            rpc_url: std::env::var("PLUTO_BRIDGE_RPC_URL").ok().filter(|v| !v.is_empty()),
            listen_port: std::env::var("PLUTO_BRIDGE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.listen_port),
        }
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 || self.approval_timeout_secs == 0 {
            return Err(BridgeError::Config("timeouts must be non-zero".to_string()));
        }
        if self.approval_timeout_secs >= self.request_timeout_secs {
            return Err(BridgeError::Config(format!(
                "approval timeout ({}s) must be shorter than request timeout ({}s)",
                self.approval_timeout_secs, self.request_timeout_secs
            )));
        }
        if self.wallet.namespace.is_empty() || self.wallet.namespace.contains(':') {
            return Err(BridgeError::Config(format!(
                "invalid wallet namespace {:?}",
                self.wallet.namespace
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn reinject_delay(&self) -> Duration {
        Duration::from_millis(self.reinject_delay_ms)
    }
}
