//! Makes the page wallet discoverable by page scripts that know nothing about the bridge.
//!
//! Five independent paths are used, each guarded on its own so one failing surface
//! (a frozen `navigator.wallets`, a hostile setter on `window.solana`) cannot stop
//! the others.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{BridgeConfig, WalletIdentity};
use crate::page::standard::{APP_READY_EVENT, LEGACY_SOLANA_SLOT, REGISTER_WALLET_EVENT};
use crate::page::wallet::{PageTransport, PageWallet};

/// The `{ register }` object a discovery library hands to registration callbacks.
pub trait WalletsApi {
    fn register(&self, wallet: Arc<PageWallet>);
}

/// `({ register }) => register(wallet)`.
pub type RegisterCallback = Arc<dyn Fn(&dyn WalletsApi) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("{0} is read-only")]
    ReadOnly(String),
    #[error("document has been torn down")]
    Detached,
}

/// Value stored in a legacy global slot.
#[derive(Clone)]
pub enum GlobalSlotValue {
    /// `window.solana = wallet`
    Wallet(Arc<PageWallet>),
    /// `window.pluto = { solana: wallet, isPluto: true }`
    Vendor {
        solana: Arc<PageWallet>,
        marker: String,
    },
}

impl GlobalSlotValue {
    pub fn wallet(&self) -> &Arc<PageWallet> {
        match self {
            GlobalSlotValue::Wallet(wallet) => wallet,
            GlobalSlotValue::Vendor { solana, .. } => solana,
        }
    }
}

/// Entry of the deprecated `navigator.wallets` array.
#[derive(Clone)]
pub struct LegacyEntry {
    pub wallet_name: String,
    pub callback: RegisterCallback,
}

/// Discovery surface of a document (`window` / `navigator`).
pub trait DiscoveryWindow {
    /// Non-bubbling, non-cancelable `wallet-standard:register-wallet` whose detail is
    /// `callback`.
    fn dispatch_register_wallet(&self, callback: RegisterCallback) -> Result<(), RegistrationError>;
    /// `addEventListener("wallet-standard:app-ready", ({ detail }) => callback(detail))`.
    fn listen_app_ready(&self, callback: RegisterCallback) -> Result<(), RegistrationError>;
    fn assign_global(&self, slot: &str, value: GlobalSlotValue) -> Result<(), RegistrationError>;
    /// Appends to `navigator.wallets`, creating the array if the page has none.
    fn push_legacy_wallet(&self, entry: LegacyEntry) -> Result<(), RegistrationError>;
    fn set_flag(&self, name: &str, value: bool) -> Result<(), RegistrationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    RegisterEvent,
    AppReadyListener,
    LegacySolanaSlot,
    VendorSlot,
    LegacyRegistry,
    DetectionFlag,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStep::RegisterEvent => REGISTER_WALLET_EVENT,
            RegistrationStep::AppReadyListener => APP_READY_EVENT,
            RegistrationStep::LegacySolanaSlot => "window.solana",
            RegistrationStep::VendorSlot => "vendor global",
            RegistrationStep::LegacyRegistry => "navigator.wallets",
            RegistrationStep::DetectionFlag => "detection flag",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub completed: Vec<RegistrationStep>,
    pub failed: Vec<(RegistrationStep, RegistrationError)>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, step: RegistrationStep, result: Result<(), RegistrationError>) {
        match result {
            Ok(()) => self.completed.push(step),
            Err(e) => {
                log::warn!("⚠️  {} could not be registered: {}", step, e);
                self.failed.push((step, e));
            }
        }
    }
}

/// Runs every registration path once. Never fails as a whole.
pub fn register_wallet(
    window: &dyn DiscoveryWindow,
    wallet: &Arc<PageWallet>,
    identity: &WalletIdentity,
) -> RegistrationReport {
    let callback: RegisterCallback = {
        let wallet = Arc::clone(wallet);
        Arc::new(move |api: &dyn WalletsApi| api.register(Arc::clone(&wallet)))
    };

    let mut report = RegistrationReport::default();
    report.record(
        RegistrationStep::RegisterEvent,
        window.dispatch_register_wallet(Arc::clone(&callback)),
    );
    report.record(
        RegistrationStep::AppReadyListener,
        window.listen_app_ready(Arc::clone(&callback)),
    );
    report.record(
        RegistrationStep::LegacySolanaSlot,
        window.assign_global(LEGACY_SOLANA_SLOT, GlobalSlotValue::Wallet(Arc::clone(wallet))),
    );
    report.record(
        RegistrationStep::VendorSlot,
        window.assign_global(
            &identity.namespace,
            GlobalSlotValue::Vendor {
                solana: Arc::clone(wallet),
                marker: vendor_marker(identity),
            },
        ),
    );
    report.record(
        RegistrationStep::LegacyRegistry,
        window.push_legacy_wallet(LegacyEntry {
            wallet_name: identity.name.clone(),
            callback,
        }),
    );
    report.record(
        RegistrationStep::DetectionFlag,
        window.set_flag(&identity.detection_flag(), true),
    );

    if report.is_complete() {
        log::info!("✅ {} Wallet registered using wallet standard", identity.name);
    }
    report
}

/// `isPluto` for the `pluto` namespace.
fn vendor_marker(identity: &WalletIdentity) -> String {
    identity
        .detection_flag()
        .trim_end_matches("WalletInjected")
        .to_string()
}

/// A discovery library's wallet list. Registering the same object twice is a no-op.
#[derive(Default)]
pub struct AppRegistry {
    wallets: Mutex<Vec<Arc<PageWallet>>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallets(&self) -> Vec<Arc<PageWallet>> {
        self.wallets.lock().clone()
    }
}

impl WalletsApi for AppRegistry {
    fn register(&self, wallet: Arc<PageWallet>) {
        let mut wallets = self.wallets.lock();
        if !wallets.iter().any(|w| Arc::ptr_eq(w, &wallet)) {
            wallets.push(wallet);
        }
    }
}

#[derive(Default)]
struct LegacyRegistry {
    entries: Vec<LegacyEntry>,
    frozen: bool,
}

#[derive(Default)]
struct ScopeState {
    wallet: Option<Arc<PageWallet>>,
    register_listeners: Vec<Arc<AppRegistry>>,
    app_ready_callbacks: Vec<RegisterCallback>,
    globals: HashMap<String, GlobalSlotValue>,
    legacy: Option<LegacyRegistry>,
    flags: HashMap<String, bool>,
    frozen_globals: Vec<String>,
    torn_down: bool,
}

/// Bridge state for one loaded document. Created when the page loads, torn down on
/// navigation; nothing outlives it.
pub struct DocumentScope {
    url: String,
    state: Mutex<ScopeState>,
}

impl DocumentScope {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Mutex::new(ScopeState::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Creates the document's wallet on first use and runs registration. Later calls
    /// reuse the same wallet object so discovery never sees two diverging copies.
    pub fn install(
        &self,
        config: &BridgeConfig,
        transport: Arc<dyn PageTransport>,
    ) -> Result<(Arc<PageWallet>, RegistrationReport), RegistrationError> {
        let wallet = {
            let mut state = self.state.lock();
            if state.torn_down {
                return Err(RegistrationError::Detached);
            }
            match &state.wallet {
                Some(wallet) => Arc::clone(wallet),
                None => {
                    let wallet = Arc::new(PageWallet::new(config, transport));
                    state.wallet = Some(Arc::clone(&wallet));
                    wallet
                }
            }
        };

        let report = register_wallet(self, &wallet, &config.wallet);
        Ok((wallet, report))
    }

    pub fn wallet(&self) -> Option<Arc<PageWallet>> {
        self.state.lock().wallet.clone()
    }

    /// A page-side discovery library subscribing to register-wallet events.
    pub fn add_register_listener(&self, app: Arc<AppRegistry>) {
        self.state.lock().register_listeners.push(app);
    }

    /// A late discovery library announcing itself.
    pub fn fire_app_ready(&self, app: &dyn WalletsApi) {
        let callbacks = self.state.lock().app_ready_callbacks.clone();
        for callback in callbacks {
            callback(app);
        }
    }

    /// A legacy detector walking `navigator.wallets`.
    pub fn read_legacy_registry(&self, app: &dyn WalletsApi) {
        let entries = self
            .state
            .lock()
            .legacy
            .as_ref()
            .map(|registry| registry.entries.clone())
            .unwrap_or_default();
        for entry in entries {
            (entry.callback)(app);
        }
    }

    pub fn legacy_registry_len(&self) -> usize {
        self.state.lock().legacy.as_ref().map_or(0, |r| r.entries.len())
    }

    /// `Object.freeze(navigator.wallets)`, creating the array first if needed.
    pub fn freeze_legacy_registry(&self) {
        self.state.lock().legacy.get_or_insert_with(LegacyRegistry::default).frozen = true;
    }

    /// Makes a global slot non-writable, as some pages do with `window.solana`.
    pub fn freeze_global(&self, slot: &str) {
        self.state.lock().frozen_globals.push(slot.to_string());
    }

    pub fn global(&self, slot: &str) -> Option<GlobalSlotValue> {
        self.state.lock().globals.get(slot).cloned()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.state.lock().flags.get(name).copied().unwrap_or(false)
    }

    /// Navigation away: in-flight wallet calls fail and every surface is cleared.
    pub fn teardown(&self) {
        let wallet = {
            let mut state = self.state.lock();
            let wallet = state.wallet.take();
            *state = ScopeState {
                torn_down: true,
                ..ScopeState::default()
            };
            wallet
        };
        if let Some(wallet) = wallet {
            wallet.teardown();
        }
        log::info!("🧹 Document scope for {} torn down", self.url);
    }
}

impl DiscoveryWindow for DocumentScope {
    fn dispatch_register_wallet(&self, callback: RegisterCallback) -> Result<(), RegistrationError> {
        let listeners = {
            let state = self.state.lock();
            if state.torn_down {
                return Err(RegistrationError::Detached);
            }
            state.register_listeners.clone()
        };
        for app in listeners {
            let api: &dyn WalletsApi = app.as_ref();
            callback(api);
        }
        Ok(())
    }

    fn listen_app_ready(&self, callback: RegisterCallback) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RegistrationError::Detached);
        }
        // One wallet per document, so one listener is enough.
        if state.app_ready_callbacks.is_empty() {
            state.app_ready_callbacks.push(callback);
        }
        Ok(())
    }

    fn assign_global(&self, slot: &str, value: GlobalSlotValue) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RegistrationError::Detached);
        }
        if state.frozen_globals.iter().any(|s| s == slot) {
            return Err(RegistrationError::ReadOnly(format!("window.{}", slot)));
        }
        state.globals.insert(slot.to_string(), value);
        Ok(())
    }

    fn push_legacy_wallet(&self, entry: LegacyEntry) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RegistrationError::Detached);
        }
        let registry = state.legacy.get_or_insert_with(LegacyRegistry::default);
        if registry.frozen {
            return Err(RegistrationError::ReadOnly("navigator.wallets".to_string()));
        }
        registry.entries.retain(|e| e.wallet_name != entry.wallet_name);
        registry.entries.push(entry);
        Ok(())
    }

    fn set_flag(&self, name: &str, value: bool) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RegistrationError::Detached);
        }
        state.flags.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    struct NullTransport;

    impl PageTransport for NullTransport {
        fn post_message(&self, _message: String) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    fn install(scope: &DocumentScope) -> (Arc<PageWallet>, RegistrationReport) {
        scope.install(&BridgeConfig::default(), Arc::new(NullTransport)).unwrap()
    }

    #[test]
    fn test_every_path_registers() {
        let scope = DocumentScope::new("https://dapp.example");
        let early = Arc::new(AppRegistry::new());
        scope.add_register_listener(Arc::clone(&early));

        let (wallet, report) = install(&scope);

        assert!(report.is_complete());
        assert_eq!(report.completed.len(), 6);
        assert_eq!(early.wallets().len(), 1);
        assert!(Arc::ptr_eq(scope.global("solana").unwrap().wallet(), &wallet));
        match scope.global("pluto").unwrap() {
            GlobalSlotValue::Vendor { marker, .. } => assert_eq!(marker, "isPluto"),
            GlobalSlotValue::Wallet(_) => panic!("vendor slot holds bare wallet"),
        }
        assert!(scope.flag("isPlutoWalletInjected"));

        let late = AppRegistry::new();
        scope.fire_app_ready(&late);
        assert_eq!(late.wallets().len(), 1);

        let legacy = AppRegistry::new();
        scope.read_legacy_registry(&legacy);
        assert!(Arc::ptr_eq(&legacy.wallets()[0], &wallet));
    }

    #[test]
    fn test_failing_path_does_not_stop_others() {
        let scope = DocumentScope::new("https://dapp.example");
        scope.freeze_legacy_registry();
        scope.freeze_global("solana");

        let (_, report) = install(&scope);

        let failed: Vec<_> = report.failed.iter().map(|(step, _)| *step).collect();
        assert_eq!(
            failed,
            vec![RegistrationStep::LegacySolanaSlot, RegistrationStep::LegacyRegistry]
        );
        assert!(report.completed.contains(&RegistrationStep::DetectionFlag));
        assert!(scope.global("pluto").is_some());
        assert!(scope.flag("isPlutoWalletInjected"));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let scope = DocumentScope::new("https://dapp.example");
        let app = Arc::new(AppRegistry::new());
        scope.add_register_listener(Arc::clone(&app));

        let (first, _) = install(&scope);
        let (second, report) = install(&scope);

        assert!(report.is_complete());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(app.wallets().len(), 1);
        assert_eq!(scope.legacy_registry_len(), 1);

        let late = AppRegistry::new();
        scope.fire_app_ready(&late);
        assert_eq!(late.wallets().len(), 1);
    }

    #[test]
    fn test_reinstall_keeps_single_app_ready_listener() {
        #[derive(Default)]
        struct CountingApi {
            registrations: Mutex<usize>,
        }

        impl WalletsApi for CountingApi {
            fn register(&self, _wallet: Arc<PageWallet>) {
                *self.registrations.lock() += 1;
            }
        }

        let scope = DocumentScope::new("https://dapp.example");
        install(&scope);
        install(&scope);
        install(&scope);

        let late = CountingApi::default();
        scope.fire_app_ready(&late);
        assert_eq!(*late.registrations.lock(), 1);
    }

    #[test]
    fn test_teardown_detaches_document() {
        let scope = DocumentScope::new("https://dapp.example");
        install(&scope);

        scope.teardown();

        assert!(scope.global("solana").is_none());
        assert!(!scope.flag("isPlutoWalletInjected"));
        assert!(scope.wallet().is_none());
        assert!(matches!(
            scope.install(&BridgeConfig::default(), Arc::new(NullTransport)),
            Err(RegistrationError::Detached)
        ));
    }
}
