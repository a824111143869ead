use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::payload::WirePayload;
use crate::bridge::protocol::{
    BridgeMessage, ConnectInput, HostNotification, InboundMessage, MessageInput, OperationPayload,
    OperationTag, RequestId, ResponseBody, SendTransactionInput, SignInRequest, TransactionInput,
};
use crate::bridge::BridgeResponse;
use crate::config::{BridgeConfig, WalletIdentity};
use crate::correlator::{Correlator, PendingRequest};
use crate::error::BridgeError;
use crate::page::account::WalletAccount;
use crate::page::events::{ChangeEvent, EventEmitter, Listener};
use crate::page::standard::*;

/// Outbound half of the boundary as seen from the document
/// (`window.ReactNativeWebView.postMessage` in a real WebView).
pub trait PageTransport: Send + Sync {
    fn post_message(&self, message: String) -> Result<(), BridgeError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletState {
    pub connected: bool,
    pub connecting: bool,
    pub account: Option<WalletAccount>,
}

impl WalletState {
    pub fn accounts(&self) -> Vec<WalletAccount> {
        self.account.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutput {
    pub accounts: Vec<WalletAccount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignTransactionOutput {
    pub signed_transaction: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignAndSendTransactionOutput {
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignMessageOutput {
    pub signed_message: WirePayload,
    pub signature: Value,
}

/// One entry of the capability map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDescriptor {
    pub id: String,
    pub version: Option<&'static str>,
    pub supported_transaction_versions: Vec<&'static str>,
}

/// What happened to an inbound message handed to [`PageWallet::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Resolved(RequestId),
    /// A response nobody waits for any more (timed out or abandoned).
    Stale,
    HostDisconnected,
    Ignored,
}

/// Handle returned by [`PageWallet::on`].
#[derive(Clone)]
pub struct Subscription {
    event: String,
    listener: Listener,
}

impl Subscription {
    pub fn unsubscribe(&self, wallet: &PageWallet) {
        wallet.off(&self.event, &self.listener);
    }
}

/// Wallet object living in the document, speaking wallet-standard to page code and
/// the bridge protocol to the host.
pub struct PageWallet {
    identity: WalletIdentity,
    state: Mutex<WalletState>,
    events: EventEmitter,
    requests: Correlator<BridgeResponse>,
    transport: Arc<dyn PageTransport>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl PageWallet {
    pub fn new(config: &BridgeConfig, transport: Arc<dyn PageTransport>) -> Self {
        Self {
            identity: config.wallet.clone(),
            state: Mutex::new(WalletState::default()),
            events: EventEmitter::new(),
            requests: Correlator::new(),
            transport,
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Seeds the state the host already knows about, as a re-injection does.
    pub fn with_host_state(self, address: Option<&str>, connected: bool) -> Self {
        {
            let mut state = self.state.lock();
            state.account = address.map(|a| self.account_for(a));
            state.connected = connected && state.account.is_some();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn icon(&self) -> &str {
        &self.identity.icon
    }

    pub fn version(&self) -> &'static str {
        WALLET_VERSION
    }

    pub fn chains(&self) -> Vec<&'static str> {
        SOLANA_CHAINS.to_vec()
    }

    pub fn accounts(&self) -> Vec<WalletAccount> {
        self.state.lock().accounts()
    }

    pub fn state(&self) -> WalletState {
        self.state.lock().clone()
    }

    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.requests.pending()
    }

    /// The capability map advertised through wallet-standard.
    pub fn features(&self) -> Vec<FeatureDescriptor> {
        let plain = |id: &str| FeatureDescriptor {
            id: id.to_string(),
            version: Some(FEATURE_VERSION),
            supported_transaction_versions: Vec::new(),
        };
        let transactional = |id: &str| FeatureDescriptor {
            supported_transaction_versions: SUPPORTED_TRANSACTION_VERSIONS.to_vec(),
            ..plain(id)
        };

        vec![
            plain(STANDARD_CONNECT),
            plain(STANDARD_DISCONNECT),
            plain(STANDARD_EVENTS),
            transactional(SOLANA_SIGN_AND_SEND_TRANSACTION),
            transactional(SOLANA_SIGN_TRANSACTION),
            plain(SOLANA_SIGN_MESSAGE),
            plain(SOLANA_SIGN_IN),
            FeatureDescriptor {
                id: self.identity.feature_namespace(),
                version: None,
                supported_transaction_versions: Vec::new(),
            },
        ]
    }

    pub fn on(&self, event: &str, listener: Listener) -> Subscription {
        self.events.on(event, Arc::clone(&listener));
        Subscription {
            event: event.to_string(),
            listener,
        }
    }

    pub fn off(&self, event: &str, listener: &Listener) {
        self.events.off(event, listener);
    }

    /// `standard:connect`. Already connected wallets answer from local state.
    pub async fn connect(&self, input: ConnectInput) -> Result<ConnectOutput, BridgeError> {
        {
            let mut state = self.state.lock();
            if state.connected && state.account.is_some() {
                return Ok(ConnectOutput {
                    accounts: state.accounts(),
                });
            }
            state.connecting = true;
        }
        log::info!("🔗 Wallet connect requested, silent: {:?}", input.silent);
        let mut attempt = ConnectAttempt {
            wallet: self,
            settled: false,
        };

        let outcome = self
            .round_trip(OperationPayload::Connect(input), self.connect_timeout)
            .await;

        let public_key = match outcome {
            Ok(ResponseBody::Connected { public_key }) => public_key,
            Ok(ResponseBody::Failed { error }) => return Err(BridgeError::ConnectionRejected(error)),
            Ok(_) => {
                return Err(BridgeError::ConnectionRejected(
                    OperationTag::Connect.default_failure().to_string(),
                ))
            }
            Err(BridgeError::RequestTimeout(_)) => return Err(BridgeError::ConnectionTimeout),
            Err(e) => return Err(e),
        };

        attempt.settled = true;
        let accounts = {
            let mut state = self.state.lock();
            let stale = state
                .account
                .as_ref()
                .map_or(true, |account| account.address() != public_key);
            if stale {
                state.account = Some(self.account_for(&public_key));
            }
            state.connecting = false;
            state.connected = true;
            state.accounts()
        };

        log::info!("✅ Wallet connected: {}", public_key);
        self.events.emit(CHANGE_EVENT, &ChangeEvent { accounts: accounts.clone() });
        Ok(ConnectOutput { accounts })
    }

    /// `standard:disconnect`. Local and immediate; the host is told but not awaited.
    pub fn disconnect(&self) {
        log::info!("👋 Wallet disconnect requested");
        self.disconnect_locally();

        let message = BridgeMessage::new(crate::correlator::next_request_id(), OperationPayload::Disconnect);
        if let Err(e) = message.encode().and_then(|raw| self.transport.post_message(raw)) {
            log::warn!("⚠️  Could not notify host of disconnect: {}", e);
        }
    }

    pub async fn sign_transaction(
        &self,
        input: TransactionInput,
    ) -> Result<SignTransactionOutput, BridgeError> {
        let tag = OperationTag::SignTransaction;
        match self
            .round_trip(OperationPayload::SignTransaction(input), self.request_timeout)
            .await?
        {
            ResponseBody::TransactionSigned { signed_transaction } => {
                Ok(SignTransactionOutput { signed_transaction })
            }
            other => Err(rejection(tag, other)),
        }
    }

    pub async fn sign_and_send_transaction(
        &self,
        input: SendTransactionInput,
    ) -> Result<SignAndSendTransactionOutput, BridgeError> {
        let tag = OperationTag::SignAndSendTransaction;
        match self
            .round_trip(OperationPayload::SignAndSendTransaction(input), self.request_timeout)
            .await?
        {
            ResponseBody::TransactionSent { signature } => {
                Ok(SignAndSendTransactionOutput { signature })
            }
            other => Err(rejection(tag, other)),
        }
    }

    pub async fn sign_message(&self, input: MessageInput) -> Result<SignMessageOutput, BridgeError> {
        let tag = OperationTag::SignMessage;
        let signed_message = input.message.clone();
        match self
            .round_trip(OperationPayload::SignMessage(input), self.request_timeout)
            .await?
        {
            ResponseBody::MessageSigned { signature } => Ok(SignMessageOutput {
                signed_message,
                signature,
            }),
            other => Err(rejection(tag, other)),
        }
    }

    /// `solana:signIn`. The input is opaque and forwarded unchanged.
    pub async fn sign_in(&self, input: Value) -> Result<Value, BridgeError> {
        let tag = OperationTag::SignIn;
        match self
            .round_trip(OperationPayload::SignIn(SignInRequest { input }), self.request_timeout)
            .await?
        {
            ResponseBody::SignedIn { output } => Ok(output),
            other => Err(rejection(tag, other)),
        }
    }

    /// Inbound half of the boundary: every host → document message lands here.
    pub fn deliver(&self, raw: &str) -> Delivery {
        let message = match InboundMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Ignoring non-protocol message: {}", e);
                return Delivery::Ignored;
            }
        };

        match message {
            InboundMessage::Notification(HostNotification::Disconnected) => {
                log::info!("👋 Host ended the session");
                self.disconnect_locally();
                Delivery::HostDisconnected
            }
            InboundMessage::Response(response) => {
                let (id, tag) = (response.id, response.tag);
                match self.requests.resolve(id, tag, response) {
                    Ok(id) => Delivery::Resolved(id),
                    Err(_) => {
                        log::debug!("Dropping stale {} response", tag.response_type());
                        Delivery::Stale
                    }
                }
            }
        }
    }

    /// Called when the document goes away: pending calls fail, listeners are dropped.
    pub fn teardown(&self) {
        let abandoned = self.requests.abandon_all();
        if abandoned > 0 {
            log::info!("🧹 Abandoned {} in-flight wallet requests", abandoned);
        }
        self.events.clear();
    }

    async fn round_trip(
        &self,
        payload: OperationPayload,
        limit: Duration,
    ) -> Result<ResponseBody, BridgeError> {
        let tag = payload.tag();
        let (id, receiver) = self.requests.register(tag);
        // Cancelled on every exit, including the caller dropping this future.
        let _waiter = WaiterGuard {
            requests: &self.requests,
            id,
        };

        BridgeMessage::new(id, payload)
            .encode()
            .and_then(|raw| self.transport.post_message(raw))?;

        match tokio::time::timeout(limit, receiver).await {
            Ok(Ok(response)) => Ok(response.body),
            Ok(Err(_)) => Err(BridgeError::Abandoned),
            Err(_) => {
                log::warn!("⏱️  {} {} timed out after {:?}", tag, id, limit);
                Err(BridgeError::RequestTimeout(tag))
            }
        }
    }

    fn disconnect_locally(&self) {
        self.requests.abandon_all();
        {
            let mut state = self.state.lock();
            state.connected = false;
            state.connecting = false;
            state.account = None;
        }
        self.events.emit(CHANGE_EVENT, &ChangeEvent { accounts: Vec::new() });
    }

    fn connect_failed(&self) {
        let mut state = self.state.lock();
        state.connecting = false;
        state.connected = false;
    }

    fn account_for(&self, address: &str) -> WalletAccount {
        WalletAccount::new(address, &self.identity.account_label, &self.identity.icon)
    }
}

/// Forgets a pending request once its caller stops waiting.
struct WaiterGuard<'a> {
    requests: &'a Correlator<BridgeResponse>,
    id: RequestId,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.requests.cancel(self.id);
    }
}

/// Clears `connecting` unless the connect went through.
struct ConnectAttempt<'a> {
    wallet: &'a PageWallet,
    settled: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.wallet.connect_failed();
        }
    }
}

fn rejection(tag: OperationTag, body: ResponseBody) -> BridgeError {
    match body {
        ResponseBody::Failed { error } => BridgeError::SigningRejected(error),
        _ => BridgeError::SigningRejected(format!("Malformed {} response", tag.label())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelTransport(mpsc::UnboundedSender<String>);

    impl PageTransport for ChannelTransport {
        fn post_message(&self, message: String) -> Result<(), BridgeError> {
            self.0
                .send(message)
                .map_err(|e| BridgeError::Transport(e.to_string()))
        }
    }

    fn wallet_with_outbox() -> (Arc<PageWallet>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(ChannelTransport(tx)));
        (Arc::new(wallet), rx)
    }

    fn change_counter(wallet: &PageWallet) -> Arc<Mutex<Vec<usize>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        wallet.on(CHANGE_EVENT, Arc::new(move |e: &ChangeEvent| sink.lock().push(e.accounts.len())));
        seen
    }

    async fn next_request(outbox: &mut mpsc::UnboundedReceiver<String>) -> BridgeMessage {
        BridgeMessage::decode(&outbox.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_connect_success_builds_account_and_emits_change() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let changes = change_counter(&wallet);

        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.connect(ConnectInput { silent: Some(false) }).await }
        });

        let request = next_request(&mut outbox).await;
        assert_eq!(request.tag(), OperationTag::Connect);
        assert!(wallet.state().connecting);

        let response = BridgeResponse::new(
            request.id,
            OperationTag::Connect,
            ResponseBody::Connected { public_key: "Addr1".into() },
        );
        assert_eq!(wallet.deliver(&response.encode()), Delivery::Resolved(request.id.unwrap()));

        let output = task.await.unwrap().unwrap();
        assert_eq!(output.accounts.len(), 1);
        assert_eq!(output.accounts[0].address(), "Addr1");
        assert_eq!(wallet.accounts(), output.accounts);
        assert_eq!(*changes.lock(), vec![1]);

        let state = wallet.state();
        assert!(state.connected && !state.connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out_and_ignores_late_reply() {
        let (wallet, mut outbox) = wallet_with_outbox();

        let err = wallet.connect(ConnectInput::default()).await.unwrap_err();
        assert_eq!(err, BridgeError::ConnectionTimeout);
        assert_eq!(wallet.pending_requests().len(), 0);
        assert_eq!(wallet.state(), WalletState::default());

        let request = next_request(&mut outbox).await;
        let late = BridgeResponse::new(
            request.id,
            OperationTag::Connect,
            ResponseBody::Connected { public_key: "Addr1".into() },
        );
        assert_eq!(wallet.deliver(&late.encode()), Delivery::Stale);
        assert!(wallet.accounts().is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejected_returns_to_disconnected() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.connect(ConnectInput::default()).await }
        });

        let request = next_request(&mut outbox).await;
        wallet.deliver(&BridgeResponse::failure(request.id, OperationTag::Connect, "No wallet").encode());

        assert_eq!(
            task.await.unwrap().unwrap_err(),
            BridgeError::ConnectionRejected("No wallet".into())
        );
        assert!(!wallet.state().connecting);
    }

    #[tokio::test]
    async fn test_signing_failure_carries_host_error() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.sign_message(MessageInput { message: "hello".into() }).await }
        });

        let request = next_request(&mut outbox).await;
        wallet.deliver(
            &BridgeResponse::failure(request.id, OperationTag::SignMessage, "User cancelled").encode(),
        );

        assert_eq!(
            task.await.unwrap().unwrap_err(),
            BridgeError::SigningRejected("User cancelled".into())
        );
    }

    #[tokio::test]
    async fn test_concurrent_same_capability_calls_stay_separate() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let first = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.sign_message(MessageInput { message: "one".into() }).await }
        });
        let first_request = next_request(&mut outbox).await;
        let second = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.sign_message(MessageInput { message: "two".into() }).await }
        });
        let second_request = next_request(&mut outbox).await;

        // Answer out of order.
        for (request, sig) in [(&second_request, "sig-two"), (&first_request, "sig-one")] {
            let response = BridgeResponse::new(
                request.id,
                OperationTag::SignMessage,
                ResponseBody::MessageSigned { signature: Value::from(sig) },
            );
            wallet.deliver(&response.encode());
        }

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.signed_message, WirePayload::from("one"));
        assert_eq!(first.signature, Value::from("sig-one"));
        assert_eq!(second.signature, Value::from("sig-two"));
    }

    #[tokio::test]
    async fn test_disconnect_is_local_and_emits_once() {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(ChannelTransport(tx)))
            .with_host_state(Some("Addr1"), true);
        let changes = change_counter(&wallet);

        wallet.disconnect();

        assert_eq!(wallet.state(), WalletState::default());
        assert_eq!(*changes.lock(), vec![0]);
        assert_eq!(next_request(&mut outbox).await.tag(), OperationTag::Disconnect);
    }

    #[tokio::test]
    async fn test_disconnect_abandons_in_flight_calls() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.sign_in(serde_json::json!({ "domain": "example.com" })).await }
        });
        next_request(&mut outbox).await;

        wallet.disconnect();

        assert_eq!(task.await.unwrap().unwrap_err(), BridgeError::Abandoned);
    }

    #[tokio::test]
    async fn test_host_disconnect_notification() {
        let (tx, _outbox) = mpsc::unbounded_channel();
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(ChannelTransport(tx)))
            .with_host_state(Some("Addr1"), true);

        let delivery = wallet.deliver(&HostNotification::Disconnected.encode());

        assert_eq!(delivery, Delivery::HostDisconnected);
        assert!(!wallet.state().connected);
    }

    #[tokio::test]
    async fn test_dropped_connect_leaves_no_trace() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            async move { wallet.connect(ConnectInput::default()).await }
        });
        let request = next_request(&mut outbox).await;
        assert_eq!(wallet.pending_requests().len(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(wallet.state(), WalletState::default());
        assert!(wallet.pending_requests().is_empty());
        let late = BridgeResponse::new(
            request.id,
            OperationTag::Connect,
            ResponseBody::Connected { public_key: "Addr1".into() },
        );
        assert_eq!(wallet.deliver(&late.encode()), Delivery::Stale);
    }

    #[tokio::test]
    async fn test_dropped_signing_call_is_forgotten() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let call = {
            let wallet = Arc::clone(&wallet);
            async move { wallet.sign_message(MessageInput { message: "hello".into() }).await }
        };

        let outcome = tokio::time::timeout(Duration::from_millis(10), call).await;

        assert!(outcome.is_err());
        assert_eq!(next_request(&mut outbox).await.tag(), OperationTag::SignMessage);
        assert!(wallet.pending_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_times_out_after_request_limit() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let started = tokio::time::Instant::now();

        let err = wallet
            .sign_message(MessageInput { message: "hello".into() })
            .await
            .unwrap_err();

        assert_eq!(err, BridgeError::RequestTimeout(OperationTag::SignMessage));
        assert!(started.elapsed() >= Duration::from_secs(300));
        assert!(wallet.pending_requests().is_empty());
        assert_eq!(next_request(&mut outbox).await.tag(), OperationTag::SignMessage);
    }

    #[tokio::test]
    async fn test_sign_in_returns_host_output() {
        let (wallet, mut outbox) = wallet_with_outbox();
        let input = serde_json::json!({ "domain": "example.com", "nonce": "abc" });
        let task = tokio::spawn({
            let wallet = Arc::clone(&wallet);
            let input = input.clone();
            async move { wallet.sign_in(input).await }
        });

        let request = next_request(&mut outbox).await;
        match &request.payload {
            OperationPayload::SignIn(forwarded) => assert_eq!(forwarded.input, input),
            other => panic!("unexpected payload {:?}", other),
        }
        let output = serde_json::json!({
            "account": { "address": "Addr1" },
            "signedMessage": [104, 105],
            "signature": "sig",
        });
        let response = BridgeResponse::new(
            request.id,
            OperationTag::SignIn,
            ResponseBody::SignedIn { output: output.clone() },
        );
        wallet.deliver(&response.encode());

        assert_eq!(task.await.unwrap().unwrap(), output);
        assert!(wallet.pending_requests().is_empty());
    }

    #[test]
    fn test_capability_map_has_unique_ids() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(ChannelTransport(tx)));
        let features = wallet.features();
        let mut ids: Vec<_> = features.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), features.len());
        assert!(ids.contains(&"pluto:".to_string()));
        assert!(ids.contains(&STANDARD_CONNECT.to_string()));
    }

    #[test]
    fn test_unrelated_traffic_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(ChannelTransport(tx)));
        assert_eq!(wallet.deliver("not json"), Delivery::Ignored);
        assert_eq!(wallet.deliver(r#"{"type":"WALLET_CONNECT","data":{}}"#), Delivery::Ignored);
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_immediately() {
        struct Closed;
        impl PageTransport for Closed {
            fn post_message(&self, _message: String) -> Result<(), BridgeError> {
                Err(BridgeError::Transport("host unavailable".into()))
            }
        }
        let wallet = PageWallet::new(&BridgeConfig::default(), Arc::new(Closed));

        let err = wallet
            .sign_transaction(TransactionInput { transaction: "abc".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(wallet.pending_requests().is_empty());
    }
}
