use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::bridge::host::{ConfirmationUi, LogNotifier, Notifier, PageChannel};
use crate::bridge::payload::WirePayload;
use crate::bridge::prompt::{ConfirmationPrompt, Decision, PromptView};
use crate::bridge::protocol::{
    BridgeMessage, BridgeResponse, HostNotification, OperationPayload, OperationTag, RequestId,
    ResponseBody,
};
use crate::bridge::sign_in::{origin_domain, SignInInput};
use crate::config::BridgeConfig;
use crate::correlator::Correlator;
use crate::error::BridgeError;
use crate::inject;
use crate::signing::{ProviderRequest, SigningProvider};

/// Host side of one document: decodes what the page sends, asks the user where
/// needed, and answers with a correlated response.
pub struct BridgeRouter {
    config: BridgeConfig,
    origin: String,
    provider: Arc<dyn SigningProvider>,
    page: Arc<dyn PageChannel>,
    ui: Arc<dyn ConfirmationUi>,
    notifier: Arc<dyn Notifier>,
    decisions: Correlator<Decision>,
    prompts: Mutex<HashMap<RequestId, ConfirmationPrompt>>,
    connected_account: Mutex<Option<String>>,
    enabled: AtomicBool,
    /// Bumped per scheduled re-injection; only the newest one runs.
    reinjections: Arc<AtomicU64>,
}

impl BridgeRouter {
    pub fn new(
        config: BridgeConfig,
        origin: impl Into<String>,
        provider: Arc<dyn SigningProvider>,
        page: Arc<dyn PageChannel>,
    ) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            config,
            origin: origin.into(),
            provider,
            page,
            ui: Arc::new(LogNotifier),
            notifier: Arc::new(LogNotifier),
            decisions: Correlator::new(),
            prompts: Mutex::new(HashMap::new()),
            connected_account: Mutex::new(None),
            enabled,
            reinjections: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_confirmation_ui(mut self, ui: Arc<dyn ConfirmationUi>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        log::info!("🔌 Bridge: Enabled set to {}", enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn connected_account(&self) -> Option<String> {
        self.connected_account.lock().clone()
    }

    /// Prompts still waiting for a decision, oldest first.
    pub fn pending_prompts(&self) -> Vec<ConfirmationPrompt> {
        let mut prompts: Vec<_> = self.prompts.lock().values().cloned().collect();
        prompts.sort_by_key(|p| p.id);
        prompts
    }

    pub fn approve(&self, id: RequestId) -> Result<(), BridgeError> {
        self.decide(id, Decision::Approved)
    }

    pub fn reject(&self, id: RequestId) -> Result<(), BridgeError> {
        self.decide(id, Decision::Rejected)
    }

    fn decide(&self, id: RequestId, decision: Decision) -> Result<(), BridgeError> {
        let tag = {
            let mut prompts = self.prompts.lock();
            let prompt = prompts.get_mut(&id).ok_or(BridgeError::PromptNotFound(id.0))?;
            prompt.decision = decision;
            prompt.request.tag()
        };
        self.decisions
            .resolve(Some(id), tag, decision)
            .map(|_| ())
            .map_err(|_| BridgeError::PromptNotFound(id.0))
    }

    /// Host-initiated disconnect: tells the page, drops every open prompt.
    pub fn disconnect_page(&self) {
        log::info!("👋 Bridge: Disconnecting {}", self.origin);
        self.connected_account.lock().take();
        let dropped = self.decisions.abandon_all();
        if dropped > 0 {
            log::info!("🧹 Bridge: Dropped {} open prompts", dropped);
        }
        if let Err(e) = self.page.deliver(HostNotification::Disconnected.encode()) {
            log::warn!("⚠️  Bridge: Could not notify page of disconnect: {}", e);
        }
        self.schedule_reinjection(None);
    }

    /// Entry point for raw traffic from the page. Anything that is not a bridge
    /// message is debug output and only logged.
    pub async fn handle_raw(&self, raw: &str) -> Option<BridgeResponse> {
        match BridgeMessage::decode(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                log::debug!("📜 Page: {} ({})", raw, e);
                None
            }
        }
    }

    /// Handles one frame of an ordered stream. Frames are processed in arrival order;
    /// only the wait for a human decision continues on its own task, so a later
    /// disconnect can never overtake an earlier connect.
    pub async fn handle_frame(self: &Arc<Self>, raw: &str) {
        let message = match BridgeMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("📜 Page: {} ({})", raw, e);
                return;
            }
        };

        if !(self.is_enabled() && message.tag().requires_confirmation()) {
            self.handle_message(message).await;
            return;
        }

        match self.open_prompt(&message).await {
            Ok(prompt) => {
                let router = Arc::clone(self);
                tokio::spawn(async move {
                    let response = router.await_decision(&message, prompt).await;
                    router.send(&response);
                });
            }
            Err(response) => self.send(&response),
        }
    }

    /// Dispatches `message` and sends the response, if the operation has one.
    pub async fn handle_message(&self, message: BridgeMessage) -> Option<BridgeResponse> {
        let tag = message.tag();
        let response = if !self.is_enabled() {
            if tag == OperationTag::Disconnect {
                None
            } else {
                let error = BridgeError::NotReady("Wallet bridge is disabled in settings.".to_string());
                Some(self.failure(&message, &error))
            }
        } else {
            match &message.payload {
                OperationPayload::Connect(_) => Some(self.connect(&message).await),
                OperationPayload::Disconnect => {
                    self.page_disconnected();
                    None
                }
                OperationPayload::SendTransaction(input) => {
                    Some(self.send_transaction_stub(&message, &input.transaction))
                }
                _ if tag.requires_confirmation() => Some(self.confirm_and_sign(&message).await),
                _ => None,
            }
        };

        if let Some(response) = &response {
            self.send(response);
        }
        response
    }

    fn send(&self, response: &BridgeResponse) {
        if let Err(e) = self.page.deliver(response.encode()) {
            log::error!("❌ Bridge: Failed to deliver {}: {}", response.tag.response_type(), e);
        }
    }

    async fn connect(&self, message: &BridgeMessage) -> BridgeResponse {
        log::info!("🔗 Bridge: Connect request from {}", self.origin);

        match self.provider.accounts().await.into_iter().next() {
            Some(address) => {
                log::info!("✅ Bridge: Connected with pubkey {}", address);
                *self.connected_account.lock() = Some(address.clone());
                self.notifier.notify("Wallet", "Connected successfully!");
                self.schedule_reinjection(Some(address.clone()));
                BridgeResponse::to(message, ResponseBody::Connected { public_key: address })
            }
            None => {
                log::warn!("⚠️  Bridge: No wallet account available");
                let error = BridgeError::NotReady("No wallet available. Please unlock your wallet first.".to_string());
                self.failure(message, &error)
            }
        }
    }

    fn page_disconnected(&self) {
        log::info!("👋 Bridge: Disconnect request from {}", self.origin);
        self.connected_account.lock().take();
        self.notifier.notify("Wallet", "Disconnected successfully!");
        self.schedule_reinjection(None);
    }

    fn send_transaction_stub(&self, message: &BridgeMessage, transaction: &WirePayload) -> BridgeResponse {
        log::info!(
            "📤 Bridge: Send transaction requested from {} ({})",
            self.origin,
            transaction.display_text()
        );
        self.notifier
            .notify("Send Transaction", "Send transaction requested from page");
        BridgeResponse::to(
            message,
            ResponseBody::Failed {
                error: "sendTransaction is not supported, use signAndSendTransaction".to_string(),
            },
        )
    }

    async fn confirm_and_sign(&self, message: &BridgeMessage) -> BridgeResponse {
        match self.open_prompt(message).await {
            Ok(prompt) => self.await_decision(message, prompt).await,
            Err(response) => response,
        }
    }

    /// Checks for an account and puts the request in front of the user.
    async fn open_prompt(&self, message: &BridgeMessage) -> Result<OpenPrompt, BridgeResponse> {
        let tag = message.tag();
        log::info!("✍️  Bridge: {} request from {}", tag.label(), self.origin);

        let Some(address) = self.provider.accounts().await.into_iter().next() else {
            let error = BridgeError::NotReady("No wallet loaded. Please unlock your wallet first.".to_string());
            return Err(self.failure(message, &error));
        };

        let (id, decision) = self.decisions.register(tag);
        let prompt = ConfirmationPrompt::new(id, self.origin.clone(), message.clone());
        let view: PromptView = prompt.view();
        self.prompts.lock().insert(id, prompt);
        self.ui.present(&view);

        Ok(OpenPrompt { id, address, decision })
    }

    async fn await_decision(&self, message: &BridgeMessage, prompt: OpenPrompt) -> BridgeResponse {
        let tag = message.tag();
        let OpenPrompt { id, address, decision } = prompt;

        let outcome = tokio::time::timeout(self.config.approval_timeout(), decision).await;
        self.prompts.lock().remove(&id);

        let decision = match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => {
                self.ui.dismiss(id);
                return self.failure(message, &BridgeError::Abandoned);
            }
            Err(_) => {
                self.decisions.cancel(id);
                self.ui.dismiss(id);
                log::warn!("⏱️  Bridge: Prompt {} expired", id);
                return self.failure(message, &BridgeError::ApprovalTimeout);
            }
        };

        if decision != Decision::Approved {
            log::info!("🚫 Bridge: {} rejected by user", tag.label());
            return BridgeResponse::to(
                message,
                ResponseBody::Failed {
                    error: BridgeError::UserRejected.to_string(),
                },
            );
        }

        match self.execute(message, &address).await {
            Ok(body) => {
                log::info!("✅ Bridge: {} completed", tag.label());
                BridgeResponse::to(message, body)
            }
            Err(e) => self.failure(message, &e),
        }
    }

    /// Runs an approved request against the collaborator.
    async fn execute(&self, message: &BridgeMessage, address: &str) -> Result<ResponseBody, BridgeError> {
        match &message.payload {
            OperationPayload::SignTransaction(input) => {
                let result = self
                    .call(ProviderRequest::SignTransaction {
                        transaction: input.transaction.clone(),
                    })
                    .await?;
                Ok(ResponseBody::TransactionSigned {
                    signed_transaction: pick(result, "signedTransaction"),
                })
            }
            OperationPayload::SignAndSendTransaction(input) => {
                let result = self
                    .call(ProviderRequest::SignAndSendTransaction {
                        transaction: input.transaction.clone(),
                        options: input.options.clone(),
                    })
                    .await?;
                match pick(result, "signature") {
                    Value::String(signature) => Ok(ResponseBody::TransactionSent { signature }),
                    other => Err(BridgeError::SigningFailed(format!(
                        "Unexpected signature from wallet: {}",
                        other
                    ))),
                }
            }
            OperationPayload::SignMessage(input) => {
                let result = self
                    .call(ProviderRequest::SignMessage {
                        message: provider_message(&input.message),
                    })
                    .await?;
                Ok(ResponseBody::MessageSigned {
                    signature: pick(result, "signature"),
                })
            }
            OperationPayload::SignIn(request) => {
                let input = SignInInput::from_value(&request.input);
                let text = input.message(address, origin_domain(&self.origin));
                let result = self
                    .call(ProviderRequest::SignMessage {
                        message: WirePayload::Text(text.clone()),
                    })
                    .await?;
                Ok(ResponseBody::SignedIn {
                    output: json!({
                        "account": {
                            "address": address,
                            "publicKey": public_key_bytes(address),
                        },
                        "signedMessage": text.as_bytes(),
                        "signature": pick(result, "signature"),
                    }),
                })
            }
            other => Err(BridgeError::SigningFailed(format!(
                "{} cannot be signed",
                other.tag().label()
            ))),
        }
    }

    async fn call(&self, request: ProviderRequest) -> Result<Value, BridgeError> {
        log::info!("🔐 Bridge: Calling wallet {}", request.method());
        self.provider
            .request(request)
            .await
            .map_err(|e| BridgeError::SigningFailed(format!("{:#}", e)))
    }

    /// Failure response plus a notice naming the operation.
    fn failure(&self, message: &BridgeMessage, error: &BridgeError) -> BridgeResponse {
        let tag = message.tag();
        log::error!("❌ Bridge: Failed to {}: {}", tag.label(), error);
        self.notifier
            .notify("Wallet Error", &format!("Failed to {}: {}", tag.label(), error));
        BridgeResponse::failure(message.id, tag, error.to_string())
    }

    /// Refreshes the in-page wallet state once the response has had time to land.
    fn schedule_reinjection(&self, address: Option<String>) {
        let script = match inject::render_bootstrap(&self.config, address.as_deref(), address.is_some()) {
            Ok(script) => script,
            Err(e) => {
                log::error!("❌ Bridge: Could not render wallet script: {}", e);
                return;
            }
        };
        let page = Arc::clone(&self.page);
        let delay = self.config.reinject_delay();
        let latest = Arc::clone(&self.reinjections);
        let generation = latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != generation {
                log::debug!("Bridge: Skipping superseded re-injection");
                return;
            }
            if let Err(e) = page.inject_script(script) {
                log::warn!("⚠️  Bridge: Re-injection failed: {}", e);
            }
        });
    }
}

/// A prompt on screen, waiting for the user.
struct OpenPrompt {
    id: RequestId,
    address: String,
    decision: oneshot::Receiver<Decision>,
}

/// Collaborators may answer with the bare value or with `{ <field>: value, .. }`.
fn pick(result: Value, field: &str) -> Value {
    match result {
        Value::Object(mut object) if object.contains_key(field) => object.remove(field).unwrap_or(Value::Null),
        other => other,
    }
}

/// Messages go to the collaborator as text when they are valid UTF-8, raw bytes otherwise.
fn provider_message(message: &WirePayload) -> WirePayload {
    match message.to_bytes() {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => WirePayload::Text(text),
            Err(e) => WirePayload::Bytes(e.into_bytes()),
        },
        None => message.clone(),
    }
}

fn public_key_bytes(address: &str) -> Vec<u8> {
    bs58::decode(address)
        .into_vec()
        .unwrap_or_else(|_| address.as_bytes().to_vec())
}
