use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

use crate::bridge::handler::BridgeRouter;
use crate::bridge::host::{ConfirmationUi, LogNotifier, Notifier, PageChannel};
use crate::bridge::prompt::ConfirmationPrompt;
use crate::bridge::protocol::RequestId;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::signing::SigningProvider;

/// Frame type used to hand a script to peers that can evaluate it.
pub const INJECT_SCRIPT_FRAME: &str = "WALLET_INJECT_SCRIPT";

/// Outbound half of one WebSocket connection.
struct SocketPage {
    outbound: mpsc::UnboundedSender<Message>,
}

impl PageChannel for SocketPage {
    fn deliver(&self, message: String) -> Result<(), BridgeError> {
        self.outbound
            .send(Message::Text(message))
            .map_err(|_| BridgeError::Transport("connection closed".to_string()))
    }

    fn inject_script(&self, script: String) -> Result<(), BridgeError> {
        let frame = json!({ "type": INJECT_SCRIPT_FRAME, "script": script }).to_string();
        self.deliver(frame)
    }
}

/// Loopback WebSocket transport. Every connection is one document with its own router.
pub struct BridgeServer {
    config: BridgeConfig,
    provider: Arc<dyn SigningProvider>,
    ui: Arc<dyn ConfirmationUi>,
    notifier: Arc<dyn Notifier>,
    sessions: Mutex<HashMap<u64, Arc<BridgeRouter>>>,
    next_session: AtomicU64,
    enabled: AtomicBool,
}

impl BridgeServer {
    pub fn new(config: BridgeConfig, provider: Arc<dyn SigningProvider>) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            config,
            provider,
            ui: Arc::new(LogNotifier),
            notifier: Arc::new(LogNotifier),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            enabled,
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

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr: SocketAddr = format!("127.0.0.1:{}", self.config.listen_port).parse()?;
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        log::info!("🌉 Wallet bridge running on ws://{}", listener.local_addr()?);
        Ok(listener)
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            log::error!("❌ Error handling connection from {}: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("❌ Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Prompts waiting across every open connection, oldest first.
    pub fn pending_prompts(&self) -> Vec<ConfirmationPrompt> {
        let routers: Vec<_> = self.sessions.lock().values().cloned().collect();
        let mut prompts: Vec<_> = routers.iter().flat_map(|r| r.pending_prompts()).collect();
        prompts.sort_by_key(|p| p.id);
        prompts
    }

    /// Routes a decision to whichever connection owns the prompt.
    pub fn decide(&self, prompt_id: RequestId, approve: bool) -> Result<(), BridgeError> {
        let routers: Vec<_> = self.sessions.lock().values().cloned().collect();
        let owner = routers
            .into_iter()
            .find(|router| router.pending_prompts().iter().any(|p| p.id == prompt_id))
            .ok_or(BridgeError::PromptNotFound(prompt_id.0))?;
        if approve {
            owner.approve(prompt_id)
        } else {
            owner.reject(prompt_id)
        }
    }

    /// Applies to open connections and to every one accepted later.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        for router in self.sessions.lock().values() {
            router.set_enabled(enabled);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    async fn handle_connection(&self, stream: TcpStream) -> anyhow::Result<()> {
        let mut origin = None;
        let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            origin = request
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(response)
        })
        .await?;
        let origin = origin.unwrap_or_else(|| "unknown".to_string());
        let (mut write, mut read) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let page = Arc::new(SocketPage {
            outbound: outbound.clone(),
        });
        let router = Arc::new(
            BridgeRouter::new(self.config.clone(), origin.clone(), Arc::clone(&self.provider), page)
                .with_confirmation_ui(Arc::clone(&self.ui))
                .with_notifier(Arc::clone(&self.notifier)),
        );
        if !self.enabled.load(Ordering::Relaxed) {
            router.set_enabled(false);
        }
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(session, Arc::clone(&router));
        log::info!("🔌 Page connected from {} (session {})", origin, session);

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => router.handle_frame(&text).await,
                Ok(Message::Close(_)) => {
                    break;
                }
                Ok(Message::Ping(data)) => {
                    let _ = outbound.send(Message::Pong(data));
                }
                Err(e) => {
                    log::warn!("⚠️  WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        self.sessions.lock().remove(&session);
        router.disconnect_page();
        drop(outbound);
        writer.abort();
        log::info!("👋 Page session {} closed", session);
        Ok(())
    }
}
