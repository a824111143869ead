//! Host-side surfaces the router talks to.

use crate::bridge::prompt::PromptView;
use crate::bridge::protocol::RequestId;
use crate::error::BridgeError;
use crate::inject;

/// The document, as seen from the host.
pub trait PageChannel: Send + Sync {
    /// Dispatches a response or notification as a `message` event in the page.
    fn deliver(&self, message: String) -> Result<(), BridgeError>;

    /// Evaluates `script` in the page.
    fn inject_script(&self, script: String) -> Result<(), BridgeError>;
}

/// Page channel for hosts that can only evaluate script in the document, such as an
/// embedded WebView. Messages become a dispatched `message` event.
pub struct ScriptChannel<F> {
    evaluate: F,
}

impl<F> ScriptChannel<F>
where
    F: Fn(String) -> Result<(), BridgeError> + Send + Sync,
{
    pub fn new(evaluate: F) -> Self {
        Self { evaluate }
    }
}

impl<F> PageChannel for ScriptChannel<F>
where
    F: Fn(String) -> Result<(), BridgeError> + Send + Sync,
{
    fn deliver(&self, message: String) -> Result<(), BridgeError> {
        (self.evaluate)(inject::response_script(&message))
    }

    fn inject_script(&self, script: String) -> Result<(), BridgeError> {
        (self.evaluate)(script)
    }
}

/// Transient user-visible notice ("Signing Error", "Wallet Connected").
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

pub trait ConfirmationUi: Send + Sync {
    fn present(&self, view: &PromptView);

    /// Called when a prompt is settled without the user (timeout, disconnect).
    fn dismiss(&self, _id: RequestId) {}
}

/// Writes notices and prompts to the log. The default when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("🔔 {}: {}", title, body);
    }
}

impl ConfirmationUi for LogNotifier {
    fn present(&self, view: &PromptView) {
        log::info!("📝 {} {} from {}", view.title, view.id, view.origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_script_channel_wraps_messages_in_event_dispatch() {
        let evaluated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evaluated);
        let channel = ScriptChannel::new(move |script: String| {
            sink.lock().push(script);
            Ok(())
        });

        channel
            .deliver(r#"{"type":"WALLET_DISCONNECTED"}"#.to_string())
            .unwrap();
        channel.inject_script("window.__plutoBridge.refresh();".to_string()).unwrap();

        let evaluated = evaluated.lock();
        assert!(evaluated[0].starts_with("window.dispatchEvent(new MessageEvent('message'"));
        assert!(evaluated[0].contains(r#"\"type\":\"WALLET_DISCONNECTED\""#));
        assert_eq!(evaluated[1], "window.__plutoBridge.refresh();");
    }
}
