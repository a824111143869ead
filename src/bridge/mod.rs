pub mod handler;
pub mod host;
pub mod payload;
pub mod prompt;
pub mod protocol;
pub mod server;
pub mod sign_in;

pub use handler::BridgeRouter;
pub use host::{ConfirmationUi, LogNotifier, Notifier, PageChannel, ScriptChannel};
pub use payload::WirePayload;
pub use prompt::{ConfirmationPrompt, Decision, PromptBody, PromptView, TxPreview};
pub use protocol::{BridgeMessage, BridgeResponse, OperationPayload, OperationTag, RequestId, ResponseBody};
pub use server::BridgeServer;
