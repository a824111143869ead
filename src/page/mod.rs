//! Everything that lives in the document: the wallet object page scripts talk to and
//! the discovery surfaces that announce it.

pub mod account;
pub mod events;
pub mod registry;
pub mod standard;
pub mod wallet;

pub use account::WalletAccount;
pub use events::{ChangeEvent, Listener};
pub use registry::{register_wallet, DocumentScope, RegistrationReport};
pub use wallet::{Delivery, PageTransport, PageWallet, WalletState};
