//! Public wallet-standard names. Third-party detectors match these strings exactly.

pub const STANDARD_CONNECT: &str = "standard:connect";
pub const STANDARD_DISCONNECT: &str = "standard:disconnect";
pub const STANDARD_EVENTS: &str = "standard:events";
pub const SOLANA_SIGN_AND_SEND_TRANSACTION: &str = "solana:signAndSendTransaction";
pub const SOLANA_SIGN_TRANSACTION: &str = "solana:signTransaction";
pub const SOLANA_SIGN_MESSAGE: &str = "solana:signMessage";
pub const SOLANA_SIGN_IN: &str = "solana:signIn";

pub const FEATURE_VERSION: &str = "1.0.0";
pub const WALLET_VERSION: &str = "1.0.0";

pub const REGISTER_WALLET_EVENT: &str = "wallet-standard:register-wallet";
pub const APP_READY_EVENT: &str = "wallet-standard:app-ready";

/// Event emitted through `standard:events` whenever accounts change.
pub const CHANGE_EVENT: &str = "change";

pub const SOLANA_CHAINS: [&str; 4] = [
    "solana:mainnet",
    "solana:devnet",
    "solana:testnet",
    "solana:localnet",
];

pub const SUPPORTED_TRANSACTION_VERSIONS: [&str; 2] = ["legacy", "0"];

/// Features advertised on each account.
pub const ACCOUNT_FEATURES: [&str; 3] = [
    SOLANA_SIGN_AND_SEND_TRANSACTION,
    SOLANA_SIGN_TRANSACTION,
    SOLANA_SIGN_MESSAGE,
];

/// Legacy global slot checked by pages that predate the register-wallet event.
pub const LEGACY_SOLANA_SLOT: &str = "solana";
