//! Bridges a host wallet into web pages through the wallet-standard discovery
//! convention.
//!
//! The page side ([`page::PageWallet`]) and the host side ([`bridge::BridgeRouter`])
//! exchange JSON messages over whatever boundary the embedding provides.

pub mod bridge;
pub mod config;
pub mod correlator;
pub mod error;
pub mod inject;
pub mod page;
pub mod signing;
pub mod storage;
pub mod wallet;

pub use config::BridgeConfig;
pub use error::BridgeError;

/// Installs the platform logger. Safe to call more than once.
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("pluto-bridge"),
        );
    }
    #[cfg(not(target_os = "android"))]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
