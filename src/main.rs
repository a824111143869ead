use std::sync::Arc;

use pluto_wallet_bridge::bridge::BridgeServer;
use pluto_wallet_bridge::signing::{LocalSigner, RpcSender};
use pluto_wallet_bridge::{init_logging, storage, BridgeConfig};

mod console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(path)?,
        None => {
            let config = BridgeConfig::from_env();
            config.validate()?;
            config
        }
    };

    let wallet = storage::load_or_create_wallet(&storage::keypair_path(), &config.wallet.account_label)?;
    log::info!("👛 Bridge account: {}", wallet.address());

    let mut signer = LocalSigner::new(wallet);
    match &config.rpc_url {
        Some(rpc_url) => signer = signer.with_sender(Arc::new(RpcSender::new(rpc_url.clone()))),
        None => log::warn!("⚠️  No RPC endpoint configured, signAndSendTransaction will fail"),
    }

    let server = Arc::new(
        BridgeServer::new(config, Arc::new(signer)).with_confirmation_ui(Arc::new(console::TerminalUi)),
    );
    let listener = server.bind().await?;
    let serving = tokio::spawn(Arc::clone(&server).serve(listener));

    console::run(server).await?;
    serving.abort();
    log::info!("👋 Bridge stopped");
    Ok(())
}
