//! `opflow wallet`: Connect, list and revoke wallets.

use clap::{Args, Subcommand};
use opflow_client::normalize_wallet_url;
use opflow_crypto::KeyPair;

use crate::app::App;

#[derive(Args, Debug)]
pub struct WalletArgs {
    #[command(subcommand)]
    pub command: WalletCommand,
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Run the interactive grant for a wallet and store its credentials.
    Connect(ConnectArgs),
    /// List connected wallets.
    List,
    /// Revoke the grant of a connected wallet.
    Revoke(RevokeArgs),
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Wallet address URL or payment pointer.
    #[arg(short, long)]
    pub url: String,

    /// Key ID registered with the wallet.
    #[arg(short, long)]
    pub key_id: String,

    /// Base64 encoded private key, as printed by `opflow keygen`.
    #[arg(short, long)]
    pub private_key: String,

    /// Base64 encoded public JWK. Derived from the private key when omitted.
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Wallet address URL or payment pointer.
    pub url: String,
}

pub async fn run(args: &WalletArgs, app: &App) -> anyhow::Result<()> {
    match &args.command {
        WalletCommand::Connect(args) => connect(args, app).await,
        WalletCommand::List => list(app),
        WalletCommand::Revoke(args) => revoke(args, app).await,
    }
}

async fn connect(args: &ConnectArgs, app: &App) -> anyhow::Result<()> {
    let public_key = match &args.public_key {
        Some(key) => key.clone(),
        None => KeyPair::from_encoded_private_key(&args.private_key)?
            .public_key()
            .to_jwk(&args.key_id)
            .encode()?,
    };

    let url = normalize_wallet_url(&args.url);
    println!("Connecting {}...", url);
    println!("Approve the grant in the browser window that opens.");

    let wallet = app
        .payments()
        .try_connect_wallet(&url, &args.key_id, &args.private_key, &public_key)
        .await?;

    println!("Wallet connected!");
    println!("  ID:       {}", wallet.id);
    println!("  URL:      {}", wallet.url);
    println!("  Key ID:   {}", wallet.key_id);
    Ok(())
}

fn list(app: &App) -> anyhow::Result<()> {
    let wallets = app.store().list_wallets()?;
    if wallets.is_empty() {
        println!("No wallets connected. Connect one with: opflow wallet connect");
        return Ok(());
    }

    println!("{} wallet(s):", wallets.len());
    for wallet in wallets {
        println!("  {}  {}  (key {})", wallet.id, wallet.url, wallet.key_id);
    }
    Ok(())
}

async fn revoke(args: &RevokeArgs, app: &App) -> anyhow::Result<()> {
    app.payments().revoke_grant(&args.url).await?;
    println!("Grant revoked for {}", normalize_wallet_url(&args.url));
    Ok(())
}
