//! TSS Party CLI
//!
//! Command-line interface for one party of a 2-of-3 EdDSA wallet:
//! - Channel key generation
//! - Key share generation and y-share export
//! - Key combination
//! - Two-party signing through the Coordination Service

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tss_core::session::RemoteSessionClient;
use tss_core::{
    codec, combine_keys, decrypt_and_verify, encrypt_y_share, generate_key_share, ChannelKeyPair,
    ChannelPublicKey, DecryptableYShare, Ed25519Engine, EncryptedYShare, Error, GShare, KeyShare,
    MpcEngine, Role, SigningMaterial, SigningSessionCoordinator, UnsignedTx, YShare,
};
use txrequest_client::TxRequestClient;

/// TSS Party - one signer of a 2-of-3 EdDSA wallet
#[derive(Parser)]
#[command(name = "tss-party")]
#[command(about = "Threshold EdDSA party node")]
#[command(version)]
struct Cli {
    /// Coordination service URL
    #[arg(short, long, env = "TXREQUEST_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Wallet the TxRequests belong to
    #[arg(short, long, env = "WALLET_ID", default_value = "default")]
    wallet_id: String,

    /// This party's role (user, backup or bitgo)
    #[arg(short, long, env = "PARTY_ROLE")]
    role: Role,

    /// Data directory for keys and shares
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate this party's secure-channel key pair
    ChannelKeygen,

    /// Generate a key share and encrypt y-shares for the other parties.
    /// Their channel public keys must be in the data directory.
    Keygen,

    /// Print the common keychain derived from the received y-shares
    CommonKeychain,

    /// Combine the received y-shares into signing material
    Combine {
        /// Common keychain every party agreed on
        #[arg(short, long)]
        common_keychain: String,
    },

    /// Open a TxRequest for a transaction
    CreateTxRequest {
        /// Hex bytes to sign
        #[arg(long)]
        signable_hex: String,

        /// Hex serialized transaction
        #[arg(long, default_value = "")]
        serialized_tx_hex: String,
    },

    /// Run both signing rounds against a counterparty
    Sign {
        #[arg(short, long)]
        tx_request_id: String,

        /// Role signing with this party
        #[arg(short, long)]
        counterparty: Role,

        /// Non-hardened derivation path
        #[arg(short, long, default_value = tss_core::DEFAULT_DERIVATION_PATH)]
        path: String,

        /// Seconds to poll for the counterparty's r-share; 0 fetches once
        #[arg(long, default_value = "0")]
        wait: u64,

        /// Encrypted signer share forwarded with the r-share
        #[arg(long)]
        signer_share: Option<String>,
    },

    /// Combine both g-shares of a TxRequest and verify the signature
    Finalize {
        #[arg(short, long)]
        tx_request_id: String,

        /// Derivation path the session signed with
        #[arg(short, long, default_value = tss_core::DEFAULT_DERIVATION_PATH)]
        path: String,
    },

    /// Show signing material info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Ensure data directory exists
    std::fs::create_dir_all(&cli.dest)?;

    match &cli.command {
        Commands::ChannelKeygen => run_channel_keygen(&cli)?,
        Commands::Keygen => run_keygen(&cli)?,
        Commands::CommonKeychain => show_common_keychain(&cli)?,
        Commands::Combine { common_keychain } => run_combine(&cli, common_keychain)?,
        Commands::CreateTxRequest {
            signable_hex,
            serialized_tx_hex,
        } => run_create_tx_request(&cli, signable_hex, serialized_tx_hex).await?,
        Commands::Sign {
            tx_request_id,
            counterparty,
            path,
            wait,
            signer_share,
        } => {
            run_sign(
                &cli,
                tx_request_id,
                *counterparty,
                path,
                Duration::from_secs(*wait),
                signer_share.as_deref(),
            )
            .await?
        }
        Commands::Finalize {
            tx_request_id,
            path,
        } => run_finalize(&cli, tx_request_id, path).await?,
        Commands::Info => show_info(&cli)?,
    }

    Ok(())
}

fn channel_key_path(cli: &Cli, role: Role) -> PathBuf {
    cli.dest.join(format!("channel.{role}.key"))
}

fn channel_public_path(cli: &Cli, role: Role) -> PathBuf {
    cli.dest.join(format!("channel.{role}.pub"))
}

fn key_share_path(cli: &Cli) -> PathBuf {
    cli.dest.join(format!("keyshare.{}.json", cli.role))
}

fn y_share_path(cli: &Cli, from: Role, to: Role) -> PathBuf {
    cli.dest.join(format!("yshare.{from}-{to}.json"))
}

fn material_path(cli: &Cli) -> PathBuf {
    cli.dest.join(format!("material.{}.json", cli.role))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn run_channel_keygen(cli: &Cli) -> Result<()> {
    let key_pair = ChannelKeyPair::generate();
    let public_key = key_pair.public_key();

    std::fs::write(channel_key_path(cli, cli.role), key_pair.to_armored())?;
    std::fs::write(channel_public_path(cli, cli.role), public_key.to_armored())?;

    info!(role = %cli.role, fingerprint = %public_key.fingerprint(), "Channel key pair saved");
    println!("Channel key fingerprint: {}", public_key.fingerprint());

    Ok(())
}

fn run_keygen(cli: &Cli) -> Result<()> {
    let own_private = read_text(&channel_key_path(cli, cli.role))?;

    info!(role = %cli.role, "Generating key share");
    let key_share = generate_key_share(cli.role)?;

    for recipient in cli.role.others() {
        let recipient_public = read_text(&channel_public_path(cli, recipient))?;
        let encrypted = encrypt_y_share(&key_share, recipient, &own_private, &recipient_public)?;
        write_json(&y_share_path(cli, cli.role, recipient), &encrypted)?;
        info!(recipient = %recipient, "Y-share encrypted");
    }

    write_json(&key_share_path(cli), &key_share)?;
    println!("Key share saved; y-shares written for {:?}", cli.role.others());

    Ok(())
}

fn received_y_shares(cli: &Cli) -> Result<Vec<DecryptableYShare>> {
    let recipient_private = read_text(&channel_key_path(cli, cli.role))?;

    cli.role
        .others()
        .into_iter()
        .map(|sender| {
            Ok(DecryptableYShare {
                y_share: read_json::<EncryptedYShare>(&y_share_path(cli, sender, cli.role))?,
                recipient_private: recipient_private.clone(),
                sender_public: read_text(&channel_public_path(cli, sender))?,
            })
        })
        .collect()
}

fn show_common_keychain(cli: &Cli) -> Result<()> {
    let key_share: KeyShare = read_json(&key_share_path(cli))?;

    let y_shares = received_y_shares(cli)?
        .iter()
        .map(|share| {
            decrypt_and_verify(
                &share.y_share,
                &share.recipient_private,
                &share.sender_public,
            )
        })
        .collect::<tss_core::Result<Vec<YShare>>>()?;

    let combined = Ed25519Engine::new()
        .key_combine(&key_share.u_share, &y_shares.iter().collect::<Vec<_>>())?;

    println!("{}", combined.common_keychain);
    Ok(())
}

fn run_combine(cli: &Cli, common_keychain: &str) -> Result<()> {
    let key_share: KeyShare = read_json(&key_share_path(cli))?;
    let material = combine_keys(&key_share, common_keychain, &received_y_shares(cli)?)?;

    write_json(&material_path(cli), &material)?;
    info!(role = %cli.role, "Signing material saved");
    println!("Common keychain: {}", material.common_keychain);

    Ok(())
}

fn client(cli: &Cli) -> TxRequestClient {
    TxRequestClient::new(&cli.url, &cli.wallet_id)
}

async fn run_create_tx_request(
    cli: &Cli,
    signable_hex: &str,
    serialized_tx_hex: &str,
) -> Result<()> {
    let tx_request = client(cli)
        .create_tx_request(vec![UnsignedTx {
            signable_hex: signable_hex.to_string(),
            serialized_tx_hex: serialized_tx_hex.to_string(),
        }])
        .await?;

    println!("{}", tx_request.tx_request_id);
    Ok(())
}

async fn run_sign(
    cli: &Cli,
    tx_request_id: &str,
    counterparty: Role,
    path: &str,
    wait: Duration,
    signer_share: Option<&str>,
) -> Result<()> {
    let material: SigningMaterial = read_json(&material_path(cli))?;
    let coordinator = SigningSessionCoordinator::new(cli.role, counterparty, client(cli))?;

    let payload = coordinator
        .client()
        .get_tx_request(tx_request_id)
        .await?
        .signable_payload()?;

    info!(
        role = %cli.role,
        counterparty = %counterparty,
        tx_request_id,
        path,
        "Starting signing session"
    );

    let offered = coordinator
        .start_session(tx_request_id, &payload, &material, path, signer_share)
        .await?;

    let deadline = Instant::now() + wait;
    let counterparty_r_share = loop {
        match coordinator.fetch_counterparty_r_share(tx_request_id).await {
            Ok(record) => break record,
            Err(Error::NoSignatureShares(_) | Error::CounterpartyRShareNotFound { .. })
                if Instant::now() < deadline =>
            {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e.into()),
        }
    };

    let g_share = coordinator
        .complete_session(offered, &material, &counterparty_r_share, None)
        .await?;

    info!(tx_request_id, "G-share submitted");
    println!("{}", serde_json::to_string_pretty(&g_share)?);

    Ok(())
}

async fn run_finalize(cli: &Cli, tx_request_id: &str, path: &str) -> Result<()> {
    let material: SigningMaterial = read_json(&material_path(cli))?;
    let engine = Ed25519Engine::new();

    let tx_request = client(cli).get_tx_request(tx_request_id).await?;
    let payload = tx_request.signable_payload()?;

    let keychain = engine.derive_common_keychain(material.common_keychain.as_str(), path)?;
    let (y, _) = codec::decode_keychain(&keychain)?;

    // Each signer's last record is its g-share
    let mut g_shares: Vec<GShare> = Vec::new();
    for record in tx_request.signature_shares.iter().rev() {
        if g_shares.iter().any(|g| g.i == record.from) {
            continue;
        }
        let (big_r, gamma) = codec::decode_g_share(&record.share)?;
        g_shares.push(GShare {
            i: record.from,
            y,
            gamma,
            big_r,
        });
    }
    if g_shares.len() != 2 {
        bail!(
            "expected g-shares from two signers, found {}",
            g_shares.len()
        );
    }

    let signature = engine.sign_combine(&g_shares).map_err(|e| {
        warn!(tx_request_id, error = %e, "Could not combine g-shares");
        anyhow!(e)
    })?;
    engine.verify(&payload, &signature)?;

    info!(tx_request_id, "Signature verified");
    println!("Signature: {}", hex::encode(signature.to_bytes()));
    println!("Public Key: {}", hex::encode(signature.y));

    Ok(())
}

fn show_info(cli: &Cli) -> Result<()> {
    let material: SigningMaterial = read_json(&material_path(cli))?;

    println!("Signing Material Info:");
    println!("  Role: {}", material.role());
    println!("  Common Keychain: {}", material.common_keychain);
    for y_share in material.y_shares() {
        println!("  Y-share from: {}", y_share.i);
    }

    if let Ok(armored) = read_text(&channel_public_path(cli, cli.role)) {
        let public_key = ChannelPublicKey::from_armored(&armored)?;
        println!("  Channel Fingerprint: {}", public_key.fingerprint());
    }

    Ok(())
}
