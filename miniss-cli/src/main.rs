#![forbid(unsafe_code)]

//! MiniSS command line tool.
//!
//! Implements `keygen`, `serve` (secure echo server) and `proxy` (plaintext
//! listener forwarding through a secure channel) subcommands.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use miniss_core::MinissConfig;
use miniss_crypto::{keystore, PublicKey, StaticKeyPair};
use miniss_stream::{handshake_with_config, HandshakeConfig};
use std::path::{Path, PathBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod relay;

/// Environment variable consulted before prompting for a keystore passphrase.
const PASSPHRASE_ENV: &str = "MINISS_PASSPHRASE";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// age-encrypted static key (overrides `keystore_path`)
    #[arg(short, long)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new static key and store it encrypted
    Keygen {
        /// Output path for the keystore file
        #[arg(short, long)]
        out: PathBuf,
        /// Overwrite an existing keystore
        #[arg(long)]
        force: bool,
    },
    /// Accept secure channels and echo everything back
    Serve {
        /// Listen address (overrides `listen_addr`)
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Accept plaintext TCP clients and forward them through a secure channel
    Proxy {
        /// Plaintext listen address (overrides `listen_addr`)
        #[arg(short, long)]
        listen: Option<String>,
        /// Remote MiniSS endpoint (overrides `connect_addr`)
        #[arg(short = 'r', long)]
        connect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => MinissConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MinissConfig::default(),
    };
    init_tracing(&cfg);

    let handshake_cfg = HandshakeConfig { timeout: cfg.handshake_timeout() };
    let key_path = cli.key.clone().or_else(|| cfg.keystore_path.clone());

    match cli.command {
        Commands::Keygen { out, force } => keygen(&out, force),
        Commands::Serve { listen } => {
            let key = static_key(key_path.as_deref())?;
            let addr = listen.unwrap_or_else(|| cfg.listen_addr.clone());
            serve(&addr, key, handshake_cfg).await
        }
        Commands::Proxy { listen, connect } => {
            let key = static_key(key_path.as_deref())?;
            let addr = listen.unwrap_or_else(|| cfg.listen_addr.clone());
            let Some(remote) = connect.or_else(|| cfg.connect_addr.clone()) else {
                bail!("proxy needs a remote endpoint (--connect or connect_addr)");
            };
            proxy(&addr, &remote, key, handshake_cfg).await
        }
    }
}

fn init_tracing(cfg: &MinissConfig) {
    let fallback = cfg.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Lowercase hex rendering of a public key.
fn fingerprint(pk: &PublicKey) -> String {
    pk.as_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

fn passphrase() -> Result<String> {
    if let Ok(p) = std::env::var(PASSPHRASE_ENV) {
        return Ok(p);
    }
    rpassword::prompt_password("Keystore passphrase: ").context("reading passphrase")
}

fn keygen(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }
    let pair = StaticKeyPair::generate();
    keystore::store_static_key(&pair, out, &passphrase()?)?;
    println!("{}", fingerprint(&pair.public()));
    Ok(())
}

fn static_key(path: Option<&Path>) -> Result<StaticKeyPair> {
    match path {
        Some(p) => {
            let pair = keystore::load_static_key(p, &passphrase()?)
                .with_context(|| format!("loading static key from {}", p.display()))?;
            Ok(pair)
        }
        None => {
            warn!("no keystore configured; using a throwaway static key");
            Ok(StaticKeyPair::generate())
        }
    }
}

async fn serve(addr: &str, key: StaticKeyPair, handshake_cfg: HandshakeConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(addr, local_pk = %fingerprint(&key.public()), "serving secure echo");
    loop {
        let (stream, peer) = listener.accept().await?;
        let key = key.clone();
        let handshake_cfg = handshake_cfg.clone();
        tokio::spawn(async move {
            let sock = match handshake_with_config(stream, key, &handshake_cfg).await {
                Ok(sock) => sock,
                Err(e) => {
                    warn!(%peer, error = %e, "handshake failed");
                    return;
                }
            };
            info!(%peer, remote_pk = %fingerprint(&sock.remote_pk()), "secure channel established");
            match relay::echo(sock).await {
                Ok(total) => info!(%peer, total, "echo finished"),
                Err(e) => error!(%peer, error = %e, "echo failed"),
            }
        });
    }
}

async fn proxy(addr: &str, remote: &str, key: StaticKeyPair, handshake_cfg: HandshakeConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(addr, remote, "proxying plaintext clients");
    loop {
        let (client, peer) = listener.accept().await?;
        let key = key.clone();
        let handshake_cfg = handshake_cfg.clone();
        let remote = remote.to_string();
        tokio::spawn(async move {
            if let Err(e) = proxy_one(client, &remote, key, &handshake_cfg).await {
                warn!(%peer, error = %e, "proxy session failed");
            }
        });
    }
}

async fn proxy_one(client: TcpStream, remote: &str, key: StaticKeyPair, handshake_cfg: &HandshakeConfig) -> Result<()> {
    let upstream = TcpStream::connect(remote).await.with_context(|| format!("connecting {remote}"))?;
    let sock = handshake_with_config(upstream, key, handshake_cfg).await?;
    info!(remote, remote_pk = %fingerprint(&sock.remote_pk()), "secure channel established");
    let (up, down) = relay::forward(client, sock).await?;
    info!(remote, up, down, "proxy session closed");
    Ok(())
}
