//! peertls CLI tool
//!
//! Generate a host key, print its peer id, and open secure sessions over
//! TCP to check that two hosts can authenticate each other.
//!
//! Usage:
//!   peertls keygen
//!   peertls listen --addr 0.0.0.0:9100
//!   peertls dial --addr 127.0.0.1:9100 --peer <peer id>

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use peertls::{Context, Keypair, PeerId, Transport, TransportConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// peertls: self-certifying TLS sessions between peers
#[derive(Parser)]
#[command(name = "peertls")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to host key file (default: ~/.peertls/host.key)
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Path to a TOML transport configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new host key
    Keygen {
        /// Force overwrite existing key
        #[arg(short, long)]
        force: bool,
    },

    /// Display your peer id
    Id,

    /// Accept secure sessions and echo whatever peers send
    Listen {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:9100")]
        addr: String,
    },

    /// Open a secure session to a peer and exchange one line
    Dial {
        /// Address of the peer
        #[arg(short, long)]
        addr: String,

        /// Expected peer id (hex encoded)
        #[arg(short, long)]
        peer: String,

        /// Line to send
        #[arg(short, long, default_value = "hello")]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peertls=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let key_path = cli.key.unwrap_or_else(default_key_path);
    let config = match &cli.config {
        Some(path) => TransportConfig::load(path).unwrap_or_else(|e| fail("Invalid config", e)),
        None => TransportConfig::default(),
    };

    match cli.command {
        Commands::Keygen { force } => cmd_keygen(&key_path, force),
        Commands::Id => cmd_id(&key_path),
        Commands::Listen { addr } => cmd_listen(&key_path, &config, &addr).await,
        Commands::Dial {
            addr,
            peer,
            message,
        } => cmd_dial(&key_path, &config, &addr, &peer, &message).await,
    }
}

fn fail(what: &str, err: impl Display) -> ! {
    eprintln!("Error: {}: {}", what, err);
    std::process::exit(1);
}

fn default_key_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_else(|| {
        eprintln!("Error: $HOME is not set, pass --key");
        std::process::exit(1);
    });
    PathBuf::from(home).join(".peertls").join("host.key")
}

fn load_keypair(path: &Path) -> Keypair {
    let bytes = fs::read(path).unwrap_or_else(|_| {
        eprintln!("Error: No host key found at {:?}", path);
        eprintln!("Run 'peertls keygen' to create one.");
        std::process::exit(1);
    });

    Keypair::from_bytes(&bytes).unwrap_or_else(|e| fail("Invalid host key file", e))
}

fn save_keypair(keypair: &Keypair, path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| fail("Creating key directory", e));
    }
    fs::write(path, keypair.to_bytes()).unwrap_or_else(|e| fail("Saving host key", e));
}

fn load_transport(path: &Path, config: &TransportConfig) -> Arc<Transport> {
    let transport =
        Transport::new(load_keypair(path), config).unwrap_or_else(|e| fail("Transport setup", e));
    Arc::new(transport)
}

/// Context for one connection: cancelled with `root`, bounded by the
/// configured handshake timeout
fn call_context(root: &Context, config: &TransportConfig) -> Context {
    match config.handshake_timeout() {
        Some(timeout) => root.child().with_timeout(timeout),
        None => root.child(),
    }
}

/// Root context for a command, cancelled on Ctrl-C
fn interruptible_context() -> Context {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    Context::with_token(token)
}

fn cmd_keygen(path: &Path, force: bool) {
    if path.exists() && !force {
        eprintln!("Host key already exists at {:?}", path);
        eprintln!("Use --force to overwrite.");
        std::process::exit(1);
    }

    let keypair = Keypair::generate();
    save_keypair(&keypair, path);

    println!("Host key created.");
    println!();
    println!("Your peer id (share this with peers):");
    println!("{}", keypair.peer_id());
    println!();
    println!("Host key saved to: {:?}", path);
}

fn cmd_id(path: &Path) {
    let keypair = load_keypair(path);
    println!("{}", keypair.peer_id());
}

async fn cmd_listen(key_path: &Path, config: &TransportConfig, addr: &str) {
    let transport = load_transport(key_path, config);
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| fail("Binding listener", e));

    let root = interruptible_context();
    info!(peer = %transport.local_peer(), %addr, "listening");

    loop {
        let (socket, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
            _ = root.token().cancelled() => break,
        };

        let transport = Arc::clone(&transport);
        let ctx = call_context(&root, config);
        tokio::spawn(async move {
            let session = match transport.secure_inbound(&ctx, socket).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(%remote_addr, error = %e, "inbound handshake failed");
                    return;
                }
            };
            let remote = session.remote_peer();
            info!(%remote_addr, %remote, "session established");

            let (mut reader, mut writer) = tokio::io::split(session);
            match tokio::io::copy(&mut reader, &mut writer).await {
                Ok(echoed) => info!(%remote, echoed, "session closed"),
                Err(e) => warn!(%remote, error = %e, "session ended with error"),
            }
        });
    }

    info!("shutting down");
}

async fn cmd_dial(
    key_path: &Path,
    config: &TransportConfig,
    addr: &str,
    peer: &str,
    message: &str,
) {
    let expected: PeerId = peer.parse().unwrap_or_else(|e| fail("Invalid peer id", e));
    let transport = load_transport(key_path, config);

    let root = interruptible_context();
    let ctx = call_context(&root, config);

    let socket = TcpStream::connect(addr)
        .await
        .unwrap_or_else(|e| fail("Connecting", e));
    let mut session = transport
        .secure_outbound(&ctx, socket, expected)
        .await
        .unwrap_or_else(|e| fail("Handshake", e));

    println!("Connected to {} as {:?}", session.remote_peer(), session.role());

    let line = format!("{}\n", message);
    if let Err(e) = session.write_all(line.as_bytes()).await {
        fail("Sending", e);
    }
    if let Err(e) = session.flush().await {
        fail("Sending", e);
    }

    let mut reply = String::new();
    let mut reader = BufReader::new(&mut session);
    if let Err(e) = reader.read_line(&mut reply).await {
        fail("Receiving", e);
    }
    print!("{}", reply);

    if let Err(e) = session.close().await {
        warn!(error = %e, "close failed");
    }
}
