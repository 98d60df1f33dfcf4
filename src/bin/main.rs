//! Thin CLI wrapper around the library: run a broker, generate a TCP
//! identity, or watch an in-process demo exercise the bus end to end.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aductbus::broker::Broker;
use aductbus::client::Client;
use aductbus::config::{BrokerConfig, ClientConfig};
use aductbus::history::{Direction, HistoryStore, InMemoryHistoryStore};
use aductbus::transport::{decode_public, encode_public, CertPaths, IpcDealer, IpcRouter, Keypair, TcpDealer, TcpRouter};

#[derive(Parser)]
#[command(name = "aductbus")]
#[command(version, about = "A lightweight message bus for cooperating clients", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a broker, listening for clients until interrupted.
    Broker {
        #[command(subcommand)]
        transport: BrokerTransport,
    },
    /// Generate a CURVE keypair and write it to `<dir>/<name>.{public,secret}`.
    Certs {
        /// Identity name, e.g. "broker" or a client's name.
        name: String,
        /// Directory the key files are written under.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Run an in-process broker and two clients that subscribe/publish,
    /// request/respond and ping.
    Demo,
}

#[derive(Subcommand)]
enum BrokerTransport {
    /// Bind a Unix domain socket.
    Ipc {
        /// Socket path.
        #[arg(default_value = "/tmp/aductbus.sock")]
        path: PathBuf,
    },
    /// Bind a TCP socket with a CURVE handshake.
    Tcp {
        /// Address to bind, e.g. "127.0.0.1:7400".
        address: String,
        /// Directory holding this broker's `broker.{public,secret}` files.
        #[arg(long, default_value = ".")]
        certs_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Broker { transport } => run_broker(transport).await,
        Commands::Certs { name, dir } => generate_certs(&name, &dir),
        Commands::Demo => run_demo().await,
    }
}

async fn run_broker(transport: BrokerTransport) -> anyhow::Result<()> {
    match transport {
        BrokerTransport::Ipc { path } => {
            let router = IpcRouter::bind(&path).await?;
            tracing::info!(path = %path.display(), "ipc broker listening");
            let mut broker = Broker::new(router, BrokerConfig::default());
            broker.start()?;
            tokio::signal::ctrl_c().await?;
            broker.stop().await;
        }
        BrokerTransport::Tcp { address, certs_dir } => {
            let keypair = load_keypair(&certs_dir, "broker")?;
            let router = TcpRouter::bind(&address, keypair).await?;
            tracing::info!(address = %router.local_addr(), "tcp broker listening");
            let mut broker = Broker::new(router, BrokerConfig::default());
            broker.start()?;
            tokio::signal::ctrl_c().await?;
            broker.stop().await;
        }
    }
    Ok(())
}

fn generate_certs(name: &str, dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let keypair = Keypair::generate();
    let paths = CertPaths::for_identity(dir, name);
    std::fs::write(&paths.public, encode_public(&keypair.public()))?;
    std::fs::write(&paths.secret, hex::encode(keypair.secret_bytes()))?;
    println!("wrote {}", paths.public.display());
    println!("wrote {}", paths.secret.display());
    Ok(())
}

fn load_keypair(dir: &std::path::Path, name: &str) -> anyhow::Result<Keypair> {
    let paths = CertPaths::for_identity(dir, name);
    let secret_hex = std::fs::read_to_string(&paths.secret)?;
    let decoded = hex::decode(secret_hex.trim())?;
    let bytes: [u8; 32] = decoded
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow::anyhow!("expected 32-byte secret, got {}", bytes.len()))?;
    Ok(Keypair::from_secret_bytes(bytes))
}

/// Bring up an in-process broker and two clients, and walk through
/// subscribe/publish, request/response and ping, printing the recorded
/// history at the end (the "Persisted state" table view).
async fn run_demo() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("aductbus-demo-{}.sock", std::process::id()));
    let router = IpcRouter::bind(&path).await?;
    let mut broker = Broker::new(router, BrokerConfig::default());
    broker.start()?;

    let history = InMemoryHistoryStore::new();

    let dealer_a = IpcDealer::connect(&path).await?;
    let mut alice = Client::new("alice", dealer_a, ClientConfig::default());
    alice.start().await?;

    let dealer_b = IpcDealer::connect(&path).await?;
    let mut bob = Client::new("bob", dealer_b, ClientConfig::default());
    bob.start().await?;

    let mut announcements = bob.subscribe("announcements").await?;

    let event = alice.generate_event("announcements", "hello from alice");
    history.record(&event, Direction::Sent).await;
    alice.publish(event)?;

    if let Some(received) = announcements.recv().await {
        history.record(&received, Direction::Received).await;
        println!("bob received: {}", received.body());
    }

    let request = alice.generate_request("bob", "what's the weather", Duration::from_secs(5));
    history.record(&request, Direction::Sent).await;
    let (response, ()) = tokio::join!(alice.request(request), async {
        if let Some(incoming) = bob.next_request().await {
            let _ = bob.respond(&incoming, "sunny and warm");
        }
    });
    match response {
        Ok(reply) => {
            history.record(&reply, Direction::Received).await;
            println!("alice got response: {}", reply.body());
        }
        Err(error) => println!("request failed: {error}"),
    }

    let ping_ok = alice.ping("bob").await;
    println!("alice pinged bob: {ping_ok}");

    println!("-- history --");
    for entry in history.entries().await {
        println!("{:?} {} {}", entry.direction, entry.kind, entry.body);
    }

    alice.stop().await;
    bob.stop().await;
    broker.stop().await;
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[allow(dead_code)]
async fn connect_tcp_client(address: &str, certs_dir: &std::path::Path, name: &str) -> anyhow::Result<Client<TcpDealer>> {
    let keypair = load_keypair(certs_dir, name)?;
    let server_public_hex = std::fs::read_to_string(CertPaths::for_identity(certs_dir, "broker").public)?;
    let pinned = decode_public(server_public_hex.trim())?;
    let dealer = TcpDealer::connect(address, keypair, pinned).await?;
    Ok(Client::new(name, dealer, ClientConfig::default()))
}
