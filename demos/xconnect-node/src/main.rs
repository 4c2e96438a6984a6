//! xconnect node.
//!
//! Run an executor:
//!   xconnect-node agent --agent-id desk --broker-url http://broker:5000
//!
//! Run the broker:
//!   xconnect-node broker --listen 0.0.0.0:5000
//!
//! Run a peer-routing node and send it a prompt:
//!   xconnect-node peer --peers peers.toml
//!   xconnect-node send --url http://127.0.0.1:5001 'machineB@pwd'

mod shutdown;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use axum::Router;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xconnect_core::{
    ExecutionContext, PeerConfig, PeerTable,
    config::{
        DEFAULT_AGENT_TIMEOUT, DEFAULT_FORWARD_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL,
        DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_PEER_TIMEOUT, parse_address, require_profile,
    },
};
use xconnect_executor::StatefulExecutor;
use xconnect_session::{ShellSession, storage::MemoryRegistry};
use xconnect_transport::{
    BrokerState, ForwardClient, HeartbeatEmitter, PeerState, PromptRequest, agent, broker, peer,
};

#[derive(Parser, Debug)]
#[command(name = "xconnect-node")]
#[command(version)]
#[command(about = "Stateful remote shell sessions over HTTP")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve `/execute` and send heartbeats to a broker
    Agent(AgentArgs),

    /// Serve the registry and dispatcher
    Broker(BrokerArgs),

    /// Serve `/execute` and the peer-routing `/echo` intake
    Peer(PeerArgs),

    /// Send one prompt to a peer node and print the response
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct ShellArgs {
    /// Profile sourced before every command
    #[arg(long, env = "XCONNECT_PROFILE", default_value = "agentrc")]
    profile: PathBuf,

    /// Shell name or path (defaults to $SHELL, then /bin/sh)
    #[arg(long, env = "XCONNECT_SHELL")]
    shell: Option<String>,
}

#[derive(Args, Debug)]
struct AgentArgs {
    /// Address to listen on
    #[arg(long, env = "XCONNECT_LISTEN", default_value = "0.0.0.0:5001")]
    listen: SocketAddr,

    /// Identity reported to the broker
    #[arg(long, env = "XCONNECT_AGENT_ID")]
    agent_id: String,

    /// Address the broker uses to reach this agent (defaults to http://<listen>
    /// unless listening on a wildcard address)
    #[arg(long, env = "XCONNECT_PUBLIC_ADDRESS")]
    public_address: Option<String>,

    /// Broker base URL
    #[arg(long, env = "XCONNECT_BROKER_URL")]
    broker_url: Option<String>,

    #[command(flatten)]
    shell: ShellArgs,

    /// Seconds between heartbeats
    #[arg(
        long,
        env = "XCONNECT_HEARTBEAT_INTERVAL_SECS",
        default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    heartbeat_interval_secs: u64,

    /// Do not register with the broker
    #[arg(long, env = "XCONNECT_NO_HEARTBEAT")]
    no_heartbeat: bool,
}

#[derive(Args, Debug)]
struct BrokerArgs {
    /// Address to listen on
    #[arg(long, env = "XCONNECT_LISTEN", default_value = "0.0.0.0:5000")]
    listen: SocketAddr,

    /// Seconds after the last heartbeat before an agent is stale
    #[arg(long, env = "XCONNECT_AGENT_TIMEOUT_SECS", default_value_t = DEFAULT_AGENT_TIMEOUT.as_secs())]
    agent_timeout_secs: u64,

    /// Bound on a forwarded request, in seconds
    #[arg(long, env = "XCONNECT_FORWARD_TIMEOUT_SECS", default_value_t = DEFAULT_FORWARD_TIMEOUT.as_secs())]
    forward_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct PeerArgs {
    /// Address to listen on
    #[arg(long, env = "XCONNECT_LISTEN", default_value = "0.0.0.0:5001")]
    listen: SocketAddr,

    /// This node's alias (overrides the peer file)
    #[arg(long, env = "XCONNECT_ALIAS")]
    alias: Option<String>,

    /// TOML peer table
    #[arg(long, env = "XCONNECT_PEERS")]
    peers: Option<PathBuf>,

    /// Extra peer as alias=url (repeatable)
    #[arg(long = "peer", value_name = "ALIAS=URL")]
    peer: Vec<String>,

    #[command(flatten)]
    shell: ShellArgs,

    /// Bound on a peer hop, in seconds
    #[arg(long, env = "XCONNECT_FORWARD_TIMEOUT_SECS", default_value_t = DEFAULT_PEER_TIMEOUT.as_secs())]
    forward_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Peer node base URL
    #[arg(long, env = "XCONNECT_URL", default_value = "http://127.0.0.1:5001")]
    url: String,

    /// Prompt, optionally prefixed with `alias@`
    prompt: String,

    /// Request timeout, in seconds
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Agent(args) => run_agent(args).await,
        Commands::Broker(args) => run_broker(args).await,
        Commands::Peer(args) => run_peer(args).await,
        Commands::Send(args) => run_send(args).await,
    }
}

async fn build_session(args: &ShellArgs) -> anyhow::Result<Arc<ShellSession<StatefulExecutor>>> {
    require_profile(&args.profile).inspect_err(|e| tracing::error!("{e}"))?;
    let profile = std::fs::canonicalize(&args.profile)
        .with_context(|| format!("Failed to resolve {}", args.profile.display()))?;

    let shell = xconnect_shell::resolve_shell(args.shell.as_deref()).await?;
    tracing::info!(shell = %shell.path().display(), profile = %profile.display(), "Using shell");

    let bootstrap =
        ExecutionContext::from_process().context("Failed to read process environment")?;
    Ok(Arc::new(ShellSession::new(
        StatefulExecutor::new(shell.clone(), profile),
        shell,
        bootstrap,
    )))
}

async fn run_agent(args: AgentArgs) -> anyhow::Result<()> {
    let token = shutdown::install_shutdown_handler()?;
    let session = build_session(&args.shell).await?;

    let heartbeat = match (&args.broker_url, args.no_heartbeat) {
        (Some(broker_url), false) => {
            let public_address = advertised_address(args.public_address.as_deref(), args.listen)?;
            let emitter = HeartbeatEmitter::new(
                ForwardClient::new(DEFAULT_HEARTBEAT_TIMEOUT)?,
                broker_url.clone(),
                args.agent_id.clone(),
                public_address,
                Duration::from_secs(args.heartbeat_interval_secs),
            );
            Some(emitter.spawn(token.clone()))
        }
        _ => {
            tracing::info!("Heartbeat disabled");
            None
        }
    };

    tracing::info!(agent_id = %args.agent_id, "Starting agent");
    serve(args.listen, agent::router(session), token.clone()).await?;

    token.cancel();
    if let Some(handle) = heartbeat {
        handle.await.context("Heartbeat task failed")?;
    }
    Ok(())
}

/// Address reported in heartbeats.
///
/// A wildcard listen address cannot be dialled from another host, so it only
/// serves as a fallback for a concrete IP.
fn advertised_address(public: Option<&str>, listen: SocketAddr) -> anyhow::Result<String> {
    if let Some(address) = public {
        parse_address(address)
            .map_err(|reason| anyhow::anyhow!("Invalid --public-address '{address}': {reason}"))?;
        return Ok(address.to_string());
    }
    if listen.ip().is_unspecified() {
        bail!("--public-address is required when listening on {listen} with a broker");
    }
    Ok(format!("http://{listen}"))
}

async fn run_broker(args: BrokerArgs) -> anyhow::Result<()> {
    let token = shutdown::install_shutdown_handler()?;
    let registry = Arc::new(MemoryRegistry::new(Duration::from_secs(
        args.agent_timeout_secs,
    )));
    let client = ForwardClient::new(Duration::from_secs(args.forward_timeout_secs))?;

    serve(
        args.listen,
        broker::router(BrokerState::new(registry, client)),
        token,
    )
    .await
}

fn load_peer_config(args: &PeerArgs) -> anyhow::Result<PeerConfig> {
    let mut config = match (&args.peers, &args.alias) {
        (Some(path), alias) => PeerConfig::load(path, alias.as_deref())?,
        (None, Some(alias)) => PeerConfig::new(alias.clone(), PeerTable::new())?,
        (None, None) => bail!("A peer node needs --alias or --peers"),
    };
    for definition in &args.peer {
        config.peers.insert_definition(definition)?;
    }
    Ok(config)
}

async fn run_peer(args: PeerArgs) -> anyhow::Result<()> {
    let config = load_peer_config(&args).inspect_err(|e| tracing::error!("{e}"))?;
    let token = shutdown::install_shutdown_handler()?;
    let session = build_session(&args.shell).await?;
    let client = ForwardClient::new(Duration::from_secs(args.forward_timeout_secs))?;

    tracing::info!(
        alias = %config.alias,
        peers = ?config.remote_aliases().collect::<Vec<_>>(),
        "Starting peer node"
    );
    let app = agent::router(Arc::clone(&session))
        .merge(peer::router(PeerState::new(session, config, client)));
    serve(args.listen, app, token).await
}

async fn run_send(args: SendArgs) -> anyhow::Result<()> {
    let client = ForwardClient::new(Duration::from_secs(args.timeout_secs))?;
    let relayed = client
        .post_json(&args.url, "/echo", &PromptRequest::new(args.prompt))
        .await?;

    println!("{}", serde_json::to_string_pretty(&relayed.body)?);
    if !relayed.status.is_success() {
        bail!("Request failed with status {}", relayed.status);
    }
    Ok(())
}

async fn serve(addr: SocketAddr, app: Router, token: CancellationToken) -> anyhow::Result<()> {
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}
