use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use leader_elector::config::{
    parse_duration, parse_listen_addr, parse_peer_address, ElectionConfig, ElectionIdentity,
    ResolverConfig, TimingConfig, DEFAULT_NAMESPACE,
};
use leader_elector::lease::server::{run_lease_server, LeaseServerState};
use leader_elector::lease::MemoryLeaseStore;
use leader_elector::node::Node;
use leader_elector::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "leader-elector")]
#[command(version)]
#[command(about = "Leader election sidecar that reports the current leader over HTTP")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Take part in an election and publish the current leader
    Run(RunArgs),

    /// Host the lease store that participants coordinate through
    LeaseServer(LeaseServerArgs),

    /// Query a running participant's status endpoint
    Status(StatusArgs),
}

// =============================================================================
// Run Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct RunArgs {
    /// The name of the election
    #[arg(long, default_value = "")]
    election: String,

    /// The id of this participant
    #[arg(long, default_value = "")]
    id: String,

    /// The namespace for this election
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    election_namespace: String,

    /// The TTL for this election (e.g. 10s, 500ms)
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    ttl: Duration,

    /// How often to poll the lease (default: half the TTL)
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Resolve the elected participant ID to an address
    #[arg(long, alias = "resolve-pod-ip")]
    resolve_address: bool,

    /// Domain suffix appended to the participant ID for DNS resolution
    #[arg(long, default_value = "")]
    resolve_domain: String,

    /// Static participant address, repeatable (format: "id=address").
    /// When given, these are used instead of DNS.
    #[arg(long = "peer-address", value_parser = parse_peer_address)]
    peer_addresses: Vec<(String, String)>,

    /// If set, serve the leader state on this address (e.g. ":4040")
    #[arg(long, value_parser = parse_listen_addr)]
    http: Option<std::net::SocketAddr>,

    /// Base URL of the lease server (e.g. http://lease-server:4000).
    /// Without it, an in-process store is used.
    #[arg(long)]
    lease_server: Option<String>,

    /// Bearer token presented to the lease server
    #[arg(long)]
    auth_token: Option<String>,
}

// =============================================================================
// Lease Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct LeaseServerArgs {
    /// Address to listen on
    #[arg(long, default_value = ":4000", value_parser = parse_listen_addr)]
    listen: std::net::SocketAddr,

    /// Require this bearer token on every request
    #[arg(long)]
    auth_token: Option<String>,
}

// =============================================================================
// Status Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Status endpoint of a running participant
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:4040")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct StatusOutput {
    name: String,
    namespace: String,
    #[serde(rename = "podAddress", default, skip_serializing_if = "Option::is_none")]
    pod_address: Option<String>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn resolver_config(args: &RunArgs) -> ResolverConfig {
    if !args.resolve_address {
        if !args.peer_addresses.is_empty() {
            tracing::warn!("--peer-address has no effect without --resolve-address");
        }
        return ResolverConfig::Disabled;
    }
    if args.peer_addresses.is_empty() {
        ResolverConfig::Dns {
            domain: args.resolve_domain.clone(),
        }
    } else {
        ResolverConfig::Static(args.peer_addresses.iter().cloned().collect())
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_participant(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let identity = ElectionIdentity::new(
        args.election.clone(),
        args.id.clone(),
        args.election_namespace.clone(),
    );
    let mut timing = TimingConfig::from_ttl(args.ttl);
    if let Some(interval) = args.poll_interval {
        timing = timing.with_poll_interval(interval);
    }

    let mut config = ElectionConfig::new(identity)
        .with_timing(timing)
        .with_resolver(resolver_config(&args));
    if let Some(addr) = args.http {
        config = config.with_status_addr(addr);
    }
    if let Some(url) = args.lease_server {
        config = config.with_lease_server(url);
    }
    config.auth_token = args.auth_token;

    tracing::info!(
        election = %config.identity.election_name,
        participant = %config.identity.participant_id,
        namespace = %config.identity.namespace,
        status_addr = ?config.status_addr,
        lease_server = ?config.lease_server,
        resolve_address = config.resolver.is_enabled(),
        "Starting leader-elector"
    );

    let node = match Node::from_config(config) {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let shutdown = install_shutdown_handler();
    node.run(shutdown).await?;
    Ok(())
}

async fn run_lease_backend(args: LeaseServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    if args.auth_token.is_none() {
        tracing::warn!("Lease server running without authentication");
    }

    let state = LeaseServerState::new(Arc::new(MemoryLeaseStore::new()), args.auth_token);
    let shutdown = install_shutdown_handler();
    run_lease_server(args.listen, state, shutdown).await?;
    Ok(())
}

async fn handle_status(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let response = reqwest::get(&args.addr).await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        eprintln!("Error: status endpoint returned {}: {}", status, body);
        std::process::exit(1);
    }
    let status: StatusOutput = response.json().await?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            let leader = if status.name.is_empty() {
                "(none yet)"
            } else {
                status.name.as_str()
            };
            println!("Leader:    {}", leader);
            println!("Namespace: {}", status.namespace);
            if let Some(addr) = &status.pod_address {
                println!("Address:   {}", addr);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Run(run_args) => run_participant(run_args).await?,
        Commands::LeaseServer(server_args) => run_lease_backend(server_args).await?,
        Commands::Status(status_args) => handle_status(status_args).await?,
    }

    Ok(())
}
