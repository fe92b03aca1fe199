use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};

use rome::network::{fetch_health, run_rpc_server, HttpTransport};
use rome::raft::Raft;
use rome::Config;

#[derive(Parser)]
#[command(name = "rome")]
#[command(about = "Raft-style leader election over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a node in the cluster
    Node {
        /// Unique ID for this node
        #[arg(short, long)]
        id: Option<String>,

        /// Address to listen on
        #[arg(short, long)]
        address: Option<String>,

        /// Comma-separated list of peers (id=address)
        #[arg(short, long)]
        peers: Option<String>,

        /// JSON config file; flags override its values
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show a node's election state from its /health endpoint
    Status {
        /// Node HTTP address, e.g. 127.0.0.1:8000
        #[arg(long)]
        http: String,
    },
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

async fn run_node(
    id: Option<String>,
    address: Option<String>,
    peers: Option<String>,
    config_path: Option<String>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load(&path).with_context(|| format!("loading {path}"))?,
        None => Config::default(),
    };
    if let Some(id) = id {
        config.node_id = id;
    }
    if let Some(address) = address {
        config.listen_address = address;
    }
    if let Some(peers) = peers {
        config.set_peers_from_str(&peers)?;
    }
    if config.node_id.is_empty() {
        anyhow::bail!("no node id given (use --id or node_id in the config file)");
    }

    let raft_config = config.raft_config();
    for (peer_id, peer_addr) in &raft_config.peers {
        info!("Added peer: {peer_id} at {peer_addr}");
    }

    let transport = HttpTransport::new(raft_config.peers.clone(), raft_config.rpc_timeout());
    let raft = Raft::new(raft_config, Arc::new(transport))?;

    let listener = TcpListener::bind(&config.listen_address)
        .with_context(|| format!("binding {}", config.listen_address))?;
    info!("rome-{} listening on {}", config.node_id, config.listen_address);

    let tasks = raft.start();
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down"),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await
            }
        }
    };
    let served = run_rpc_server(listener, raft.handler(), shutdown).await;
    tasks.abort();
    served?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            id,
            address,
            peers,
            config,
        } => run_node(id, address, peers, config).await?,
        Command::Status { http } => {
            let body = fetch_health(&http)
                .await
                .with_context(|| format!("querying {http}"))?;
            println!("{body}");
        }
    }

    Ok(())
}
