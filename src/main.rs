use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gossip_membership::config::{NodeConfig, SeedSet};
use gossip_membership::event_log::EventSink;
use gossip_membership::peer::PeerNode;
use gossip_membership::protocol::Endpoint;
use gossip_membership::seed::SeedRegistry;
use gossip_membership::shutdown;

#[derive(Parser, Debug)]
#[command(name = "gossip-membership")]
#[command(about = "Seed-assisted gossip membership")]
struct Args {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Run every seed listed in the config file
    Seed {
        /// Seed list, one `host port` per line
        #[arg(short, long, default_value = "config.txt")]
        config: PathBuf,

        /// Event log shared by all seeds of this process
        #[arg(short, long, default_value = "outputseed.txt")]
        log: PathBuf,
    },

    /// Run one gossiping peer
    Peer {
        /// Host to listen on and announce to seeds
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long)]
        port: u16,

        /// Seed list, one `host port` per line
        #[arg(short, long, default_value = "config.txt")]
        config: PathBuf,

        /// Event log file
        #[arg(short, long, default_value = "outputpeer.txt")]
        log: PathBuf,

        /// Optional JSON file overriding protocol timings
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.role {
        Role::Seed { config, log } => run_seeds(config, log).await,
        Role::Peer {
            host,
            port,
            config,
            log,
            settings,
        } => run_peer(host, port, config, log, settings).await,
    }
}

async fn run_seeds(config: PathBuf, log: PathBuf) -> Result<()> {
    let seeds = SeedSet::load(&config).await?;
    if seeds.is_empty() {
        bail!("no seeds listed in {}", config.display());
    }

    let sink = EventSink::open(&log).await?;
    let (trigger, shutdown) = shutdown::channel();

    let mut handles = Vec::with_capacity(seeds.len());
    for endpoint in seeds.endpoints() {
        let registry = SeedRegistry::new(endpoint.clone(), sink.clone()).await?;
        handles.push(tokio::spawn(registry.run(shutdown.clone())));
    }

    tracing::info!("Started {} seeds", handles.len());
    shutdown::wait_for_signal().await;
    trigger.trigger();

    for handle in handles {
        handle.await?;
    }

    Ok(())
}

async fn run_peer(
    host: String,
    port: u16,
    config: PathBuf,
    log: PathBuf,
    settings: Option<PathBuf>,
) -> Result<()> {
    let seeds = SeedSet::load(&config).await?;
    tracing::info!("Seed list: {:?}", seeds.endpoints());

    let node_config = match settings {
        Some(path) => NodeConfig::load(path).await?,
        None => NodeConfig::default(),
    };

    let sink = EventSink::open(&log).await?;
    let node = PeerNode::new(Endpoint::new(host, port), seeds, node_config, sink).await?;

    let (trigger, shutdown) = shutdown::channel();
    let mut running = tokio::spawn(node.run(shutdown));

    tokio::select! {
        _ = shutdown::wait_for_signal() => {
            trigger.trigger();
            running.await?
        }
        // Finishing before any signal means bootstrap failed.
        finished = &mut running => finished?,
    }
}
