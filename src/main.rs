//! `plscan`: scan registered chains for public labels.
//!
//! Settings come from flags, falling back to the environment (and a `.env` file).
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use public_label_indexer::{
    config::DEFAULT_RESCAN_RECENT_BLOCKS,
    model::{Chain, ChainId},
    prelude::*,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plscan", version, about = "Public label chain scanner")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "PLSCAN_DB", default_value = "public_labels.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan every online chain, or a single one.
    Scan(ScanArgs),
    /// Register a chain or update its settings.
    AddChain(AddChainArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Only scan this chain id.
    #[arg(long)]
    chain: Option<ChainId>,

    /// Node host; each chain's port comes from the registry.
    #[arg(long, env = "PLSCAN_RPC_HOST", default_value = "127.0.0.1")]
    rpc_host: String,

    #[arg(long, env = "PLSCAN_RPC_USER")]
    rpc_user: String,

    #[arg(long, env = "PLSCAN_RPC_PASSWORD", hide_env_values = true)]
    rpc_password: String,

    /// Trailing blocks deleted and re-scanned every pass.
    #[arg(long, env = "PLSCAN_RESCAN_BLOCKS", default_value_t = DEFAULT_RESCAN_RECENT_BLOCKS)]
    rescan_blocks: u32,

    /// Lowest height scanned on chains with no checkpoint yet.
    #[arg(long, env = "PLSCAN_START_HEIGHT")]
    start_height: Option<u64>,
}

#[derive(Args)]
struct AddChainArgs {
    #[arg(long)]
    id: ChainId,
    #[arg(long)]
    name: String,
    #[arg(long)]
    port: u16,
    /// Register the chain as offline.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::new(&cli.db).with_context(|| format!("open store {}", cli.db))?;

    match cli.command {
        Command::AddChain(args) => {
            let chain = Chain {
                id: args.id,
                name: args.name,
                rpc_port: args.port,
                online: !args.offline,
            };
            store.upsert_chain(&chain).await?;
            tracing::info!(chain = chain.id, name = %chain.name, port = chain.rpc_port, online = chain.online, "chain registered");
        }
        Command::Scan(args) => {
            let settings = RpcSettings {
                host: args.rpc_host,
                user: args.rpc_user,
                password: args.rpc_password,
            };
            let mut config = ScanConfig::default().with_rescan_recent_blocks(args.rescan_blocks);
            if let Some(h) = args.start_height {
                config = config.with_start_height(h);
            }

            tracing::info!("started public label scan");
            let driver = ChainDriver::new(store, BitcoindConnector::new(settings), config);
            let report = driver.run(args.chain).await?;

            let failed = report
                .iter()
                .filter(|(_, o)| !matches!(o, ChainOutcome::Completed { .. }))
                .count();
            tracing::info!(chains = report.len(), failed, "run finished");
        }
    }

    Ok(())
}
