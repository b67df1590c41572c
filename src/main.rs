//! ShardSwap command-line interface
//!
//! Thin operational front-end over the library: quoting, shard
//! inspection, remote router health and endpoint pool status.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shardswap::config::Config;
use shardswap::registry::ShardRegistry;
use shardswap::router::{RemoteRouterClient, RoutingEngine};
use shardswap::rpc_pool::ConnectionPool;
use shardswap::tx::ExecutionBuilder;
use shardswap::types::TradingPair;

#[derive(Parser)]
#[command(name = "shardswap", about = "Sharded liquidity routing client", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml", env = "SHARDSWAP_CONFIG")]
    config: String,

    /// Path to the token and shard registry
    #[arg(long, default_value = "shards.toml", env = "SHARDSWAP_REGISTRY")]
    registry: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Quote a swap across all shards of a pair
    Quote {
        /// Trading pair, e.g. SOL/USDC
        pair: String,
        /// Symbol of the token being sold
        input: String,
        /// Amount to sell, in human units
        amount: f64,
        /// Trader address forwarded to the remote router
        #[arg(long)]
        trader: Option<String>,
    },
    /// List the registered shards of a pair with their static reserves
    Shards {
        /// Trading pair, e.g. SOL/USDC
        pair: String,
    },
    /// Probe the remote routing service
    Health,
    /// Show RPC endpoint pool status
    Endpoints,
}

fn parse_pair(raw: &str) -> Result<TradingPair> {
    let (a, b) = raw
        .split_once('/')
        .with_context(|| format!("pair must look like SOL/USDC, got {raw:?}"))?;
    Ok(TradingPair::new(a, b))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shardswap=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_file_with_env(&cli.config)?;
    let registry = Arc::new(ShardRegistry::from_file(&cli.registry)?);
    let pool = Arc::new(ConnectionPool::new(&config.rpc)?);

    let engine = RoutingEngine::new(registry.clone(), pool.clone(), config.trading.clone());
    let remote = if config.router.disabled {
        None
    } else {
        Some(RemoteRouterClient::new(
            &config.router,
            &config.trading,
            registry.clone(),
        )?)
    };

    match cli.command {
        Command::Quote {
            pair,
            input,
            amount,
            trader,
        } => {
            let pair = parse_pair(&pair)?;
            let trader = match trader {
                Some(raw) => Pubkey::from_str(&raw)
                    .with_context(|| format!("invalid trader address {raw:?}"))?,
                None => Pubkey::default(),
            };
            let builder = ExecutionBuilder::new(pool, registry, engine, remote);
            let quote = builder.get_quote(&pair, &input, amount, &trader).await?;

            println!(
                "{} {} -> {} {} via shard {} ({})",
                amount,
                quote.input_token.symbol,
                quote.output_token.to_human(quote.estimated_output),
                quote.output_token.symbol,
                quote.selected_shard.id,
                quote.routing_method.as_str(),
            );
            println!(
                "  price impact: {} bps, fee: {} {} base units",
                quote.price_impact_bps, quote.fee_base_units, quote.input_token.symbol,
            );
            if let Some(reason) = &quote.reason {
                println!("  router: {reason}");
            }
            if quote.exceeds_impact_ceiling {
                println!(
                    "  WARNING: impact exceeds the configured ceiling of {} bps",
                    config.trading.max_price_impact_bps
                );
            }
        }
        Command::Shards { pair } => {
            let pair = parse_pair(&pair)?;
            let shards = registry.shards_for_pair(&pair);
            if shards.is_empty() {
                println!("no shards registered for {}", pair.label());
            }
            for shard in shards {
                println!(
                    "#{} {} pool={} reserves {}/{} base units",
                    shard.shard_number,
                    shard.id,
                    shard.pool_address,
                    shard.reserve_a,
                    shard.reserve_b,
                );
            }
        }
        Command::Health => match &remote {
            Some(client) => {
                let healthy = client.health_check().await;
                println!(
                    "remote router at {}: {}",
                    config.router.base_url,
                    if healthy { "healthy" } else { "unreachable" }
                );
            }
            None => println!("remote router is disabled"),
        },
        Command::Endpoints => {
            let stats = pool.stats();
            info!(
                healthy = stats.healthy_endpoints,
                total = stats.total_endpoints,
                "Pool status"
            );
            for ep in &stats.endpoints {
                println!(
                    "{} {} failures={} requests={}/{}",
                    if ep.healthy { "UP  " } else { "DOWN" },
                    ep.url,
                    ep.consecutive_failures,
                    ep.successful_requests,
                    ep.total_requests,
                );
            }
        }
    }

    Ok(())
}
