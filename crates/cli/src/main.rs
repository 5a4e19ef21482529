mod registry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use xchg_core::{AssetType, Config, CurrencyPair, FeeBuilder, FeeType};
use xchg_exchanges_common::{start, Exchange};
use xchg_market::MarketData;

#[derive(Parser)]
#[command(name = "xchg")]
#[command(about = "Exchange drivers: cached market data, fees and capability reports")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Exchange config file (TOML)
    #[arg(short, long, env = "XCHG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured exchanges and their withdrawal capabilities
    Exchanges,

    /// Show the ticker for a pair
    Ticker {
        #[arg(short, long)]
        exchange: String,

        /// Pair, e.g. "BTC/USD" or "BTC-USD"
        #[arg(short, long)]
        pair: CurrencyPair,

        /// Fetch from the venue even if cached
        #[arg(long)]
        refresh: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the top of the order book for a pair
    Orderbook {
        #[arg(short, long)]
        exchange: String,

        #[arg(short, long)]
        pair: CurrencyPair,

        /// Levels per side
        #[arg(short, long, default_value = "10")]
        depth: usize,

        #[arg(long)]
        refresh: bool,

        #[arg(long)]
        json: bool,
    },

    /// Estimate a fee
    Fee {
        #[arg(short, long)]
        exchange: String,

        /// trade, crypto_deposit, crypto_withdrawal, bank_deposit, bank_withdrawal, bank
        #[arg(short = 't', long = "type")]
        fee_type: FeeType,

        /// Traded pair; the base is the currency for crypto transfers
        #[arg(short, long)]
        pair: Option<CurrencyPair>,

        #[arg(long, default_value = "0")]
        price: Decimal,

        #[arg(short, long, default_value = "0")]
        amount: Decimal,

        #[arg(long)]
        maker: bool,

        /// Fiat currency for bank transfers
        #[arg(long)]
        fiat: Option<String>,
    },

    /// Run housekeeping for every enabled exchange until Ctrl-C
    Run {
        #[arg(short, long, default_value = "60")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.log_json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let market = MarketData::shared();

    match cli.command {
        Commands::Exchanges => list_exchanges(&config, market)?,
        Commands::Ticker {
            exchange,
            pair,
            refresh,
            json,
        } => {
            let driver = registry::configured(&exchange, &config, market)?;
            let ticker = if refresh {
                driver.refresh_ticker(&pair, AssetType::Spot).await?
            } else {
                driver.fetch_ticker(&pair, AssetType::Spot).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(ticker.as_ref())?);
            } else {
                println!("{} {}", driver.name(), ticker.pair);
                println!("  last   {}", ticker.last);
                println!("  bid    {}", ticker.bid);
                println!("  ask    {}", ticker.ask);
                println!("  high   {}", ticker.high);
                println!("  low    {}", ticker.low);
                println!("  volume {}", ticker.volume);
                println!("  at     {}", ticker.last_updated);
            }
        }
        Commands::Orderbook {
            exchange,
            pair,
            depth,
            refresh,
            json,
        } => {
            let driver = registry::configured(&exchange, &config, market)?;
            let book = if refresh {
                driver.refresh_order_book(&pair, AssetType::Spot).await?
            } else {
                driver.fetch_order_book(&pair, AssetType::Spot).await?
            };
            let book = book.depth(depth);
            if json {
                println!("{}", serde_json::to_string_pretty(&book)?);
            } else {
                println!("{} {} ({} bids, {} asks)", book.exchange, book.pair, book.bids.len(), book.asks.len());
                println!("  {:>20} {:>20}", "bid", "ask");
                for i in 0..book.bids.len().max(book.asks.len()) {
                    let side = |levels: &[xchg_core::PriceLevel]| {
                        levels
                            .get(i)
                            .map(|l| format!("{} @ {}", l.amount, l.price))
                            .unwrap_or_default()
                    };
                    println!("  {:>20} {:>20}", side(&book.bids), side(&book.asks));
                }
            }
        }
        Commands::Fee {
            exchange,
            fee_type,
            pair,
            price,
            amount,
            maker,
            fiat,
        } => {
            let driver = registry::configured(&exchange, &config, market)?;
            let mut fee = FeeBuilder::new(fee_type).with_amount(amount);
            fee.purchase_price = price;
            fee.is_maker = maker;
            if let Some(pair) = pair {
                fee = fee.with_pair(pair);
            }
            if let Some(fiat) = fiat {
                fee = fee.with_fiat(fiat);
            }
            println!("{}", driver.fee_estimate(&fee)?);
        }
        Commands::Run { interval_secs } => {
            run(&config, market, Duration::from_secs(interval_secs)).await?;
        }
    }

    Ok(())
}

fn list_exchanges(config: &Config, market: Arc<MarketData>) -> Result<()> {
    let drivers: Vec<Box<dyn Exchange>> = if config.exchanges.is_empty() {
        registry::KNOWN_EXCHANGES
            .iter()
            .map(|name| registry::build(name, market.clone()))
            .collect::<Result<_>>()?
    } else {
        registry::from_config(config, market)?
    };

    for driver in drivers {
        let base = driver.base();
        println!(
            "{:<10} enabled={:<5} rest={:<5} websocket={:<5} pairs={}",
            base.name,
            base.enabled,
            base.supports.rest,
            base.supports.websocket,
            base.enabled_pairs().len()
        );
        println!("           withdrawals: {}", driver.withdrawal_capabilities());
    }
    Ok(())
}

async fn run(config: &Config, market: Arc<MarketData>, interval: Duration) -> Result<()> {
    let drivers = registry::from_config(config, market)?;
    let handles: Vec<_> = drivers
        .into_iter()
        .filter(|driver| driver.is_enabled())
        .map(|driver| start(Arc::from(driver), interval))
        .collect();

    if handles.is_empty() {
        anyhow::bail!("No enabled exchanges in config");
    }
    tracing::info!(count = handles.len(), ?interval, "Housekeeping running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    for handle in handles {
        handle.stop().await;
    }
    Ok(())
}
