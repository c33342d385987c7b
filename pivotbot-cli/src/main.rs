//! PivotBot CLI — run trading cycles and inspect signals/positions.
//!
//! Commands:
//! - `cycle` — bootstrap, then run one full trading cycle
//! - `signals` — evaluate the universe and print signals without trading
//! - `positions` — list positions the exchange currently holds

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use pivotbot_core::config::Settings;
use pivotbot_core::exchange::bybit::{BybitClient, Credentials};
use pivotbot_runner::TradingBot;

#[derive(Parser)]
#[command(name = "pivotbot", about = "PivotBot CLI — pivot-structure futures agent")]
struct Cli {
    /// Path to a TOML settings file. Defaults bake in the production universe.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the exchange testnet instead of mainnet.
    #[arg(long, global = true, default_value_t = false)]
    testnet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap (leverage + reconciliation) and run one trading cycle.
    Cycle,
    /// Evaluate every symbol and print signals without placing orders.
    Signals,
    /// List positions currently held on the exchange.
    Positions,
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(p) => Settings::from_toml_file(p)
            .with_context(|| format!("loading settings from {}", p.display())),
        None => Ok(Settings::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Cycle => {
            let credentials = Credentials::from_env()?;
            let client = BybitClient::new(Some(credentials), cli.testnet)?;
            let mut bot = TradingBot::new(Arc::new(client), settings);
            bot.bootstrap()?;
            let report = bot.run_once();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                bail!("cycle completed with {} error(s)", report.errors.len());
            }
        }
        Commands::Signals => {
            // Market data is public; no credentials required.
            let client = BybitClient::new(Credentials::from_env().ok(), cli.testnet)?;
            let bot = TradingBot::new(Arc::new(client), settings);
            let (scans, errors) = bot.scan();
            println!("{}", serde_json::to_string_pretty(&scans)?);
            if !errors.is_empty() {
                for err in &errors {
                    eprintln!("error: {err}");
                }
                bail!("{} symbol(s) failed to evaluate", errors.len());
            }
        }
        Commands::Positions => {
            let credentials = Credentials::from_env()?;
            let client = BybitClient::new(Some(credentials), cli.testnet)?;
            use pivotbot_core::exchange::Exchange;
            let positions = client.get_positions(None)?;
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
    }

    Ok(())
}
