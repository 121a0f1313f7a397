//! Pawnshop CLI - drive the three-role pawn marketplace from a terminal
//!
//! # Quick Start
//!
//! ```bash
//! # Run creator, buyer and broker against the in-memory network
//! pawnshop demo
//!
//! # Inspect a handoff blob copied from the creator
//! pawnshop handle '{"network": "TestNet", "app_id": 1}'
//!
//! # Amount conversions
//! pawnshop amount parse 12.5
//! pawnshop amount format 12500000 --precision 2
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use pawnshop_core::MarketConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod display;

use commands::{amount, demo, handle};

/// Pawnshop CLI - list, buy, pawn and redeem a tokenized asset
#[derive(Parser)]
#[command(name = "pawnshop")]
#[command(version)]
#[command(about = "Three-role pawn marketplace: creator, buyer and broker", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Network the contracts live on (overrides PAWNSHOP_NETWORK)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Fractional digits shown for balances (overrides PAWNSHOP_DISPLAY_PRECISION)
    #[arg(long, global = true)]
    precision: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full creator / buyer / broker flow in-process
    Demo {
        /// Asset id
        #[arg(long, default_value = "1")]
        id: String,

        /// Listing price
        #[arg(long, default_value = "5")]
        price: String,

        /// Listing tax
        #[arg(long, default_value = "0.5")]
        tax: String,

        /// Amount the broker lends against the asset
        #[arg(long, default_value = "2")]
        pawn_price: String,

        /// Amount the buyer pays back to redeem
        #[arg(long, default_value = "3")]
        redeem_price: String,

        /// Rounds from now until the pawn ends
        #[arg(long, default_value = "1000")]
        term: u64,
    },

    /// Decode a contract handoff blob ("-" reads stdin)
    Handle {
        blob: String,
    },

    /// Convert between decimal and atomic amounts
    Amount {
        #[command(subcommand)]
        action: AmountCommands,
    },
}

#[derive(Subcommand)]
enum AmountCommands {
    /// Decimal string to atomic units
    Parse {
        value: String,
    },

    /// Atomic units to a decimal string
    Format {
        atomic: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = MarketConfig::from_env()?;
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(precision) = cli.precision {
        config.display_precision = precision;
    }
    config.validate()?;

    let result = match cli.command {
        Commands::Demo {
            id,
            price,
            tax,
            pawn_price,
            redeem_price,
            term,
        } => {
            let args = demo::DemoArgs {
                id,
                price,
                tax,
                pawn_price,
                redeem_price,
                term,
            };
            demo::run_demo(&config, args).await
        }
        Commands::Handle { blob } => handle::show_handle(&blob),
        Commands::Amount { action } => match action {
            AmountCommands::Parse { value } => amount::parse(&config, &value),
            AmountCommands::Format { atomic } => amount::format(&config, atomic),
        },
    };

    if let Err(err) = &result {
        display::error(&format!("{:#}", err));
        eprintln!("  {}", "pawnshop exited with an error".bright_black());
    }
    result
}
