//! Stockline CLI - Database migrations and display rule tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! stockline-cli migrate
//!
//! # Check a formula
//! stockline-cli formula check "on_hand - committed"
//!
//! # Evaluate a formula against sample inputs
//! stockline-cli formula eval "(on_hand + incoming) / 2" --on-hand 10 --incoming 5
//!
//! # Print the rule table (built-in defaults, or with stored overrides)
//! stockline-cli rules show --scenario pre_order_po --stored
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `formula check` / `formula eval` - Work with formulas offline
//! - `rules show` - Print the display rule table

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use stockline_core::Scenario;

mod commands;

#[derive(Parser)]
#[command(name = "stockline-cli")]
#[command(author, version, about = "Stockline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check and evaluate availability formulas
    Formula {
        #[command(subcommand)]
        action: FormulaAction,
    },
    /// Inspect display rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum FormulaAction {
    /// Parse a formula and list the inputs it reads
    Check {
        /// Formula source, e.g. "on_hand - committed"
        expression: String,
    },
    /// Evaluate a formula against sample inputs
    Eval {
        /// Formula source
        expression: String,

        /// Units on hand
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        on_hand: i64,

        /// Units incoming on open purchase orders
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        incoming: i64,

        /// Units committed to orders
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        committed: i64,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Print the rule table
    Show {
        /// Only show one scenario (`ats`, `pre_order_po`, `pre_order_no_po`)
        #[arg(short, long)]
        scenario: Option<Scenario>,

        /// Layer stored overrides from the database on the defaults
        #[arg(long)]
        stored: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Formula { action } => match action {
            FormulaAction::Check { expression } => commands::formula::check(&expression)?,
            FormulaAction::Eval {
                expression,
                on_hand,
                incoming,
                committed,
            } => {
                let inputs = stockline_core::Inputs::new(on_hand, incoming, committed);
                commands::formula::eval(&expression, &inputs)?;
            }
        },
        Commands::Rules { action } => match action {
            RulesAction::Show { scenario, stored } => {
                commands::rules::show(scenario, stored).await?;
            }
        },
    }
    Ok(())
}
