//! Chef's Journal CLI - migrations and a command-line sync client.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cj migrate
//!
//! # Log in (registers on first use) and fetch the family document
//! cj login 13800138000 --name Mei
//! cj pull
//!
//! # Keep syncing for a minute
//! cj sync --for 60
//!
//! # Join another family
//! cj family request K7QX2M9A
//! cj family pending
//! cj family approve 0b0f7f0e-5a0c-4c52-9d55-0d6ffb4b8a4e
//!
//! # Plan and shop
//! cj plan toggle r-42 --date 2026-10-18
//! cj plan lock --date 2026-10-18
//! cj shopping list --date 2026-10-18
//! cj shopping set tofu --date 2026-10-18 --bought true --cost 6.5
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `login`, `pull`, `sync` - Account and synchronization
//! - `family` - Join requests and members
//! - `plan` - Daily plan edits and locks
//! - `shopping` - Shopping list and cart records

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "cj")]
#[command(author, version, about = "Chef's Journal CLI tools")]
struct Cli {
    /// Server base URL (overrides `JOURNAL_SERVER_URL`)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Log in by phone number, registering on first use
    Login {
        /// Phone number
        phone: String,

        /// Display name used on first login
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Pull the family document into the local cache once
    Pull,
    /// Run the background sync for a while
    Sync {
        /// Seconds to keep syncing (until Ctrl+C when omitted)
        #[arg(long = "for", value_name = "SECS")]
        duration: Option<u64>,
    },
    /// Manage join requests and members
    Family {
        #[command(subcommand)]
        action: FamilyAction,
    },
    /// Edit daily plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// Shopping list and cart records
    Shopping {
        #[command(subcommand)]
        action: ShoppingAction,
    },
}

#[derive(Subcommand)]
enum FamilyAction {
    /// Ask to join another family
    Request {
        /// Target family code
        family_id: String,
    },
    /// Approve a pending request
    Approve {
        /// Join request id
        request_id: String,
    },
    /// Reject a pending request
    Reject {
        /// Join request id
        request_id: String,
    },
    /// List pending requests to the current family
    Pending,
    /// List member phones and owner
    Members,
}

#[derive(Subcommand)]
enum PlanAction {
    /// Add a recipe to the plan, or remove it when already planned
    Toggle {
        /// Recipe id
        recipe_id: String,

        /// Date (`YYYY-MM-DD`, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Lock the plan for a date
    Lock {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Release your lock on a date
    Unlock {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Record the plan as cooked in the meal log
    Cooked {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum ShoppingAction {
    /// Show the grouped shopping list
    List {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Update one ingredient group's cart record
    Set {
        /// Ingredient name (grouped case-insensitively)
        name: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Mark the group bought (`true`) or not (`false`)
        #[arg(long)]
        bought: Option<bool>,

        /// Total paid for the group
        #[arg(long)]
        cost: Option<Decimal>,

        /// Price per unit
        #[arg(long)]
        unit_price: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn day(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(cli.command, Commands::Migrate) {
        commands::migrate::run().await?;
        return Ok(());
    }

    let ctx = Context::open(cli.server).await?;
    match cli.command {
        // Handled above, before a client context exists.
        Commands::Migrate => {}
        Commands::Login { phone, name } => {
            commands::account::login(&ctx, &phone, name.as_deref()).await?;
        }
        Commands::Pull => commands::account::pull(&ctx).await?,
        Commands::Sync { duration } => commands::account::sync(&ctx, duration).await?,
        Commands::Family { action } => match action {
            FamilyAction::Request { family_id } => {
                commands::family::request(&ctx, &family_id).await?;
            }
            FamilyAction::Approve { request_id } => {
                commands::family::approve(&ctx, &request_id).await?;
            }
            FamilyAction::Reject { request_id } => {
                commands::family::reject(&ctx, &request_id).await?;
            }
            FamilyAction::Pending => commands::family::pending(&ctx).await?,
            FamilyAction::Members => commands::family::members(&ctx).await?,
        },
        Commands::Plan { action } => match action {
            PlanAction::Toggle { recipe_id, date } => {
                commands::plan::toggle(&ctx, day(date), &recipe_id).await?;
            }
            PlanAction::Lock { date } => commands::plan::set_lock(&ctx, day(date), true).await?,
            PlanAction::Unlock { date } => {
                commands::plan::set_lock(&ctx, day(date), false).await?;
            }
            PlanAction::Cooked { date } => commands::plan::cooked(&ctx, day(date)).await?,
        },
        Commands::Shopping { action } => match action {
            ShoppingAction::List { date } => commands::shopping::list(&ctx, day(date)).await?,
            ShoppingAction::Set {
                name,
                date,
                bought,
                cost,
                unit_price,
            } => {
                commands::shopping::set(&ctx, day(date), &name, bought, cost, unit_price).await?;
            }
        },
    }
    Ok(())
}
