//! Catalog bridge CLI - database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session table)
//! catalog-cli migrate
//!
//! # Create a user who may sync the catalog
//! catalog-cli user create -e manager@example.com -p 'long password' -r shop_manager
//!
//! # Revoke sync rights without deleting the account
//! catalog-cli user role -e manager@example.com -r customer
//!
//! # Sync the remote catalog into the local one
//! catalog-cli sync
//!
//! # Invalidate every rendered grid
//! catalog-cli cache bump
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `CATALOG_API_*`, `CATALOG_MEDIA_DIR`, `CATALOG_COMMERCE_ENABLED`,
//!   `CATALOG_UPDATE_EXISTING`, `CATALOG_DEBUG` - as for the storefront (used by `sync`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(author, version, about = "catalog-bridge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Sync the remote catalog into the local catalog
    Sync,
    /// Manage the render cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`administrator`, `shop_manager`, `customer`)
        #[arg(short, long, default_value = "shop_manager")]
        role: String,
    },
    /// Change an existing user's role
    Role {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// New role (`administrator`, `shop_manager`, `customer`)
        #[arg(short, long)]
        role: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Bump the render cache version, invalidating every rendered grid
    Bump,
}

#[tokio::main]
async fn main() {
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

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                role,
            } => {
                commands::user::create(&email, &password, &role).await?;
            }
            UserAction::Role { email, role } => {
                commands::user::set_role(&email, &role).await?;
            }
        },
        Commands::Sync => commands::sync::run().await?,
        Commands::Cache { action } => match action {
            CacheAction::Bump => commands::cache::bump().await?,
        },
    }
    Ok(())
}
