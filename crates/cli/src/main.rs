//! Pickup CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! pickup-cli migrate
//!
//! # Mint an API bearer token for a user (printed once)
//! pickup-cli session create --user 6f1c... --ttl-hours 24
//!
//! # Stop or resume issuing tokens for a shop
//! pickup-cli shop deactivate --shop 0b9e...
//! pickup-cli shop activate --shop 0b9e...
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use pickup_core::{ShopId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "pickup-cli")]
#[command(author, version, about = "Pickup token service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage API sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Manage shops
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create a bearer token for a user
    Create {
        /// User ID the token authenticates as
        #[arg(short, long)]
        user: UserId,

        /// Hours until the token expires
        #[arg(short, long, default_value_t = 720)]
        ttl_hours: u32,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Accept new tokens
    Activate {
        #[arg(short, long)]
        shop: ShopId,
    },
    /// Reject new tokens
    Deactivate {
        #[arg(short, long)]
        shop: ShopId,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Session { action } => match action {
            SessionAction::Create { user, ttl_hours } => {
                commands::session::create(user, ttl_hours).await?;
            }
        },
        Commands::Shop { action } => match action {
            ShopAction::Activate { shop } => commands::shop::set_active(shop, true).await?,
            ShopAction::Deactivate { shop } => commands::shop::set_active(shop, false).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_session_defaults() {
        let cli = Cli::try_parse_from([
            "pickup-cli",
            "session",
            "create",
            "--user",
            "6f1c2d3e-4b5a-4c6d-8e7f-0a1b2c3d4e5f",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::Session {
                action: SessionAction::Create { ttl_hours, .. },
            } => assert_eq!(ttl_hours, 720),
            _ => panic!("expected session create"),
        }
    }

    #[test]
    fn test_rejects_bad_shop_id() {
        assert!(Cli::try_parse_from(["pickup-cli", "shop", "activate", "--shop", "bakery"]).is_err());
    }
}
