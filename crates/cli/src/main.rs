//! iwishBag CLI - database migrations and cart maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! iw-cli migrate storefront
//!
//! # Inspect, export, import or delete a user's persisted cart
//! iw-cli cart show --user <uuid>
//! iw-cli cart export --user <uuid> --output cart.json
//! iw-cli cart import --user <uuid> --input cart.json
//! iw-cli cart clear --user <uuid>
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Operate on persisted cart snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use iwishbag_core::UserId;

mod commands;

#[derive(Parser)]
#[command(name = "iw-cli")]
#[command(author, version, about = "iwishBag CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Operate on persisted carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print a summary of a user's cart
    Show {
        /// User ID (UUID)
        #[arg(short, long)]
        user: UserId,
    },
    /// Write a user's cart snapshot as JSON
    Export {
        /// User ID (UUID)
        #[arg(short, long)]
        user: UserId,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace a user's cart from a JSON file
    Import {
        /// User ID (UUID)
        #[arg(short, long)]
        user: UserId,

        /// Snapshot or contents JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Overwrite even if the cart changed since it was read
        #[arg(long)]
        force: bool,
    },
    /// Delete a user's cart
    Clear {
        /// User ID (UUID)
        #[arg(short, long)]
        user: UserId,
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
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show { user } => commands::cart::show(user).await?,
            CartAction::Export { user, output } => {
                commands::cart::export(user, output.as_deref()).await?;
            }
            CartAction::Import { user, input, force } => {
                commands::cart::import(user, &input, force).await?;
            }
            CartAction::Clear { user } => commands::cart::clear(user).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cart_import() {
        let user = UserId::generate();
        let cli = Cli::try_parse_from([
            "iw-cli",
            "cart",
            "import",
            "--user",
            &user.to_string(),
            "--input",
            "cart.json",
            "--force",
        ])
        .unwrap();

        match cli.command {
            Commands::Cart {
                action:
                    CartAction::Import {
                        user: parsed,
                        input,
                        force,
                    },
            } => {
                assert_eq!(parsed, user);
                assert_eq!(input, PathBuf::from("cart.json"));
                assert!(force);
            }
            _ => panic!("expected cart import"),
        }
    }

    #[test]
    fn test_rejects_invalid_user() {
        assert!(Cli::try_parse_from(["iw-cli", "cart", "show", "--user", "nope"]).is_err());
    }
}
