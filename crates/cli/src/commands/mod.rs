//! CLI subcommand implementations.

pub mod cart;
pub mod migrate;

use secrecy::SecretString;

/// Storefront database URL from `STOREFRONT_DATABASE_URL` or `DATABASE_URL`.
fn storefront_database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
