//! Cart inspection and repair commands.
//!
//! # Usage
//!
//! ```bash
//! # Print a summary of a user's persisted cart
//! iw-cli cart show --user 4f0c...
//!
//! # Write the persisted snapshot as JSON (stdout or file)
//! iw-cli cart export --user 4f0c... --output cart.json
//!
//! # Replace the persisted cart with a JSON snapshot or contents file
//! iw-cli cart import --user 4f0c... --input cart.json [--force]
//!
//! # Delete the persisted cart
//! iw-cli cart clear --user 4f0c...
//! ```
//!
//! Imports are conditional on the version stored when the command started,
//! so a cart changed by a live session in the meantime is not overwritten
//! unless `--force` is given.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use iwishbag_cart::{
    CartContents, CartPersistence, CartSnapshot, PersistenceError, PgCartPersistence,
};
use iwishbag_core::UserId;
use iwishbag_storefront::db::create_pool;

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cart storage error.
    #[error("Cart storage error: {0}")]
    Persistence(#[from] PersistenceError),

    /// File could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input is not a cart snapshot.
    #[error("Invalid cart file: {0}")]
    InvalidInput(String),

    /// No cart stored for the user.
    #[error("No cart stored for user {0}")]
    NotFound(UserId),
}

/// Accepted import file layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    /// Output of `cart export`.
    Snapshot(CartSnapshot),
    /// Bare `{ "items": [...], "metadata": {...} }`.
    Contents(CartContents),
}

async fn connect() -> Result<PgCartPersistence, CartCommandError> {
    let database_url = super::storefront_database_url()
        .ok_or(CartCommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;
    Ok(PgCartPersistence::new(pool))
}

async fn load(
    persistence: &PgCartPersistence,
    user_id: UserId,
) -> Result<CartSnapshot, CartCommandError> {
    persistence
        .load_cart_state(user_id)
        .await?
        .ok_or(CartCommandError::NotFound(user_id))
}

/// Print a summary of the persisted cart.
///
/// # Errors
///
/// Returns `CartCommandError::NotFound` if the user has no stored cart.
pub async fn show(user_id: UserId) -> Result<(), CartCommandError> {
    let persistence = connect().await?;
    let snapshot = load(&persistence, user_id).await?;

    write_stdout(&render_summary(&snapshot))?;
    Ok(())
}

/// Write the persisted snapshot as pretty JSON to `output` or stdout.
///
/// # Errors
///
/// Returns `CartCommandError` if the cart is missing or the file cannot be
/// written.
pub async fn export(user_id: UserId, output: Option<&Path>) -> Result<(), CartCommandError> {
    let persistence = connect().await?;
    let snapshot = load(&persistence, user_id).await?;

    let json = serde_json::to_string_pretty(&snapshot).map_err(PersistenceError::from)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(
                "Exported cart of {} (version {}) to {}",
                user_id,
                snapshot.version,
                path.display()
            );
        }
        None => write_stdout(&json)?,
    }
    Ok(())
}

/// Replace the persisted cart with the contents of `input`.
///
/// # Errors
///
/// Returns `CartCommandError::InvalidInput` for malformed files and
/// `CartCommandError::Persistence` with a version conflict if the cart
/// changed while importing (without `force`).
pub async fn import(user_id: UserId, input: &Path, force: bool) -> Result<(), CartCommandError> {
    let raw = std::fs::read_to_string(input)?;
    let contents = parse_import(&raw)?;

    let persistence = connect().await?;
    let expected = if force {
        None
    } else {
        Some(
            persistence
                .load_cart_state(user_id)
                .await?
                .map_or(0, |s| s.version),
        )
    };

    let saved = persistence
        .save_cart_state(user_id, &contents, expected)
        .await?;
    tracing::info!(
        "Imported {} items for {} (version {})",
        saved.contents.items.len(),
        user_id,
        saved.version
    );
    Ok(())
}

/// Delete the persisted cart.
///
/// # Errors
///
/// Returns `CartCommandError::NotFound` if there was nothing to delete.
pub async fn clear(user_id: UserId) -> Result<(), CartCommandError> {
    let persistence = connect().await?;
    if !persistence.delete(user_id).await? {
        return Err(CartCommandError::NotFound(user_id));
    }
    tracing::info!("Deleted cart of {}", user_id);
    Ok(())
}

/// Parse an import file, rejecting carts with duplicate quotes.
fn parse_import(raw: &str) -> Result<CartContents, CartCommandError> {
    let file: ImportFile = serde_json::from_str(raw).map_err(|_| {
        CartCommandError::InvalidInput("expected an exported snapshot or cart contents".into())
    })?;
    let contents = match file {
        ImportFile::Snapshot(snapshot) => snapshot.contents,
        ImportFile::Contents(contents) => contents,
    };

    let mut seen = HashSet::new();
    if let Some(dup) = contents.items.iter().find(|item| !seen.insert(item.id)) {
        return Err(CartCommandError::InvalidInput(format!(
            "quote {} appears more than once",
            dup.id
        )));
    }
    Ok(contents)
}

/// Human-readable cart summary.
fn render_summary(snapshot: &CartSnapshot) -> String {
    let metadata = &snapshot.contents.metadata;
    let mut out = String::new();
    let _ = writeln!(out, "User:     {}", snapshot.user_id);
    let _ = writeln!(out, "Version:  {}", snapshot.version);
    let _ = writeln!(out, "Saved at: {}", snapshot.saved_at.to_rfc3339());
    let _ = writeln!(
        out,
        "Items:    {} (total ${})",
        snapshot.contents.items.len(),
        metadata.total_value_usd
    );
    for item in &snapshot.contents.items {
        let _ = writeln!(
            out,
            "  - {} {} -> {} ${}",
            item.quote.display_id,
            item.quote.origin_country,
            item.quote.destination_country,
            item.value_usd()
        );
    }
    out
}

fn write_stdout(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}
