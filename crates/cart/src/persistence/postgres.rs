//! `PostgreSQL` persistence backend.
//!
//! # Table: `storefront.cart_snapshot`
//!
//! | Column       | Type          | Notes                         |
//! |--------------|---------------|-------------------------------|
//! | `user_id`    | `UUID`        | primary key                   |
//! | `payload`    | `JSONB`       | serialized [`CartContents`]   |
//! | `version`    | `BIGINT`      | bumped on every write         |
//! | `updated_at` | `TIMESTAMPTZ` |                               |
//!
//! Conditional saves use `UPDATE ... WHERE version = $expected`, so two
//! writers racing on the same base version cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use iwishbag_core::UserId;

use super::{CartPersistence, CartSnapshot, PersistenceError};
use crate::item::CartContents;

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    user_id: UserId,
    payload: Json<CartContents>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for CartSnapshot {
    type Error = PersistenceError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            contents: row.payload.0,
            version: version_from_db(row.version)?,
            saved_at: row.updated_at,
        })
    }
}

fn version_from_db(version: i64) -> Result<u64, PersistenceError> {
    u64::try_from(version)
        .map_err(|_| PersistenceError::DataCorruption(format!("negative cart version {version}")))
}

fn version_to_db(version: u64) -> Result<i64, PersistenceError> {
    i64::try_from(version)
        .map_err(|_| PersistenceError::DataCorruption(format!("cart version {version} overflows")))
}

/// Cart snapshots stored in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgCartPersistence {
    pool: PgPool,
}

impl PgCartPersistence {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Delete the stored cart for `user_id`. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM storefront.cart_snapshot WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stored_version(&self, user_id: UserId) -> Result<u64, PersistenceError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM storefront.cart_snapshot WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        version.map_or(Ok(0), version_from_db)
    }
}

#[async_trait]
impl CartPersistence for PgCartPersistence {
    #[instrument(skip(self))]
    async fn load_cart_state(
        &self,
        user_id: UserId,
    ) -> Result<Option<CartSnapshot>, PersistenceError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"
            SELECT user_id, payload, version, updated_at
            FROM storefront.cart_snapshot
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartSnapshot::try_from).transpose()
    }

    #[instrument(skip(self, contents), fields(items = contents.items.len()))]
    async fn save_cart_state(
        &self,
        user_id: UserId,
        contents: &CartContents,
        expected_version: Option<u64>,
    ) -> Result<CartSnapshot, PersistenceError> {
        let payload = Json(contents);

        let row = match expected_version {
            None => Some(
                sqlx::query_as::<_, SnapshotRow>(
                    r"
                    INSERT INTO storefront.cart_snapshot (user_id, payload, version, updated_at)
                    VALUES ($1, $2, 1, NOW())
                    ON CONFLICT (user_id) DO UPDATE
                    SET payload = EXCLUDED.payload,
                        version = storefront.cart_snapshot.version + 1,
                        updated_at = NOW()
                    RETURNING user_id, payload, version, updated_at
                    ",
                )
                .bind(user_id)
                .bind(payload)
                .fetch_one(&self.pool)
                .await?,
            ),
            Some(0) => {
                sqlx::query_as::<_, SnapshotRow>(
                    r"
                    INSERT INTO storefront.cart_snapshot (user_id, payload, version, updated_at)
                    VALUES ($1, $2, 1, NOW())
                    ON CONFLICT (user_id) DO NOTHING
                    RETURNING user_id, payload, version, updated_at
                    ",
                )
                .bind(user_id)
                .bind(payload)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query_as::<_, SnapshotRow>(
                    r"
                    UPDATE storefront.cart_snapshot
                    SET payload = $2, version = version + 1, updated_at = NOW()
                    WHERE user_id = $1 AND version = $3
                    RETURNING user_id, payload, version, updated_at
                    ",
                )
                .bind(user_id)
                .bind(payload)
                .bind(version_to_db(expected)?)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match row {
            Some(row) => CartSnapshot::try_from(row),
            None => {
                let actual = self.stored_version(user_id).await?;
                Err(PersistenceError::VersionConflict {
                    expected: expected_version.unwrap_or_default(),
                    actual,
                })
            }
        }
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
