/*!
SQLite Checkpointer

Async implementation of the [`Checkpointer`] trait backed by a SQLite pool.

## Behavior

- Uses the serde persistence models (see `runtimes::persistence`) for
  encoding state; database rows carry opaque `state_json`.
- Each `save` runs in one transaction: the thread row upsert and the
  checkpoint insert commit together, so a concurrent reader never observes
  a partially written checkpoint.
- When the `sqlite-migrations` feature is enabled (default), embedded
  migrations (`sqlx::migrate!("./migrations")`) run on connect; disabling
  the feature assumes external migration orchestration.

## Storage Growth

The chain is append-only and the core never deletes checkpoints; retention
is an operational concern. The schema keeps `created_at` per checkpoint and
`updated_at` per thread to support time-based cleanup policies, e.g.:

```bash
sqlite3 threads.db "DELETE FROM checkpoints WHERE created_at < datetime('now', '-30 days')"
sqlite3 threads.db "VACUUM"
```
*/

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::instrument;

use crate::runtimes::checkpointer::{
    Checkpoint, CheckpointQuery, Checkpointer, CheckpointerError, Result,
};
use crate::runtimes::persistence::{PersistedCheckpoint, PersistedState};
use crate::utils::json_ext::JsonSerializable;

/// Durable SQLite-backed checkpointer.
pub struct SqliteCheckpointer {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

impl SqliteCheckpointer {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: "sqlite://threads.db"
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CheckpointerError::Backend {
                message: format!("invalid database url: {e}"),
            })?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("connect error: {e}"),
            })?;
        // Run embedded migrations only if the feature is enabled (idempotent).
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(CheckpointerError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn decode_row(row: &SqliteRow) -> Result<Checkpoint> {
        let state_json: String = row
            .try_get("state_json")
            .map_err(|e| CheckpointerError::Backend {
                message: format!("state_json read: {e}"),
            })?;
        let checkpoint_id: i64 = row.get("checkpoint_id");
        let parent_id: Option<i64> = row.get("parent_id");
        let persisted = PersistedCheckpoint {
            thread_id: row.get("thread_id"),
            checkpoint_id: checkpoint_id as u64,
            parent_id: parent_id.map(|p| p as u64),
            node: row.get("node"),
            turn_id: row.get("turn_id"),
            state: PersistedState::from_json_str(&state_json).map_err(|e| {
                CheckpointerError::Serialization {
                    message: format!("state decode: {e}"),
                }
            })?,
            created_at: row.get("created_at"),
        };
        Checkpoint::try_from(persisted).map_err(|e| CheckpointerError::Other {
            message: format!("checkpoint convert: {e}"),
        })
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    #[instrument(skip(self, checkpoint), err)]
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let state_json =
            persisted
                .state
                .to_json_string()
                .map_err(|e| CheckpointerError::Serialization {
                    message: format!("state encode: {e}"),
                })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        sqlx::query(
            r#"
            INSERT INTO threads (id, last_checkpoint_id, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                last_checkpoint_id = excluded.last_checkpoint_id,
                updated_at = excluded.updated_at
        "#,
        )
        .bind(&persisted.thread_id)
        .bind(persisted.checkpoint_id as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("upsert thread: {e}"),
        })?;

        // INSERT OR REPLACE allows idempotent re-save of the same checkpoint.
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checkpoints (
                thread_id,
                checkpoint_id,
                parent_id,
                node,
                turn_id,
                state_json,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        )
        .bind(&persisted.thread_id)
        .bind(persisted.checkpoint_id as i64)
        .bind(persisted.parent_id.map(|p| p as i64))
        .bind(&persisted.node)
        .bind(&persisted.turn_id)
        .bind(&state_json)
        .bind(&persisted.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("insert checkpoint: {e}"),
        })?;

        tx.commit().await.map_err(|e| CheckpointerError::Backend {
            message: format!("tx commit: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row_opt: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, parent_id, node, turn_id, state_json, created_at
            FROM checkpoints
            WHERE thread_id = ?1
            ORDER BY checkpoint_id DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select latest: {e}"),
        })?;

        match row_opt {
            Some(row) => Ok(Some(Self::decode_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn load(&self, thread_id: &str, checkpoint_id: u64) -> Result<Option<Checkpoint>> {
        let row_opt: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, parent_id, node, turn_id, state_json, created_at
            FROM checkpoints
            WHERE thread_id = ?1 AND checkpoint_id = ?2
            "#,
        )
        .bind(thread_id)
        .bind(checkpoint_id as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select checkpoint: {e}"),
        })?;

        match row_opt {
            Some(row) => Ok(Some(Self::decode_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self, thread_id: &str, query: CheckpointQuery) -> Result<Vec<Checkpoint>> {
        // LIMIT -1 means "no limit" in SQLite; the contract is open-ended.
        let limit: i64 = query.limit.map(i64::from).unwrap_or(-1);
        let before: i64 = query.before.map(|b| b as i64).unwrap_or(i64::MAX);
        let rows: Vec<SqliteRow> = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, parent_id, node, turn_id, state_json, created_at
            FROM checkpoints
            WHERE thread_id = ?1 AND checkpoint_id < ?2
            ORDER BY checkpoint_id DESC
            LIMIT ?3
            "#,
        )
        .bind(thread_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select chain: {e}"),
        })?;

        rows.iter().map(Self::decode_row).collect()
    }
}
