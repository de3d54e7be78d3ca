//! # SQLite document store
//!
//! Keeps each record as a JSON body next to its version. Commits run inside
//! a `BEGIN IMMEDIATE` transaction guard so the precondition check and the
//! write cannot interleave with another writer.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use domains::{
    CommitOutcome, ContentError, DocumentStore, Precondition, Record, Result, Snapshot, Write,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT    NOT NULL,
    id         TEXT    NOT NULL,
    version    INTEGER NOT NULL,
    body       TEXT    NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS version_sequence (
    singleton INTEGER PRIMARY KEY CHECK (singleton = 0),
    value     INTEGER NOT NULL
);
INSERT OR IGNORE INTO version_sequence (singleton, value) VALUES (0, 0);
";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

fn unavailable(err: sqlx::Error) -> ContentError {
    ContentError::StoreUnavailable(err.to_string())
}

fn decode_body(body: &str) -> Result<Record> {
    serde_json::from_str(body).map_err(|e| ContentError::invalid("Record", e.to_string()))
}

fn encode_body(record: &Record) -> Result<String> {
    serde_json::to_string(record).map_err(|e| ContentError::invalid("Record", e.to_string()))
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database and applies the schema.
    /// An in-memory URL gets a single connection so every caller sees the same data.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(unavailable)?;
        tracing::info!(url, "sqlite document store ready");
        Ok(Self { pool })
    }

    async fn commit_in(
        conn: &mut SqliteConnection,
        collection: &str,
        id: &str,
        precondition: Precondition,
        write: Write,
    ) -> Result<CommitOutcome> {
        // 1. Current state
        let current = sqlx::query("SELECT version, body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(unavailable)?;
        let current_version = current.as_ref().map(|row| row.get::<i64, _>("version") as u64);

        // 2. Precondition
        let holds = match precondition {
            Precondition::None => true,
            Precondition::Exists => current_version.is_some(),
            Precondition::Version(expected) => current_version == Some(expected),
        };
        if !holds {
            return Ok(CommitOutcome::Rejected);
        }

        // 3. Write
        let record = match write {
            Write::Delete => {
                sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection)
                    .bind(id)
                    .execute(&mut *conn)
                    .await
                    .map_err(unavailable)?;
                return Ok(CommitOutcome::Committed { version: None });
            }
            Write::Set(record) => record,
            Write::Merge(fields) => {
                let mut base = match &current {
                    Some(row) => decode_body(&row.get::<String, _>("body"))?,
                    None => Record::new(),
                };
                base.extend(fields);
                base
            }
        };

        let version: i64 = sqlx::query_scalar(
            "UPDATE version_sequence SET value = value + 1 WHERE singleton = 0 RETURNING value",
        )
        .fetch_one(&mut *conn)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, version, body) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET version = excluded.version, body = excluded.body",
        )
        .bind(collection)
        .bind(id)
        .bind(version)
        .bind(encode_body(&record)?)
        .execute(&mut *conn)
        .await
        .map_err(unavailable)?;

        Ok(CommitOutcome::Committed {
            version: Some(version as u64),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
        let row = sqlx::query("SELECT version, body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                version: row.get::<i64, _>("version") as u64,
                record: decode_body(&row.get::<String, _>("body"))?,
            })),
            None => Ok(None),
        }
    }

    async fn commit(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        write: Write,
    ) -> Result<CommitOutcome> {
        // Dropping the guard (error or abandoned future) rolls the transaction back.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(unavailable)?;
        let outcome = Self::commit_in(&mut *tx, collection, id, precondition, write).await?;
        tx.commit().await.map_err(unavailable)?;
        tracing::debug!(collection, id, ?outcome, "sqlite commit");
        Ok(outcome)
    }
}
