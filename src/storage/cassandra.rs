//! Cassandra Storage Backend
//!
//! Maps the adapter contract onto one CQL table:
//!
//! ```text
//! CREATE TABLE <keyspace>.<table> (
//!     key   blob PRIMARY KEY,
//!     value blob
//! );
//! ```
//!
//! Expiry is the table's native per-row TTL (`USING TTL`), read back with
//! `TTL(value)`. A `NULL` TTL means the row never expires. Every statement is
//! prepared once at startup and runs at `QUORUM` through the session's
//! default execution profile.

use crate::storage::adapter::{
    Expiry, Record, RemainingTtl, Storage, StorageError, StorageOp, StorageResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::Consistency;
use scylla::{ExecutionProfile, Session, SessionBuilder};
use tracing::{debug, info};

/// Connection settings for the column store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CassandraConfig {
    /// Contact points, `host` or `host:port` (port defaults to 9042).
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub table: String,
}

/// The prepared statements for one table.
struct Statements {
    get: PreparedStatement,
    insert: PreparedStatement,
    insert_with_ttl: PreparedStatement,
    delete: PreparedStatement,
    count: PreparedStatement,
}

/// Storage backend over a shared CQL session.
pub struct CassandraStore {
    session: Session,
    statements: Statements,
    table: String,
}

impl std::fmt::Debug for CassandraStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraStore")
            .field("table", &self.table)
            .finish()
    }
}

impl CassandraStore {
    /// Opens a session and prepares every statement.
    pub async fn connect(config: &CassandraConfig) -> StorageResult<Self> {
        let profile = ExecutionProfile::builder()
            .consistency(Consistency::Quorum)
            .build();

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .use_keyspace(&config.keyspace, false)
            .default_execution_profile_handle(profile.into_handle())
            .build()
            .await
            .map_err(|e| StorageError::new(StorageOp::Connect, e))?;

        info!(
            hosts = ?config.hosts,
            keyspace = %config.keyspace,
            "connected to storage cluster"
        );

        let statements = Statements::prepare(&session, &config.table).await?;
        debug!(table = %config.table, "prepared statements");

        Ok(Self {
            session,
            statements,
            table: config.table.clone(),
        })
    }
}

impl Statements {
    async fn prepare(session: &Session, table: &str) -> StorageResult<Self> {
        let prepare = |cql: String| async move {
            session
                .prepare(cql)
                .await
                .map_err(|e| StorageError::new(StorageOp::Prepare, e))
        };

        Ok(Self {
            get: prepare(format!("SELECT value, TTL(value) FROM {table} WHERE key = ?")).await?,
            insert: prepare(format!("INSERT INTO {table} (key, value) VALUES (?, ?)")).await?,
            insert_with_ttl: prepare(format!(
                "INSERT INTO {table} (key, value) VALUES (?, ?) USING TTL ?"
            ))
            .await?,
            delete: prepare(format!("DELETE FROM {table} WHERE key IN ?")).await?,
            count: prepare(format!("SELECT COUNT(*) FROM {table} WHERE key IN ?")).await?,
        })
    }
}

/// Borrows a key list as CQL blob values for an `IN ?` bind.
fn blob_list(keys: &[Bytes]) -> Vec<&[u8]> {
    keys.iter().map(|k| k.as_ref()).collect()
}

/// Converts a `TTL(value)` column into the remaining lifetime.
fn remaining_from_column(ttl: Option<i32>) -> RemainingTtl {
    match ttl {
        None => RemainingTtl::Persistent,
        Some(secs) => RemainingTtl::Seconds(secs.max(0) as u32),
    }
}

#[async_trait]
impl Storage for CassandraStore {
    fn backend_tag(&self) -> &'static str {
        "cassandra"
    }

    async fn get(&self, key: &[u8]) -> StorageResult<Option<Record>> {
        let result = self
            .session
            .execute_unpaged(&self.statements.get, (key,))
            .await
            .map_err(|e| StorageError::new(StorageOp::Get, e))?;

        let row = result
            .maybe_first_row_typed::<(Vec<u8>, Option<i32>)>()
            .map_err(|e| StorageError::new(StorageOp::Get, e))?;

        Ok(row.map(|(value, ttl)| Record {
            value: Bytes::from(value),
            ttl: remaining_from_column(ttl),
        }))
    }

    async fn set(&self, key: &[u8], value: &[u8], expiry: Expiry) -> StorageResult<()> {
        let outcome = if expiry.is_none() {
            self.session
                .execute_unpaged(&self.statements.insert, (key, value))
                .await
        } else {
            self.session
                .execute_unpaged(
                    &self.statements.insert_with_ttl,
                    (key, value, expiry.secs() as i32),
                )
                .await
        };

        outcome
            .map(|_| ())
            .map_err(|e| StorageError::new(StorageOp::Set, e))
    }

    async fn delete(&self, keys: &[Bytes]) -> StorageResult<()> {
        self.session
            .execute_unpaged(&self.statements.delete, (blob_list(keys),))
            .await
            .map(|_| ())
            .map_err(|e| StorageError::new(StorageOp::Delete, e))
    }

    async fn count(&self, keys: &[Bytes]) -> StorageResult<u64> {
        let result = self
            .session
            .execute_unpaged(&self.statements.count, (blob_list(keys),))
            .await
            .map_err(|e| StorageError::new(StorageOp::Count, e))?;

        let (count,) = result
            .single_row_typed::<(i64,)>()
            .map_err(|e| StorageError::new(StorageOp::Count, e))?;

        Ok(count.max(0) as u64)
    }
}
