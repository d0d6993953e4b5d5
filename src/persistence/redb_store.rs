use redb::Database;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Persistence error family. Wraps the redb error types plus the JSON
/// codec used for record values.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("data integrity error: {0}")]
    Integrity(String),
}

/// Thin handle over the embedded redb database. Higher layers open
/// read/write transactions through it and own the table definitions.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        info!("settlement database opened");
        Ok(Self { db: Arc::new(db) })
    }

    pub fn begin_write(&self) -> Result<redb::WriteTransaction<'_>, StoreError> {
        Ok(self.db.begin_write()?)
    }

    pub fn begin_read(&self) -> Result<redb::ReadTransaction<'_>, StoreError> {
        Ok(self.db.begin_read()?)
    }
}
