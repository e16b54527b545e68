use std::sync::PoisonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Object {0} not found")]
    ObjectNotFound(String),

    #[error("Input {params} retrieves {count} objects")]
    GetMoreObjects { params: String, count: usize },

    #[error("Value {0} is required")]
    ValueRequired(String),

    #[error("{0:?} should be unique")]
    DuplicatedValue(Vec<String>),

    #[error("Internal failure: {0}")]
    SystemError(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::ObjectNotFound(msg.into())
    }

    pub fn system(msg: impl Into<String>) -> Self {
        AppError::SystemError(msg.into())
    }
}

impl<T> From<PoisonError<T>> for AppError
{
    fn from(e: PoisonError<T>) -> Self {
        AppError::Store(format!("Poison error: {:?}", e.to_string()))
    }
}
