use thiserror::Error;

/// Errors raised by the pool, the wrappers and the storage engine.
///
/// The message strings of the lifecycle, validation and transaction variants
/// are part of the observable contract and must not be reworded.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("pool not opened or already closed")]
    PoolClosed,

    #[error("pool already created or opened")]
    PoolOpened,

    #[error("failed to create pool")]
    CreateFailed,

    #[error("failed to open pool")]
    OpenFailed,

    #[error("invalid characters")]
    InvalidCharacters,

    #[error("invalid PersistentObject")]
    InvalidObject,

    #[error("Invalid array length")]
    InvalidArrayLength,

    #[error("key not found")]
    KeyNotFound,

    #[error("unsupported type")]
    UnsupportedType,

    #[error("transaction aborted")]
    TransactionAborted,

    #[error("{0} is not a function")]
    NotAFunction(&'static str),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

impl<T> From<std::sync::PoisonError<T>> for PoolError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
