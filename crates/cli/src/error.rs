//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means no scenario has been run yet.
    #[error("database not found at {path}. Run 'charter run' first")]
    DatabaseNotFound { path: PathBuf },

    /// No transaction was found matching the given prefix.
    #[error("no transaction found matching '{prefix}'")]
    TransactionNotFound { prefix: String },

    /// Multiple transactions match the given prefix.
    ///
    /// The user should provide a longer prefix to disambiguate.
    #[error("multiple transactions match '{prefix}': {matches:?}")]
    AmbiguousTransaction {
        prefix: String,
        matches: Vec<String>,
    },

    /// The scenario file is invalid or names something unknown.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid hex input: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
