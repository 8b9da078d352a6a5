//! Error types shared by the tutor crates

use thiserror::Error;

/// Result alias used by bootstrap and database helpers
pub type Result<T> = std::result::Result<T, Error>;

/// Bootstrap-level failures.
///
/// Anything surfaced here happens before or beneath the request path:
/// opening the database, reading the TOML file, resolving credentials.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite / sqlx failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (root folder creation, config file read)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file exists but does not parse
    #[error("Invalid TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing or invalid configuration (API key, admin identity, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}
