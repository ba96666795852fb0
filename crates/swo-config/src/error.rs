use thiserror::Error;

/// Errors that can occur when parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("environment variable '{name}' is not set")]
    MissingEnvVar { name: String },

    #[error("unterminated '${{' in {field}")]
    UnterminatedVariable { field: String },

    #[error("{side} connection string is empty")]
    EmptyConnectionString { side: String },

    #[error("source and destination point at the same database")]
    SameDatabase,

    #[error("progress_interval_secs must be greater than zero")]
    InvalidProgressInterval,

    #[error("pipe_capacity must be greater than zero")]
    InvalidPipeCapacity,

    #[error("maintenance statement must not be empty")]
    EmptyMaintenance,

    #[error("tables.schema must not be empty")]
    EmptySchema,

    #[error("table '{table}' is listed in both include and skip")]
    ConflictingTable { table: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
