mod error;
mod switchover;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use switchover::{
    resolve_env_with, DatabaseConfig, SwitchoverConfig, SyncSettings, TablesConfig,
};
pub use validation::validate_config;
