use crate::error::{ConfigError, ConfigResult};
use crate::switchover::SwitchoverConfig;

/// Validate a switch-over configuration after environment references are resolved.
pub fn validate_config(config: &SwitchoverConfig) -> ConfigResult<()> {
    validate_databases(config)?;
    validate_tables(config)?;
    validate_sync(config)?;
    Ok(())
}

fn validate_databases(config: &SwitchoverConfig) -> ConfigResult<()> {
    let source = config.source.connection_string.trim();
    let destination = config.destination.connection_string.trim();

    if source.is_empty() {
        return Err(ConfigError::EmptyConnectionString {
            side: "source".to_string(),
        });
    }
    if destination.is_empty() {
        return Err(ConfigError::EmptyConnectionString {
            side: "destination".to_string(),
        });
    }
    if source == destination {
        return Err(ConfigError::SameDatabase);
    }
    Ok(())
}

fn validate_tables(config: &SwitchoverConfig) -> ConfigResult<()> {
    if config.tables.schema.trim().is_empty() {
        return Err(ConfigError::EmptySchema);
    }
    if let Some(table) = config
        .tables
        .include
        .iter()
        .find(|t| config.tables.skip.contains(t))
    {
        return Err(ConfigError::ConflictingTable {
            table: table.clone(),
        });
    }
    Ok(())
}

fn validate_sync(config: &SwitchoverConfig) -> ConfigResult<()> {
    if config.sync.progress_interval_secs == 0 {
        return Err(ConfigError::InvalidProgressInterval);
    }
    if config.sync.pipe_capacity == 0 {
        return Err(ConfigError::InvalidPipeCapacity);
    }
    if config.sync.maintenance.trim().is_empty() {
        return Err(ConfigError::EmptyMaintenance);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> SwitchoverConfig {
        let toml = format!(
            r#"
[source]
connection_string = "postgres://old/app"

[destination]
connection_string = "postgres://new/app"
{}
"#,
            extra
        );
        SwitchoverConfig::parse(&toml).unwrap()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&config("")).is_ok());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut c = config("");
        c.destination.connection_string = c.source.connection_string.clone();
        assert!(matches!(validate_config(&c), Err(ConfigError::SameDatabase)));
    }

    #[test]
    fn test_empty_connection_string() {
        let mut c = config("");
        c.source.connection_string = "  ".to_string();
        let err = validate_config(&c).unwrap_err();
        assert_eq!(err.to_string(), "source connection string is empty");
    }

    #[test]
    fn test_include_skip_conflict() {
        let c = config("[tables]\ninclude = [\"users\"]\nskip = [\"users\"]\n");
        assert!(matches!(
            validate_config(&c),
            Err(ConfigError::ConflictingTable { ref table }) if table == "users"
        ));
    }

    #[test]
    fn test_sync_settings_rejected() {
        let c = config("[sync]\nprogress_interval_secs = 0\n");
        assert!(matches!(
            validate_config(&c),
            Err(ConfigError::InvalidProgressInterval)
        ));

        let c = config("[sync]\npipe_capacity = 0\n");
        assert!(matches!(validate_config(&c), Err(ConfigError::InvalidPipeCapacity)));

        let c = config("[sync]\nmaintenance = \"\"\n");
        assert!(matches!(validate_config(&c), Err(ConfigError::EmptyMaintenance)));
    }
}
