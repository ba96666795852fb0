use std::path::Path;

use anyhow::{Context, Result};
use swo_config::SwitchoverConfig;
use swo_pg::TableSelection;

/// Read and validate the config file, resolving `${VAR}` references from the environment.
pub fn load_config(path: &Path) -> Result<SwitchoverConfig> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read {}. Run 'swo init' to create one.",
            path.display()
        )
    })?;

    SwitchoverConfig::load(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))
}

/// The `[tables]` section as a catalog selection.
pub fn table_selection(config: &SwitchoverConfig) -> TableSelection {
    TableSelection {
        schema: config.tables.schema.clone(),
        include: config.tables.include.clone(),
        skip: config.tables.skip.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("swo.toml");
        fs::write(
            &path,
            r#"
[source]
connection_string = "postgres://app@old-db/app"

[destination]
connection_string = "postgres://app@new-db/app"

[tables]
include = ["users", "alerts"]
skip = ["change_log"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let selection = table_selection(&config);

        assert_eq!(selection.schema, "public");
        assert_eq!(selection.include, vec!["users", "alerts"]);
        assert_eq!(selection.skip, vec!["change_log"]);
    }

    #[test]
    fn test_missing_file_suggests_init() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("swo.toml")).unwrap_err();

        assert!(err.to_string().contains("swo init"));
    }

    #[test]
    fn test_invalid_config_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("swo.toml");
        fs::write(
            &path,
            "[source]\nconnection_string = \"postgres://db/app\"\n\n[destination]\nconnection_string = \"postgres://db/app\"\n",
        )
        .unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config in"));
    }
}
