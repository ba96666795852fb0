use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::info;

const ENV_EXAMPLE: &str = r#"# swo environment variables
# Copy this file to .env and fill in your values

# The live database being copied
SOURCE_DATABASE_URL=

# The new instance receiving the copy
DEST_DATABASE_URL=
"#;

const CONFIG_TEMPLATE: &str = r#"[source]
connection_string = "${SOURCE_DATABASE_URL}"

[destination]
connection_string = "${DEST_DATABASE_URL}"

[tables]
schema = "public"
# Tables to copy, in order. Empty means every base table in the schema.
include = []
# Tables never copied.
skip = []

[sync]
progress_interval_secs = 2
pipe_capacity = 16
maintenance = "VACUUM ANALYZE"
"#;

pub fn cmd_init(config_path: &Path) -> Result<()> {
    println!("Initializing swo in current directory...\n");

    write_if_absent(Path::new(".env.example"), ENV_EXAMPLE)?;
    write_if_absent(config_path, CONFIG_TEMPLATE)?;

    println!("\nNext: copy .env.example to .env, fill it in, then run 'swo check'.");
    Ok(())
}

/// Returns whether the file was written.
fn write_if_absent(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        println!("{} already exists, skipping", path.display());
        return Ok(false);
    }

    fs::write(path, content)?;
    info!("Created {}", path.display());
    println!("Created {}", path.display());
    Ok(true)
}
