//! Table descriptors handed to the sync engine by the schema catalog.

use serde::{Deserialize, Serialize};

/// A table participating in a switch-over.
pub trait Table: Send + Sync {
    /// Name used in progress messages and errors.
    fn name(&self) -> &str;

    /// Identifier safe to splice into dynamically built SQL.
    fn quoted_name(&self) -> String;

    /// Whether the table is left out of the data copy.
    fn skip_sync(&self) -> bool;
}

/// A schema-qualified table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub schema: String,
    pub name: String,
    /// Tables managed by the switch-over itself (or otherwise not user data).
    #[serde(default)]
    pub skip: bool,
}

impl TableDef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            skip: false,
        }
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }
}

impl Table for TableDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn quoted_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    fn skip_sync(&self) -> bool {
        self.skip
    }
}

/// Quote an identifier using Postgres rules (double quotes, embedded quotes doubled).
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
