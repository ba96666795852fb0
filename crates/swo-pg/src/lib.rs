pub mod catalog;
mod connect;
mod connection;
mod error;

pub use catalog::{discover_tables, table_exists, TableSelection};
pub use connect::redact;
pub use connection::{PgConnection, PgTransaction};
pub use error::{PgError, PgResult};
