mod check;
mod init;
mod sync;
mod tables;

pub use check::cmd_check;
pub use init::cmd_init;
pub use sync::cmd_sync;
pub use tables::cmd_tables;
