//! CLI command implementations.

pub mod compare;
pub mod configure;
pub mod entry;
pub mod init;
pub mod rekey;
pub mod status;
pub mod sync;
pub mod watch;
