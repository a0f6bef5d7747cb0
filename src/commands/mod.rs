//! CLI command handlers
//!
//! The binary only parses arguments; each subcommand's work lives here.

pub mod init;
pub mod vendor;
