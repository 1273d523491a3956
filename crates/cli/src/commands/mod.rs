//! CLI subcommand implementations.

pub mod chat;
pub mod config_cmd;
pub mod runtime;
