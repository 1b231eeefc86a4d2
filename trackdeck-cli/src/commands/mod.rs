//! CLI command implementations.

pub mod common;
pub mod config;
pub mod export;
pub mod init;
pub mod login;
pub mod probe;
pub mod run;
pub mod watch;
