//! Warelay shared library: config, the session gateway client, the processing
//! service client, and the relay runtime used by the CLI.

pub mod config;
pub mod init;
pub mod processor;
pub mod relay;
pub mod runtime;
pub mod session;
