// ABOUTME: Library root for cutover - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod check;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod maintenance;
pub mod output;
pub mod release;
pub mod scm;
pub mod shell;
pub mod ssh;
pub mod strategy;
pub mod transaction;
