//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod shell;

pub use config::Settings;
pub use context::{Environment, Os};
pub use diagnostic::Diagnostic;
pub use shell::Shell;
