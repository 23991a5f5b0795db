//! Core utilities: configuration, errors, logging and process execution

pub mod config;
pub mod error;
pub mod logging;
pub mod process;

// Re-exports for convenience
pub use config::{Tool, ToolPaths};
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_tools_configuration};
pub use process::{KillSwitch, ProcessRunner, ToolCommand, ToolOutput, ToolRunner};
