//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Tool availability report at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config::{Tool, ToolPaths};

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Filter applied to both sinks
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str, level: LevelFilter) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs where each external tool is expected and whether it is there.
///
/// Purely informational; the orchestrator performs the binding check itself
/// before every operation.
pub fn log_tools_configuration(tools: &ToolPaths) {
    for tool in [Tool::Downloader, Tool::Transcoder, Tool::DurationProbe] {
        let path = tools.path_of(tool);
        if path.is_file() {
            log::info!("{}: {}", tool, path.display());
        } else {
            log::warn!("{}: {} (NOT FOUND)", tool, path.display());
        }
    }
}
