use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error type for the binary and configuration layer
///
/// Pipeline failures stay typed as [`DownloadError`] inside the library and are
/// wrapped here only when they cross into `main`.
///
/// # Example
///
/// ```no_run
/// use mediagrab::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Download/conversion pipeline errors
    #[error("{0}")]
    Download(#[from] DownloadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors (bad env values, unresolved paths)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Stable identifier shown next to the message in the CLI
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Download(e) => e.code(),
            AppError::Io(_) => "ERR_IO",
            AppError::Json(_) => "ERR_JSON",
            AppError::Config(_) => "ERR_CONFIG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_keeps_its_code() {
        let err: AppError = DownloadError::Cancelled.into();
        assert_eq!(err.code(), "ERR_CANCELLED");
        assert_eq!(err.to_string(), DownloadError::Cancelled.to_string());
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("LOG_LEVEL=loud".to_string());
        assert_eq!(err.code(), "ERR_CONFIG");
        assert!(err.to_string().contains("LOG_LEVEL=loud"));
    }
}
