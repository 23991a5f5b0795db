//! Download management: yt-dlp invocation, progress parsing and orchestration

pub mod confirm;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod request;
pub mod ytdlp;

// Re-exports for convenience
pub use confirm::{Confirmation, Confirmer, FixedAnswer};
pub use error::DownloadError;
pub use metadata::{fetch_metadata, VideoMetadata};
pub use orchestrator::{Completion, OperationState, Orchestrator};
pub use progress::ProgressEvent;
pub use request::{DownloadRequest, MediaFormat};
