//! Yes/no questions the pipeline asks its caller

use async_trait::async_trait;
use std::fmt;

/// Question raised mid-operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The URL resolves to a playlist; download every entry?
    ExpandPlaylist { url: String },
    /// The downloaded container is not the target one; transcode?
    ConvertContainer { found: String, target: String },
}

impl Confirmation {
    /// Prompt text shown to the user
    pub fn prompt(&self) -> String {
        match self {
            Confirmation::ExpandPlaylist { .. } => {
                "This URL is a playlist. Do you want to download all videos?".to_string()
            }
            Confirmation::ConvertContainer { found, target } => format!(
                "The downloaded video is in format {}. Convert to {}?",
                found.to_uppercase(),
                target.to_uppercase()
            ),
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prompt())
    }
}

/// Capability injected into the orchestrator for answering [`Confirmation`]s.
///
/// Called at most twice per operation, never concurrently.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, question: Confirmation) -> bool;
}

/// Answers every question the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmer for FixedAnswer {
    async fn confirm(&self, question: Confirmation) -> bool {
        log::info!("{} -> {}", question, if self.0 { "yes" } else { "no" });
        self.0
    }
}
