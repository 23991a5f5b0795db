//! Test doubles for the external tools and the confirmation port
//!
//! The orchestrator only talks to `ToolRunner` and `Confirmer`, so these
//! replace yt-dlp, ffprobe, ffmpeg and the user entirely.

pub mod fake_runner;

pub use fake_runner::{
    install_fake_tools, Call, FakeFailure, FakeRunner, PendingConfirmer, Script, ScriptedConfirmer,
};
