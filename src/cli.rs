use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

use crate::download::confirm::{Confirmation, Confirmer};
use crate::download::request::MediaFormat;

#[derive(Parser)]
#[command(name = "mediagrab")]
#[command(author, version, about = "Download and convert media with yt-dlp and ffmpeg", long_about = None)]
pub struct Cli {
    /// Directory holding yt-dlp, ffmpeg and ffprobe (overrides MEDIAGRAB_TOOLS_DIR)
    #[arg(long, global = true)]
    pub tools_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a URL; video that is not MP4 can be converted afterwards
    Download {
        /// Media or playlist URL
        url: String,

        /// audio (mp3) or video (mp4)
        #[arg(short, long, default_value = "video")]
        format: MediaFormat,

        /// Output folder (default: DOWNLOAD_FOLDER, then ~/Videos)
        #[arg(short, long)]
        output: Option<String>,

        /// Answer yes to every question (playlist, conversion)
        #[arg(short, long, conflicts_with = "no")]
        yes: bool,

        /// Answer no to every question
        #[arg(short, long)]
        no: bool,
    },

    /// Show title and thumbnail of a URL
    Info {
        /// Media URL
        url: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Maps `--yes` / `--no` to a fixed answer, `None` means ask interactively
pub fn answer_from_flags(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// "y" or "yes" in any case; everything else, including an empty line, is no
pub fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Asks questions on the terminal unless an answer was fixed by flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmer {
    auto_answer: Option<bool>,
}

impl TerminalConfirmer {
    pub fn new(auto_answer: Option<bool>) -> Self {
        Self { auto_answer }
    }
}

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, question: Confirmation) -> bool {
        if let Some(answer) = self.auto_answer {
            println!("❓ {} {}", question.prompt(), if answer { "[yes]" } else { "[no]" });
            return answer;
        }

        // A plain thread, not the blocking pool: an unanswered prompt must not
        // keep the runtime alive after Ctrl-C
        let prompt = question.prompt();
        let (tx, rx) = oneshot::channel();
        std::thread::spawn(move || {
            let _ = tx.send(ask_stdin(&prompt));
        });
        rx.await.unwrap_or(false)
    }
}

fn ask_stdin(prompt: &str) -> bool {
    print!("\n❓ {} [y/N] ", prompt);
    if let Err(e) = io::stdout().flush() {
        log::debug!("Failed to flush stdout: {}", e);
    }

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => parse_answer(&line),
        Err(e) => {
            log::warn!("Failed to read answer: {}", e);
            false
        }
    }
}
