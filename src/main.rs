use anyhow::Result;
use dotenvy::dotenv;
use std::io::Write;
use std::sync::Arc;
use tokio::signal;

use mediagrab::cli::{answer_from_flags, Cli, Commands, TerminalConfirmer};
use mediagrab::core::config::{self, expand_path, ToolPaths};
use mediagrab::core::{init_logger, log_tools_configuration, AppError, ProcessRunner};
use mediagrab::download::{
    fetch_metadata, Completion, DownloadRequest, MediaFormat, Orchestrator, ProgressEvent,
};

/// Main entry point for the command-line front-end
///
/// # Errors
/// Returns an error if initialization fails or the operation does not succeed.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env before any config static is read
    let _ = dotenv();

    let cli = Cli::parse_args();

    let level = config::log_level_filter(&config::LOG_LEVEL)?;
    init_logger(&config::LOG_FILE_PATH, level)?;

    let tools = match cli.tools_dir.as_deref() {
        Some(dir) => ToolPaths::in_dir(expand_path(dir)),
        None => ToolPaths::from_env()?,
    };
    log_tools_configuration(&tools);

    match cli.command {
        Commands::Download {
            url,
            format,
            output,
            yes,
            no,
        } => run_download(tools, url, format, output, answer_from_flags(yes, no)).await,
        Commands::Info { url, json } => run_info(tools, url, json).await,
    }
}

/// Runs one download, stopping it on Ctrl-C
async fn run_download(
    tools: ToolPaths,
    url: String,
    format: MediaFormat,
    output: Option<String>,
    answer: Option<bool>,
) -> Result<()> {
    let output_dir = output
        .map(|o| expand_path(&o))
        .unwrap_or_else(config::default_output_dir);
    let request = DownloadRequest::new(&url, output_dir, format).map_err(AppError::from)?;

    println!("🎬 mediagrab");
    println!("URL: {}", request.url());
    println!("Format: {}", request.format());
    println!("Output: {}", request.output_dir().display());

    let orchestrator = Orchestrator::new(
        tools,
        Arc::new(ProcessRunner::new()),
        Arc::new(TerminalConfirmer::new(answer)),
    );

    let operation = orchestrator.start_operation(request, print_progress());
    tokio::pin!(operation);

    let result = tokio::select! {
        result = &mut operation => result,
        _ = signal::ctrl_c() => {
            println!("\n⏹ Stopping...");
            orchestrator.stop_operation();
            operation.await
        }
    };
    println!();

    match result.map_err(AppError::from) {
        Ok(Completion::Audio { output_dir }) => println!("✅ Audio saved to {}", output_dir.display()),
        Ok(Completion::AlreadyTarget(path)) => println!("✅ Saved {}", path.display()),
        Ok(Completion::KeptNative(path)) => println!("✅ Kept original format: {}", path.display()),
        Ok(Completion::Converted { output, source_removed }) => {
            println!("✅ Converted to {}", output.display());
            if !source_removed {
                println!("⚠️ The original file could not be deleted");
            }
        }
        Err(e) => return Err(anyhow::anyhow!("[{}] {}", e.code(), e)),
    }

    Ok(())
}

/// Progress printer redrawing one status line in place
fn print_progress() -> impl FnMut(ProgressEvent) + Send + 'static {
    let mut last_status = String::new();
    move |event: ProgressEvent| {
        let mut status = event.status_text();
        if !event.size.is_empty() {
            status = format!("{} of {}", status, event.size);
        }
        if event.percent == 0.0 && !event.phase.is_empty() {
            println!("\n📄 {}", event.phase);
        }
        if status != last_status {
            print!("\r{:<60}", status);
            let _ = std::io::stdout().flush();
            last_status = status;
        }
    }
}

/// Prints title and thumbnail of a URL
async fn run_info(tools: ToolPaths, url: String, json: bool) -> Result<()> {
    let runner = ProcessRunner::new();
    let metadata = fetch_metadata(&runner, &tools.downloader, &url)
        .await
        .ok_or_else(|| anyhow::anyhow!("Failed to get info for {}", url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata).map_err(AppError::from)?);
    } else {
        println!("Title: {}", metadata.title.as_deref().unwrap_or("(unknown)"));
        println!("Thumbnail: {}", metadata.thumbnail_url.as_deref().unwrap_or("(none)"));
    }

    Ok(())
}
