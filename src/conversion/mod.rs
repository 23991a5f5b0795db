//! Post-download conversion: duration probing and re-encoding to MP4.
//!
//! Conversion only applies to video downloads whose container is not already
//! the target. The duration is needed up front so ffmpeg's `out_time` can be
//! turned into a percentage.

pub mod video;

use std::path::Path;

use crate::core::config::Tool;
use crate::core::process::{discard_lines, KillSwitch, ToolCommand, ToolRunner};
use crate::download::error::DownloadError;

/// ffprobe invocation printing only the container duration in seconds
pub fn duration_probe_command(prober: &Path, input: &Path) -> ToolCommand {
    ToolCommand::new(Tool::DurationProbe, prober)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input.to_string_lossy())
}

/// Parses ffprobe's duration output.
///
/// # Returns
/// * `Some(seconds)` - Finite and strictly positive
/// * `None` - Empty, `N/A`, zero, negative or otherwise unparsable
pub fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Get media duration using ffprobe
pub async fn probe_duration(
    runner: &dyn ToolRunner,
    prober: &Path,
    input: &Path,
    kill_switch: &KillSwitch,
) -> Result<f64, DownloadError> {
    let command = duration_probe_command(prober, input);
    let output = runner.run(&command, discard_lines(), kill_switch).await?;

    let raw = output.stdout_text();
    match parse_duration(&raw) {
        Some(secs) => {
            log::debug!("Duration of {}: {:.2}s", input.display(), secs);
            Ok(secs)
        }
        None => Err(DownloadError::DurationUnreadable {
            path: input.to_path_buf(),
            raw: raw.trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("125.40\n"), Some(125.4));
        assert_eq!(parse_duration("  3  "), Some(3.0));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("-4.2"), None);
        assert_eq!(parse_duration("inf"), None);
        assert_eq!(parse_duration("NaN"), None);
    }

    #[test]
    fn test_duration_probe_command() {
        let cmd = duration_probe_command(Path::new("ffprobe"), Path::new("clip.webm"));
        assert_eq!(cmd.tool, Tool::DurationProbe);
        assert_eq!(
            cmd.args,
            vec![
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "clip.webm",
            ]
        );
    }
}
