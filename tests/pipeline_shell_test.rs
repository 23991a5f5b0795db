//! Full pipeline through real child processes, with shell scripts posing as
//! yt-dlp, ffprobe and ffmpeg.
//!
//! Kept to a single test so no other test thread forks while the scripts are
//! being written (which can make exec fail with ETXTBSY).

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use mediagrab::core::config::ToolPaths;
use mediagrab::core::ProcessRunner;
use mediagrab::download::{
    fetch_metadata, Completion, DownloadRequest, FixedAnswer, MediaFormat, Orchestrator, ProgressEvent,
};

const FAKE_YTDLP: &str = r#"#!/bin/sh
if [ "$1" = "--flat-playlist" ]; then
    echo '{"_type": "video", "id": "abc"}'
    exit 0
fi
if [ "$1" = "-J" ]; then
    echo '{"id": "abc", "title": "Shell Clip", "thumbnail": "https://img/abc.jpg"}'
    exit 0
fi
tpl=""
while [ $# -gt 0 ]; do
    if [ "$1" = "-o" ]; then tpl="$2"; fi
    shift
done
dir=$(dirname "$tpl")
echo "[download] Destination: $dir/Shell Clip.webm"
printf '[download]  50.0%% of 2.00MiB at 1.00MiB/s ETA 00:01\r'
printf '[download] 100.0%% of 2.00MiB at 1.00MiB/s ETA 00:00\n'
echo "WARNING: this is only a warning" 1>&2
: > "$dir/Shell Clip.webm"
exit 0
"#;

const FAKE_FFPROBE: &str = r#"#!/bin/sh
echo 125.40
"#;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
echo "ffmpeg version n6.1 Copyright (c) the FFmpeg developers" 1>&2
echo "out_time=00:01:02.700000"
echo "progress=continue"
echo "out_time=00:02:05.400000"
echo "progress=end"
: > "$last"
"#;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn test_video_download_and_conversion_through_real_processes() {
    let tools_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let tools = ToolPaths::in_dir(tools_dir.path());
    write_script(&tools.downloader, FAKE_YTDLP);
    write_script(&tools.prober, FAKE_FFPROBE);
    write_script(&tools.transcoder, FAKE_FFMPEG);

    let runner = Arc::new(ProcessRunner::new());

    let metadata = fetch_metadata(runner.as_ref(), &tools.downloader, "https://example.com/v")
        .await
        .unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Shell Clip"));
    assert_eq!(metadata.thumbnail_url.as_deref(), Some("https://img/abc.jpg"));

    let orchestrator = Orchestrator::new(tools, runner, Arc::new(FixedAnswer(true)));
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let request = DownloadRequest::new("https://example.com/v", out_dir.path(), MediaFormat::Video).unwrap();
    let result = orchestrator
        .start_operation(request, move |event: ProgressEvent| sink.lock().unwrap().push(event))
        .await
        .unwrap();

    let webm = out_dir.path().join("Shell Clip.webm");
    let mp4 = out_dir.path().join("Shell Clip.mp4");
    assert_eq!(
        result,
        Completion::Converted {
            output: mp4.clone(),
            source_removed: true,
        }
    );
    assert!(mp4.exists());
    assert!(!webm.exists());

    let events = events.lock().unwrap();
    let statuses: Vec<String> = events.iter().map(ProgressEvent::status_text).collect();
    assert_eq!(
        statuses,
        vec![
            "Downloading... 0.0%",
            "Downloading... 50.0%",
            "Finishing...",
            "Converting... 50.0%",
            "Converting... 100.0%",
            "Finishing...",
        ]
    );
    assert_eq!(events[0].phase, "Shell Clip.webm");
    assert_eq!(events[1].size, "2.00MiB");
}
