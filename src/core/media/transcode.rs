use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use super::commands::{parse_progress_time, transcode_args};
use super::{MediaError, MediaResult, MediaToolkit};
use crate::core::progress::{ProgressHandle, ProgressSnapshot};

/// Transcode `input` to `width x height`, publishing progress under `task_id`.
///
/// Progress is derived from the `time=` field ffmpeg writes to stderr
/// relative to `duration_secs`. The task always ends with a `done` snapshot,
/// whether ffmpeg succeeded or not.
pub async fn transcode_with_progress(
    toolkit: &MediaToolkit,
    task_id: &str,
    input: &str,
    (width, height): (u32, u32),
    duration_secs: f64,
    output: &str,
    progress: ProgressHandle,
) -> MediaResult<()> {
    progress.report(task_id, ProgressSnapshot::new(0.0, "transcode started", false));

    let result = run(
        toolkit,
        task_id,
        input,
        (width, height),
        duration_secs,
        output,
        &progress,
    )
    .await;

    match &result {
        Ok(()) => {
            info!(task_id = %task_id, output = %output, "Transcode finished");
            progress.report(task_id, ProgressSnapshot::new(1.0, "transcode done", true));
        }
        Err(e) => {
            error!(task_id = %task_id, "Transcode failed: {}", e);
            let last = progress.query(task_id).map(|s| s.progress).unwrap_or(0.0);
            progress.report(
                task_id,
                ProgressSnapshot::new(last, format!("transcode failed: {e}"), true),
            );
        }
    }

    result
}

async fn run(
    toolkit: &MediaToolkit,
    task_id: &str,
    input: &str,
    (width, height): (u32, u32),
    duration_secs: f64,
    output: &str,
    progress: &ProgressHandle,
) -> MediaResult<()> {
    let args = transcode_args(input, width, height, output);
    info!("Executing command: {} {}", toolkit.ffmpeg(), args.join(" "));

    let mut child = Command::new(toolkit.ffmpeg())
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::Spawn {
            binary: toolkit.ffmpeg().to_string(),
            reason: e.to_string(),
        })?;

    let started = Instant::now();
    let mut tail = String::new();

    if let Some(stderr) = child.stderr.take() {
        let mut reader = BufReader::new(stderr);
        let mut segment = Vec::new();
        // ffmpeg rewrites its status line with carriage returns
        while reader.read_until(b'\r', &mut segment).await? > 0 {
            let line = String::from_utf8_lossy(&segment);
            if let Some(elapsed) = parse_progress_time(&line) {
                if duration_secs > 0.0 {
                    let fraction = (elapsed / duration_secs).clamp(0.0, 0.99) as f32;
                    progress.report(
                        task_id,
                        ProgressSnapshot::new(
                            fraction,
                            format!(
                                "transcoding {:.1}%, elapsed(ms): {}",
                                fraction * 100.0,
                                started.elapsed().as_millis()
                            ),
                            false,
                        ),
                    );
                }
            } else {
                tail = line.trim().to_string();
            }
            segment.clear();
        }
    } else {
        warn!(task_id = %task_id, "ffmpeg stderr not captured; progress unavailable");
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(MediaError::Failed {
            binary: toolkit.ffmpeg().to_string(),
            status: status.code().unwrap_or(-1),
            stderr: tail,
        });
    }
    Ok(())
}
