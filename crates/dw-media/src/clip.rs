//! Event snapshot and clip export.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

async fn run_ffmpeg(args: Vec<String>) -> MediaResult<()> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "export failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Export a single JPEG frame at `sec` seconds into the clip.
pub async fn export_snapshot(
    video: impl AsRef<Path>,
    sec: f64,
    out: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let out = out.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    ensure_parent(out)?;

    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format!("{:.3}", sec.max(0.0)),
        "-i".to_string(),
        video.display().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        out.display().to_string(),
    ];
    run_ffmpeg(args).await?;
    debug!(video = %video.display(), sec, out = %out.display(), "Exported snapshot");
    Ok(())
}

/// Export an H.264 clip covering `[start_sec, end_sec]`.
///
/// Re-encodes so the cut is frame-accurate and browser-playable.
pub async fn export_clip(
    video: impl AsRef<Path>,
    start_sec: f64,
    end_sec: f64,
    out: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let out = out.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    let start = start_sec.max(0.0);
    let duration = (end_sec - start).max(0.1);
    ensure_parent(out)?;

    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format!("{start:.3}"),
        "-i".to_string(),
        video.display().to_string(),
        "-t".to_string(),
        format!("{duration:.3}"),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-an".to_string(),
        out.display().to_string(),
    ];
    run_ffmpeg(args).await?;
    debug!(video = %video.display(), start, duration, out = %out.display(), "Exported clip");
    Ok(())
}
