//! Grayscale frame streaming at the analysis sample rate.
//!
//! FFmpeg decodes the clip, drops to `sample_fps` with the `fps` filter and
//! pipes `gray` rawvideo on stdout; each frame is exactly `width * height`
//! bytes, so the reader just slices the pipe.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// A single decoded grayscale frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Index in the sampled sequence (0-based)
    pub index: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Row-major gray8 pixels, `width * height` bytes
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Pixel value at (x, y); panics outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }
}

/// Streaming frame reader over one clip.
#[derive(Debug)]
pub struct FrameStream {
    path: PathBuf,
    info: VideoInfo,
    sample_fps: f64,
    child: Child,
    stdout: ChildStdout,
    next_index: u64,
    frame_len: usize,
}

impl FrameStream {
    /// Open a clip and start decoding at `sample_fps`.
    pub async fn open(path: impl AsRef<Path>, sample_fps: f64) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_video(&path).await?;

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let filter = format!("fps={},format=gray", sample_fps.max(0.1));
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args(["-vf", &filter, "-f", "rawvideo", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::InvalidVideo("FFmpeg stdout unavailable".to_string()))?;

        debug!(path = %path.display(), fps = sample_fps, "Opened frame stream");

        let frame_len = (info.width * info.height) as usize;
        Ok(Self {
            path,
            info,
            sample_fps,
            child,
            stdout,
            next_index: 0,
            frame_len,
        })
    }

    /// Clip metadata from the probe.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Sample rate this stream decodes at.
    pub fn sample_fps(&self) -> f64 {
        self.sample_fps
    }

    /// Read the next sampled frame; `None` at end of stream.
    pub async fn next_frame(&mut self) -> MediaResult<Option<VideoFrame>> {
        let mut data = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut data).await {
            Ok(_) => {
                let frame = VideoFrame {
                    index: self.next_index,
                    width: self.info.width,
                    height: self.info.height,
                    data,
                };
                self.next_index += 1;
                Ok(Some(frame))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish().await?;
                Ok(None)
            }
            Err(e) => Err(MediaError::unreadable(&self.path, e.to_string())),
        }
    }

    /// Reap the decoder after EOF.
    async fn finish(&mut self) -> MediaResult<()> {
        let status = self.child.wait().await?;
        if !status.success() && self.next_index == 0 {
            return Err(MediaError::unreadable(
                &self.path,
                format!("ffmpeg exited with {status}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_indexing() {
        let frame = VideoFrame {
            index: 0,
            width: 4,
            height: 2,
            data: vec![0, 1, 2, 3, 4, 5, 6, 7],
        };
        assert_eq!(frame.pixel(0, 0), 0);
        assert_eq!(frame.pixel(3, 0), 3);
        assert_eq!(frame.pixel(0, 1), 4);
        assert_eq!(frame.pixel(3, 1), 7);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = FrameStream::open("/nonexistent/clip.mp4", 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
