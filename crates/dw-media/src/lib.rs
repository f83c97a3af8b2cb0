//! FFmpeg CLI wrappers for the DriveWatch analysis pipeline.
//!
//! Decoding is delegated to the `ffmpeg`/`ffprobe` binaries: probing reads
//! stream metadata as JSON, frame extraction pipes grayscale rawvideo at the
//! analysis sample rate, and event export cuts snapshots and short clips
//! around emitted events.

pub mod clip;
pub mod error;
pub mod frames;
pub mod probe;

pub use clip::{export_clip, export_snapshot};
pub use error::{MediaError, MediaResult};
pub use frames::{FrameStream, VideoFrame};
pub use probe::{probe_video, VideoInfo};
