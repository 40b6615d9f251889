//! Decode and encode services.
//!
//! A [`FrameSource`] hands out frames by index; a [`FrameSink`] consumes them in ascending index
//! order. Both are opaque to the pipeline: in-memory, PNG sequence and `ffmpeg` implementations
//! live here.

/// `ffmpeg`/`ffprobe` backed video source and MP4 sink.
pub mod ffmpeg;
/// PNG image sequences.
pub mod sequence;
/// Encode contract and in-memory sink.
pub mod sink;
/// Decode contract and in-memory source.
pub mod source;

pub use ffmpeg::{FfmpegSink, FfmpegSinkOpts, FfmpegSource, is_ffmpeg_on_path};
pub use sequence::{ImageSequenceSink, ImageSequenceSource, sequence_file_name};
pub use sink::{FrameSink, InMemorySink, SinkConfig, ensure_parent_dir};
pub use source::{DecodeError, FrameSource, InMemorySource, SourceInfo};
