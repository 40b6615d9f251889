//! framelab is a frame processing and stabilization pipeline.
//!
//! - Build an [`EffectStack`] and evaluate it per frame through an [`EffectRegistry`]
//! - Estimate motion with [`MotionEstimator`], track points with [`PointTracker`]
//! - Stabilize with a [`StabilizationPlan`] built from a smoothed [`Trajectory`]
//! - Export ranges with [`Pipeline::run`] or in the background with [`ExportController`]
//! - Preview single frames through a [`PreviewSession`] sharing the [`FrameCache`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Byte-budgeted LRU cache of processed frames.
pub mod cache;
/// JSON project configuration.
pub mod config;
/// Effect stack, parameters and registry.
pub mod effects;
/// Background export jobs.
pub mod export;
/// Stable configuration fingerprints.
pub mod fingerprint;
/// Frame, range, error and math primitives.
pub mod foundation;
/// Decode and encode services.
pub mod io;
/// Motion estimation and point tracking.
pub mod motion;
/// Job scheduling.
pub mod pipeline;
/// Interactive single-frame preview.
pub mod preview;
/// Trajectory smoothing and frame correction.
pub mod stabilize;

pub use crate::cache::{CacheKey, CacheStats, FrameCache};
pub use crate::config::{Marker, ProjectConfig};
pub use crate::effects::{
    EffectKind, EffectOp, EffectParams, EffectRegistry, EffectSpec, EffectStack, Evaluated,
    ParamValue,
};
pub use crate::export::{ExportController, JobHandle, JobSnapshot, ProgressEvent};
pub use crate::fingerprint::Fingerprint;
pub use crate::foundation::core::{Fps, FrameIndex, FrameRange, Point, Rect, Vec2};
pub use crate::foundation::diagnostic::{Diagnostic, Stage};
pub use crate::foundation::error::{FramelabError, FramelabResult};
pub use crate::foundation::frame::{Frame, PixelFormat};
pub use crate::foundation::math::Mat3;
pub use crate::io::{
    DecodeError, FfmpegSink, FfmpegSinkOpts, FfmpegSource, FrameSink, FrameSource,
    ImageSequenceSink, ImageSequenceSource, InMemorySink, InMemorySource, SinkConfig, SourceInfo,
};
pub use crate::motion::{
    EstimatorParams, MotionEstimator, MotionModel, MotionSample, PointTracker, Strategy, TrackLog,
    TrackPoint, TrackerParams,
};
pub use crate::pipeline::{
    CancelToken, DecodeErrorPolicy, Destination, FailureKind, Job, JobFailure, JobId, JobStatus,
    Pipeline, PipelineOpts, PipelineReport, Progress,
};
pub use crate::preview::{PreviewFrame, PreviewSession};
pub use crate::stabilize::{
    BorderPolicy, CropRect, StabilizationParams, StabilizationPlan, Trajectory,
};
