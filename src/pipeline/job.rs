use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::effects::EffectStack;
use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::foundation::diagnostic::{Diagnostic, Stage};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::io::{
    FfmpegSink, FfmpegSinkOpts, FrameSink, ImageSequenceSink, InMemorySink, SourceInfo,
};
use crate::stabilize::StabilizationParams;

/// Identifier assigned to a job by its submitter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a job: `Idle → Running → {Completed, Cancelled, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, not started.
    Idle,
    /// Stages are running.
    Running,
    /// Every frame of the range was written or skipped.
    Completed,
    /// Stopped on request.
    Cancelled,
    /// Stopped by an error.
    Failed,
}

impl JobStatus {
    /// `true` for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition. Terminal states are final.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            Self::Idle => matches!(next, Self::Running | Self::Cancelled | Self::Failed),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Cancelled | Self::Failed => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where an exported job writes its frames.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    /// Keep frames in memory (discarded unless the caller supplies its own sink).
    #[default]
    Memory,
    /// MP4 through the system `ffmpeg`.
    Mp4 {
        /// Output file.
        path: PathBuf,
        /// Replace an existing file.
        #[serde(default)]
        overwrite: bool,
    },
    /// `frame_000000.png`, `frame_000001.png`, ... in a directory.
    ImageSequence {
        /// Output directory.
        dir: PathBuf,
    },
}

impl Destination {
    /// Sink writing to this destination.
    pub fn open_sink(&self) -> Box<dyn FrameSink> {
        match self {
            Self::Memory => Box::new(InMemorySink::new()),
            Self::Mp4 { path, overwrite } => {
                let mut opts = FfmpegSinkOpts::new(path.clone());
                opts.overwrite = *overwrite;
                Box::new(FfmpegSink::new(opts))
            }
            Self::ImageSequence { dir } => Box::new(ImageSequenceSink::new(dir.clone())),
        }
    }
}

/// What the decode stage does with a frame it cannot read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Leave a gap: the frame is not written, motion across it is identity.
    #[default]
    Skip,
    /// Fail the job.
    Fail,
}

/// Scheduler settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOpts {
    /// Process workers; `0` uses the available parallelism.
    pub workers: usize,
    /// Capacity of the decode → process and process → encode queues.
    pub queue_capacity: usize,
    /// Frames that may be decoded but not yet written; bounds the reorder buffer.
    pub reorder_window: usize,
    /// Granularity of every blocking queue operation, in milliseconds.
    pub queue_timeout_ms: u64,
    /// A stage waiting longer than this fails the job, in milliseconds.
    pub stall_timeout_ms: u64,
    /// Decode failure handling.
    pub decode_policy: DecodeErrorPolicy,
    /// Skipped frames tolerated before the job fails.
    pub max_skipped_frames: u64,
    /// Output frame rate; defaults to the source rate.
    pub fps: Option<Fps>,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 8,
            reorder_window: 32,
            queue_timeout_ms: 50,
            stall_timeout_ms: 30_000,
            decode_policy: DecodeErrorPolicy::Skip,
            max_skipped_frames: 16,
            fps: None,
        }
    }
}

impl PipelineOpts {
    /// Reject zero capacities and timeouts.
    pub fn validate(&self) -> FramelabResult<()> {
        if self.queue_capacity == 0 {
            return Err(FramelabError::validation("queue_capacity must be >= 1"));
        }
        if self.reorder_window == 0 {
            return Err(FramelabError::validation("reorder_window must be >= 1"));
        }
        if self.queue_timeout_ms == 0 {
            return Err(FramelabError::validation("queue_timeout_ms must be >= 1"));
        }
        if self.stall_timeout_ms < self.queue_timeout_ms {
            return Err(FramelabError::validation(
                "stall_timeout_ms must be >= queue_timeout_ms",
            ));
        }
        Ok(())
    }

    /// Worker count after resolving `0`.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// [`PipelineOpts::queue_timeout_ms`] as a duration.
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    /// [`PipelineOpts::stall_timeout_ms`] as a duration.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

/// Immutable snapshot of everything a run needs. Changing the configuration means a new job.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Job {
    /// Identity used in progress events and reports.
    pub id: JobId,
    /// Effects applied to every frame.
    pub effects: EffectStack,
    /// Stabilization applied after the effects.
    pub stabilization: StabilizationParams,
    /// Frames to process; `None` covers the whole source.
    pub range: Option<FrameRange>,
    /// Output target used by [`crate::ExportController::submit`].
    pub destination: Destination,
    /// Scheduler settings.
    pub pipeline: PipelineOpts,
}

impl Job {
    /// Job over the whole source with default settings.
    pub fn new(id: JobId, effects: EffectStack) -> Self {
        Self {
            id,
            effects,
            ..Self::default()
        }
    }

    /// Range this job covers for `info`, validated against the source length.
    pub fn resolve_range(&self, info: &SourceInfo) -> FramelabResult<FrameRange> {
        resolve_range(self.range, info)
    }
}

/// `range`, or the whole source when `None`, checked to be ordered, non-empty and inside the
/// source.
pub(crate) fn resolve_range(
    range: Option<FrameRange>,
    info: &SourceInfo,
) -> FramelabResult<FrameRange> {
    let range = match range {
        // Fields are public and deserialized unchecked, so re-validate the bounds.
        Some(r) => FrameRange::new(r.start, r.end)?,
        None => FrameRange::first(info.frame_count),
    };
    if range.is_empty() {
        return Err(FramelabError::validation("range must be non-empty"));
    }
    if range.end.0 > info.frame_count {
        return Err(FramelabError::validation(format!(
            "range ends at frame {} but the source has {} frames",
            range.end, info.frame_count
        )));
    }
    Ok(range)
}

/// Cooperative cancellation flag shared between a job and its controller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Progress after an encode emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Progress {
    /// Job reporting.
    pub job: JobId,
    /// Frames written to the sink.
    pub written: u64,
    /// Frames skipped after decode failures.
    pub skipped: u64,
    /// Frames in the job range.
    pub total: u64,
}

impl Progress {
    /// Handled frames over total, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        ((self.written + self.skipped) as f64 / self.total as f64).min(1.0)
    }
}

/// Outcome of a run. Also attached to failures, describing the partial output.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineReport {
    /// Job reported on.
    pub job: JobId,
    /// Range processed.
    pub range: Option<FrameRange>,
    /// Size of the written frames.
    pub output_size: (u32, u32),
    /// Frames pushed to the sink.
    pub frames_written: u64,
    /// Frames left out after decode failures.
    pub frames_skipped: u64,
    /// Processed frames served from the cache.
    pub cache_hits: u64,
    /// Whether stabilization corrections were applied.
    pub stabilized: bool,
    /// Non-fatal conditions, analysis first, then in frame order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Why a run stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The cancel token was triggered.
    Cancelled,
    /// A stage hit an unrecoverable error.
    Error,
}

/// A run that ended `Cancelled` or `Failed`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobFailure {
    /// Cancelled or failed.
    pub kind: FailureKind,
    /// Stage that stopped the job.
    pub stage: Stage,
    /// Frame being handled, when known.
    pub frame: Option<FrameIndex>,
    /// Description.
    pub message: String,
    /// What was written before the job stopped.
    pub report: PipelineReport,
}

impl JobFailure {
    pub(crate) fn error(stage: Stage, frame: Option<FrameIndex>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Error,
            stage,
            frame,
            message: message.into(),
            report: PipelineReport::default(),
        }
    }

    pub(crate) fn cancelled(stage: Stage) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            stage,
            frame: None,
            message: "cancelled".to_owned(),
            report: PipelineReport::default(),
        }
    }

    /// Terminal status this failure maps to.
    pub fn status(&self) -> JobStatus {
        match self.kind {
            FailureKind::Cancelled => JobStatus::Cancelled,
            FailureKind::Error => JobStatus::Failed,
        }
    }

    /// `true` when the job was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage", self.stage)?;
        if let Some(frame) = self.frame {
            write!(f, " at frame {frame}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for JobFailure {}

impl From<JobFailure> for FramelabError {
    fn from(f: JobFailure) -> Self {
        match f.kind {
            FailureKind::Cancelled => FramelabError::Cancelled,
            FailureKind::Error => FramelabError::Other(anyhow::anyhow!(f.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/job.rs"]
mod tests;
