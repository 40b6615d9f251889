use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::diagnostic::{Diagnostic, Stage};
use crate::io::FrameSource;
use crate::motion::{MotionEstimator, PreparedFrame};
use crate::pipeline::job::{CancelToken, DecodeErrorPolicy, JobFailure, PipelineOpts};
use crate::stabilize::{StabilizationParams, StabilizationPlan, Trajectory};

/// Result of the stabilization analysis pass.
#[derive(Debug)]
pub(crate) struct Analysis {
    pub(crate) plan: StabilizationPlan,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Sequential decode + motion estimation over `range`, then the stabilization plan.
///
/// Undecodable frames follow the decode policy; under `Skip` the motion into and out of the gap
/// is identity, so the trajectory stays contiguous.
#[tracing::instrument(level = "debug", skip_all, fields(start = range.start.0, end = range.end.0))]
pub(crate) fn analyze(
    params: &StabilizationParams,
    opts: &PipelineOpts,
    source: &mut dyn FrameSource,
    range: FrameRange,
    cancel: &CancelToken,
) -> Result<Analysis, JobFailure> {
    let estimator = MotionEstimator::new(params.estimator)
        .map_err(|e| JobFailure::error(Stage::Setup, None, e.to_string()))?;
    let mut trajectory = Trajectory::new(range.start);
    let mut diagnostics = Vec::new();
    let mut prev: Option<PreparedFrame> = None;
    let mut skipped = 0u64;

    for idx in range.iter() {
        if cancel.is_cancelled() {
            return Err(JobFailure::cancelled(Stage::Analyze));
        }
        let current = match source.read(idx) {
            Ok(frame) => Some(estimator.prepare(&frame)),
            Err(e) if opts.decode_policy == DecodeErrorPolicy::Fail => {
                return Err(JobFailure::error(Stage::Decode, Some(idx), e.to_string()));
            }
            Err(e) => {
                skipped += 1;
                if skipped > opts.max_skipped_frames {
                    return Err(JobFailure::error(
                        Stage::Decode,
                        Some(idx),
                        format!(
                            "{skipped} undecodable frames exceed the tolerance of {}",
                            opts.max_skipped_frames
                        ),
                    ));
                }
                tracing::warn!(frame = idx.0, "analysis skipped undecodable frame: {e}");
                diagnostics.push(Diagnostic::new(Stage::Analyze, Some(idx), e.to_string()));
                None
            }
        };
        if idx != range.start {
            let sample = match (&prev, &current) {
                (Some(p), Some(c)) => estimator.estimate_prepared(p, c),
                _ => estimator.estimate_missing(FrameIndex(idx.0 - 1), idx),
            };
            trajectory
                .push(&sample)
                .map_err(|e| JobFailure::error(Stage::Analyze, Some(idx), e.to_string()))?;
        }
        prev = current;
    }

    let info = source.info();
    let plan = StabilizationPlan::build(&trajectory, params, info.width, info.height)
        .map_err(|e| JobFailure::error(Stage::Analyze, None, e.to_string()))?;
    diagnostics.extend(plan.diagnostics().iter().cloned());
    tracing::debug!(
        frames = trajectory.len(),
        unreliable = trajectory.unreliable_count(),
        skipped,
        "analysis pass finished"
    );
    Ok(Analysis { plan, diagnostics })
}
