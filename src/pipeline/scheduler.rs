use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

use crate::cache::FrameCache;
use crate::effects::EffectRegistry;
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::diagnostic::{Diagnostic, Stage};
use crate::foundation::error::FramelabError;
use crate::foundation::frame::Frame;
use crate::io::{FrameSink, FrameSource, SinkConfig};
use crate::pipeline::analysis::analyze;
use crate::pipeline::job::{
    CancelToken, DecodeErrorPolicy, Job, JobFailure, JobId, PipelineOpts, PipelineReport, Progress,
};
use crate::pipeline::process::FrameProcessor;
use crate::pipeline::reorder::ReorderBuffer;

/// Runs jobs: an optional stabilization analysis pass, then concurrent
/// decode → process → encode stages.
///
/// Decode and encode are sequential; process runs on `workers` scoped threads. The encoder
/// restores frame order with a reorder buffer whose size is capped by admission credits.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    registry: EffectRegistry,
}

enum Slot {
    Frame {
        frame: Frame,
        diagnostics: Vec<Diagnostic>,
        cached: bool,
    },
    Skipped(Diagnostic),
}

type Done = (FrameIndex, Slot);

/// Stop flags, first failure and bounded-wait helpers shared by every stage.
struct Control<'a> {
    cancel: &'a CancelToken,
    halt: AtomicBool,
    failure: Mutex<Option<JobFailure>>,
    queue_timeout: Duration,
    stall_timeout: Duration,
}

impl<'a> Control<'a> {
    fn new(cancel: &'a CancelToken, opts: &PipelineOpts) -> Self {
        Self {
            cancel,
            halt: AtomicBool::new(false),
            failure: Mutex::new(None),
            queue_timeout: opts.queue_timeout(),
            stall_timeout: opts.stall_timeout(),
        }
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.halt.load(Ordering::Acquire)
    }

    fn halt(&self) {
        self.halt.store(true, Ordering::Release);
    }

    /// Record the first failure and stop every stage.
    fn fail(&self, stage: Stage, frame: Option<FrameIndex>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%stage, frame = frame.map(|f| f.0), "{message}");
        let mut slot = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(JobFailure::error(stage, frame, message));
        }
        drop(slot);
        self.halt();
    }

    fn take_failure(&self) -> Option<JobFailure> {
        self.failure.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn stalled(&self, stage: Stage, frame: Option<FrameIndex>, since: Instant) -> bool {
        let waited = since.elapsed();
        if waited < self.stall_timeout {
            return false;
        }
        self.fail(
            stage,
            frame,
            format!("stalled for {} ms waiting on a queue", waited.as_millis()),
        );
        true
    }

    /// Blocking send in `queue_timeout` slices. `false` when the job is stopping or the
    /// receiver is gone.
    fn send<T>(&self, tx: &Sender<T>, msg: T, stage: Stage, frame: FrameIndex) -> bool {
        let since = Instant::now();
        let mut msg = msg;
        loop {
            match tx.send_timeout(msg, self.queue_timeout) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.should_stop() || self.stalled(stage, Some(frame), since) {
                        return false;
                    }
                    msg = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Blocking receive in `queue_timeout` slices. `None` when the job is stopping or every
    /// sender is gone.
    fn recv<T>(&self, rx: &Receiver<T>, stage: Stage, frame: Option<FrameIndex>) -> Option<T> {
        let since = Instant::now();
        loop {
            match rx.recv_timeout(self.queue_timeout) {
                Ok(v) => return Some(v),
                Err(RecvTimeoutError::Timeout) => {
                    if self.should_stop() || self.stalled(stage, frame, since) {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

#[derive(Default)]
struct Tally {
    written: u64,
    skipped: u64,
    cache_hits: u64,
    diagnostics: Vec<Diagnostic>,
}

impl Pipeline {
    /// Pipeline with the built-in effects.
    pub fn new() -> Self {
        Self::with_registry(EffectRegistry::with_builtins())
    }

    /// Pipeline resolving effect kinds through `registry`.
    pub fn with_registry(registry: EffectRegistry) -> Self {
        Self { registry }
    }

    /// Effect table used by process workers.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Run `job` from `source` into `sink`.
    ///
    /// `progress` is called on the calling thread after every frame the encoder handles. Once
    /// `begin` succeeded, `sink.end()` is called exactly once whatever the outcome.
    #[tracing::instrument(level = "debug", skip_all, fields(job = %job.id))]
    pub fn run(
        &self,
        job: &Job,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cache: &FrameCache,
        cancel: &CancelToken,
        progress: &dyn Fn(Progress),
    ) -> Result<PipelineReport, JobFailure> {
        let setup = |e: FramelabError| JobFailure::error(Stage::Setup, None, e.to_string());
        job.pipeline.validate().map_err(setup)?;
        job.stabilization.validate().map_err(setup)?;
        let info = source.info();
        let range = job.resolve_range(&info).map_err(setup)?;

        let mut report = PipelineReport {
            job: job.id,
            range: Some(range),
            ..PipelineReport::default()
        };
        let with_report = |mut f: JobFailure, report: &PipelineReport| {
            f.report = report.clone();
            f
        };

        let plan = if job.stabilization.enabled {
            let analysis = analyze(&job.stabilization, &job.pipeline, source, range, cancel)
                .map_err(|f| with_report(f, &report))?;
            report.diagnostics.extend(analysis.diagnostics);
            Some(analysis.plan)
        } else {
            None
        };

        let (eff_w, eff_h) = job.effects.output_size(info.width, info.height, &self.registry);
        let origin = job.effects.output_origin(info.width, info.height, &self.registry);
        report.output_size = match &plan {
            Some(p) => p.output_size_for(eff_w, eff_h, origin),
            None => (eff_w, eff_h),
        };
        report.stabilized = plan.is_some();

        if cancel.is_cancelled() {
            return Err(with_report(JobFailure::cancelled(Stage::Setup), &report));
        }
        let cfg = SinkConfig {
            width: report.output_size.0,
            height: report.output_size.1,
            fps: job.pipeline.fps.unwrap_or(info.fps),
            format: info.format,
        };
        sink.begin(cfg).map_err(|e| {
            with_report(JobFailure::error(Stage::Encode, None, e.to_string()), &report)
        })?;

        let processor = FrameProcessor::new(
            source.fingerprint(),
            &job.effects,
            &self.registry,
            &job.stabilization,
            plan.as_ref(),
            info.width,
            info.height,
        );
        let workers = job.pipeline.effective_workers();
        tracing::debug!(
            frames = range.len_frames(),
            workers,
            width = cfg.width,
            height = cfg.height,
            stabilized = report.stabilized,
            "pipeline started"
        );

        let ctl = Control::new(cancel, &job.pipeline);
        let tally = std::thread::scope(|scope| {
            let cap = job.pipeline.queue_capacity;
            let window = job.pipeline.reorder_window;
            let (raw_tx, raw_rx) = bounded::<Frame>(cap);
            let (done_tx, done_rx) = bounded::<Done>(cap);
            let (credit_tx, credit_rx) = bounded::<()>(window);
            for _ in 0..window {
                let _ = credit_tx.try_send(());
            }

            let ctl = &ctl;
            let opts = &job.pipeline;
            let decode = {
                let done_tx = done_tx.clone();
                scope.spawn(move || decode_stage(source, range, opts, raw_tx, done_tx, credit_rx, ctl))
            };
            let mut process = Vec::with_capacity(workers);
            for _ in 0..workers {
                let raw_rx = raw_rx.clone();
                let done_tx = done_tx.clone();
                process.push(scope.spawn(move || {
                    process_stage(processor, cache, raw_rx, done_tx, ctl);
                }));
            }
            drop(raw_rx);
            drop(done_tx);

            let tally = encode_stage(job.id, range, sink, done_rx, &credit_tx, ctl, progress);
            ctl.halt();
            if decode.join().is_err() {
                ctl.fail(Stage::Decode, None, "decode thread panicked");
            }
            for h in process {
                if h.join().is_err() {
                    ctl.fail(Stage::Process, None, "process worker panicked");
                }
            }
            tally
        });

        report.frames_written = tally.written;
        report.frames_skipped = tally.skipped;
        report.cache_hits = tally.cache_hits;
        report.diagnostics.extend(tally.diagnostics);

        let end = sink.end();
        let handled = tally.written + tally.skipped;
        tracing::debug!(
            written = tally.written,
            skipped = tally.skipped,
            cache_hits = tally.cache_hits,
            "pipeline stopped"
        );

        if let Some(failure) = ctl.take_failure() {
            if let Err(e) = end {
                tracing::warn!("sink finalization after failure also failed: {e}");
            }
            return Err(with_report(failure, &report));
        }
        if let Err(e) = end {
            return Err(with_report(
                JobFailure::error(Stage::Encode, None, e.to_string()),
                &report,
            ));
        }
        if handled < range.len_frames() {
            if cancel.is_cancelled() {
                return Err(with_report(JobFailure::cancelled(Stage::Encode), &report));
            }
            return Err(with_report(
                JobFailure::error(
                    Stage::Encode,
                    Some(FrameIndex(range.start.0 + handled)),
                    "pipeline stopped before the end of the range",
                ),
                &report,
            ));
        }
        Ok(report)
    }
}

fn decode_stage(
    source: &mut dyn FrameSource,
    range: FrameRange,
    opts: &PipelineOpts,
    raw_tx: Sender<Frame>,
    done_tx: Sender<Done>,
    credits: Receiver<()>,
    ctl: &Control<'_>,
) {
    let mut skipped = 0u64;
    for idx in range.iter() {
        if ctl.recv(&credits, Stage::Decode, Some(idx)).is_none() || ctl.should_stop() {
            return;
        }
        match source.read(idx) {
            Ok(frame) => {
                if !ctl.send(&raw_tx, frame, Stage::Decode, idx) {
                    return;
                }
            }
            Err(e) if opts.decode_policy == DecodeErrorPolicy::Fail => {
                ctl.fail(Stage::Decode, Some(idx), e.to_string());
                return;
            }
            Err(e) => {
                skipped += 1;
                if skipped > opts.max_skipped_frames {
                    ctl.fail(
                        Stage::Decode,
                        Some(idx),
                        format!(
                            "{skipped} undecodable frames exceed the tolerance of {}",
                            opts.max_skipped_frames
                        ),
                    );
                    return;
                }
                tracing::warn!(frame = idx.0, "skipping undecodable frame: {e}");
                let slot = Slot::Skipped(Diagnostic::new(Stage::Decode, Some(idx), e.to_string()));
                if !ctl.send(&done_tx, (idx, slot), Stage::Decode, idx) {
                    return;
                }
            }
        }
    }
    tracing::debug!(skipped, "decode stage finished");
}

fn process_stage(
    processor: FrameProcessor<'_>,
    cache: &FrameCache,
    raw_rx: Receiver<Frame>,
    done_tx: Sender<Done>,
    ctl: &Control<'_>,
) {
    while let Some(frame) = ctl.recv(&raw_rx, Stage::Process, None) {
        if ctl.should_stop() {
            return;
        }
        let idx = frame.index();
        let slot = match processor.process(&frame, cache) {
            Ok(p) => Slot::Frame {
                frame: p.frame,
                diagnostics: p.diagnostics,
                cached: p.cached,
            },
            Err(e) => {
                ctl.fail(Stage::Process, Some(idx), e.to_string());
                return;
            }
        };
        if !ctl.send(&done_tx, (idx, slot), Stage::Process, idx) {
            return;
        }
    }
}

fn encode_stage(
    job: JobId,
    range: FrameRange,
    sink: &mut dyn FrameSink,
    done_rx: Receiver<Done>,
    credits: &Sender<()>,
    ctl: &Control<'_>,
    progress: &dyn Fn(Progress),
) -> Tally {
    let total = range.len_frames();
    let mut reorder = ReorderBuffer::new(range);
    let mut tally = Tally::default();
    while !reorder.is_done() && !ctl.should_stop() {
        let Some((idx, slot)) = ctl.recv(&done_rx, Stage::Encode, Some(reorder.next())) else {
            break;
        };
        if reorder.insert(idx, slot).is_err() {
            ctl.fail(
                Stage::Encode,
                Some(idx),
                "frame reached the encoder twice or outside the job range",
            );
            break;
        }
        while let Some((idx, slot)) = reorder.pop_ready() {
            if ctl.should_stop() {
                return tally;
            }
            match slot {
                Slot::Frame {
                    frame,
                    diagnostics,
                    cached,
                } => {
                    if let Err(e) = sink.push_frame(idx, &frame) {
                        ctl.fail(Stage::Encode, Some(idx), e.to_string());
                        return tally;
                    }
                    tally.written += 1;
                    tally.cache_hits += u64::from(cached);
                    tally.diagnostics.extend(diagnostics);
                }
                Slot::Skipped(diagnostic) => {
                    tally.skipped += 1;
                    tally.diagnostics.push(diagnostic);
                }
            }
            let _ = credits.try_send(());
            progress(Progress {
                job,
                written: tally.written,
                skipped: tally.skipped,
                total,
            });
        }
        tracing::trace!(parked = reorder.len(), "encoder waiting");
    }
    tally
}
