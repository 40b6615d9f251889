use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::cache::FrameCache;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::io::{FrameSink, FrameSource};
use crate::pipeline::{CancelToken, Job, JobFailure, JobId, JobStatus, Pipeline, PipelineReport};

/// Status change or progress of a job, broadcast to subscribers.
///
/// Events of one job arrive in order; fractions never decrease. Consumers should tolerate
/// repeated values.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    /// Job concerned.
    pub job: JobId,
    /// Handled frames over total.
    pub fraction: f64,
    /// Status at the time of the event.
    pub status: JobStatus,
}

/// Point-in-time view of a submitted job.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobSnapshot {
    /// Job id.
    pub id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Last reported progress fraction.
    pub progress: f64,
    /// Cancellation or failure details once the job stopped early.
    pub failure: Option<JobFailure>,
    /// Report of a completed job.
    pub report: Option<PipelineReport>,
}

impl JobSnapshot {
    /// Report of the job, partial for cancelled and failed jobs.
    pub fn output(&self) -> Option<&PipelineReport> {
        self.report
            .as_ref()
            .or_else(|| self.failure.as_ref().map(|f| &f.report))
    }
}

struct JobState {
    snapshot: Mutex<JobSnapshot>,
    changed: Condvar,
}

impl JobState {
    fn lock(&self) -> MutexGuard<'_, JobSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to a submitted job.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    cancel: CancelToken,
    state: Arc<JobState>,
}

impl JobHandle {
    /// Id of the job.
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Subscribers {
    senders: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl Subscribers {
    fn broadcast(&self, event: ProgressEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(event).is_ok());
    }
}

/// Runs jobs on background threads over a shared frame cache.
///
/// Every job gets its own thread and cancel token. Progress and status changes are observable by
/// polling a [`JobHandle`] or through [`ExportController::subscribe`].
pub struct ExportController {
    pipeline: Pipeline,
    cache: Arc<FrameCache>,
    subscribers: Arc<Subscribers>,
}

impl ExportController {
    /// Controller running `pipeline` against `cache`.
    pub fn new(pipeline: Pipeline, cache: Arc<FrameCache>) -> Self {
        Self {
            pipeline,
            cache,
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// Shared frame cache.
    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    /// Receive every future [`ProgressEvent`] of every job.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Start `job`, writing to the sink its [`crate::Destination`] opens.
    pub fn submit(&self, job: Job, source: Box<dyn FrameSource>) -> FramelabResult<JobHandle> {
        let sink = job.destination.open_sink();
        self.submit_with_sink(job, source, sink)
    }

    /// Start `job`, writing to `sink`.
    pub fn submit_with_sink(
        &self,
        job: Job,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
    ) -> FramelabResult<JobHandle> {
        let handle = JobHandle {
            id: job.id,
            cancel: CancelToken::new(),
            state: Arc::new(JobState {
                snapshot: Mutex::new(JobSnapshot {
                    id: job.id,
                    status: JobStatus::Idle,
                    progress: 0.0,
                    failure: None,
                    report: None,
                }),
                changed: Condvar::new(),
            }),
        };

        let pipeline = self.pipeline.clone();
        let cache = Arc::clone(&self.cache);
        let subscribers = Arc::clone(&self.subscribers);
        let state = Arc::clone(&handle.state);
        let cancel = handle.cancel.clone();
        std::thread::Builder::new()
            .name(format!("framelab-{}", job.id))
            .spawn(move || {
                transition(&state, &subscribers, JobStatus::Running, |_| {});
                let on_progress = |p: crate::pipeline::Progress| {
                    let fraction = p.fraction();
                    let mut snap = state.lock();
                    if fraction <= snap.progress {
                        return;
                    }
                    snap.progress = fraction;
                    let status = snap.status;
                    drop(snap);
                    subscribers.broadcast(ProgressEvent {
                        job: p.job,
                        fraction,
                        status,
                    });
                };
                let result = pipeline.run(
                    &job,
                    source.as_mut(),
                    sink.as_mut(),
                    &cache,
                    &cancel,
                    &on_progress,
                );
                match result {
                    Ok(report) => {
                        tracing::info!(
                            job = %job.id,
                            written = report.frames_written,
                            skipped = report.frames_skipped,
                            "job completed"
                        );
                        transition(&state, &subscribers, JobStatus::Completed, |snap| {
                            snap.progress = 1.0;
                            snap.report = Some(report);
                        });
                    }
                    Err(failure) => {
                        let status = failure.status();
                        if status == JobStatus::Failed {
                            tracing::error!(job = %job.id, "job failed: {failure}");
                        } else {
                            tracing::info!(job = %job.id, "job cancelled");
                        }
                        transition(&state, &subscribers, status, |snap| {
                            snap.failure = Some(failure);
                        });
                    }
                }
            })
            .map_err(|e| FramelabError::Other(anyhow::anyhow!("failed to spawn job thread: {e}")))?;
        Ok(handle)
    }

    /// Request cooperative cancellation. Frames already written are kept and the sink is
    /// finalized.
    pub fn cancel(&self, handle: &JobHandle) {
        tracing::debug!(job = %handle.id, "cancel requested");
        handle.cancel.cancel();
    }

    /// Current state of the job.
    pub fn poll(&self, handle: &JobHandle) -> JobSnapshot {
        handle.state.lock().clone()
    }

    /// Block until the job reaches a terminal state.
    pub fn wait(&self, handle: &JobHandle) -> JobSnapshot {
        let mut snap = handle.state.lock();
        while !snap.status.is_terminal() {
            snap = handle
                .state
                .changed
                .wait(snap)
                .unwrap_or_else(|e| e.into_inner());
        }
        snap.clone()
    }

    /// Like [`ExportController::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, handle: &JobHandle, timeout: Duration) -> Option<JobSnapshot> {
        let snap = handle.state.lock();
        let (snap, _) = handle
            .state
            .changed
            .wait_timeout_while(snap, timeout, |s| !s.status.is_terminal())
            .unwrap_or_else(|e| e.into_inner());
        snap.status.is_terminal().then(|| snap.clone())
    }
}

impl std::fmt::Debug for ExportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportController")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Apply a legal status change, update the snapshot and notify waiters and subscribers.
fn transition(
    state: &JobState,
    subscribers: &Subscribers,
    next: JobStatus,
    update: impl FnOnce(&mut JobSnapshot),
) {
    let mut snap = state.lock();
    if !snap.status.can_transition_to(next) {
        tracing::warn!(job = %snap.id, from = %snap.status, to = %next, "illegal job transition ignored");
        return;
    }
    snap.status = next;
    update(&mut snap);
    let event = ProgressEvent {
        job: snap.id,
        fraction: snap.progress,
        status: next,
    };
    drop(snap);
    subscribers.broadcast(event);
    state.changed.notify_all();
}

#[cfg(test)]
#[path = "../../tests/unit/export/controller.rs"]
mod tests;
