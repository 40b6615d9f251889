//! Job scheduling: stabilization analysis, then bounded decode → process → encode stages.
//!
//! Stages talk over bounded `crossbeam-channel` queues; every blocking operation waits in
//! `queue_timeout` slices so cancellation and stalls are noticed promptly. The encoder writes
//! frames strictly in index order.

mod analysis;
mod job;
pub(crate) mod process;
mod reorder;
mod scheduler;

pub(crate) use analysis::analyze;
pub(crate) use job::resolve_range;
pub use job::{
    CancelToken, DecodeErrorPolicy, Destination, FailureKind, Job, JobFailure, JobId, JobStatus,
    PipelineOpts, PipelineReport, Progress,
};
pub use scheduler::Pipeline;
