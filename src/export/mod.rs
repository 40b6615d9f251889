//! Background export jobs: submit, cancel, poll, wait and progress subscriptions.

mod controller;

pub use controller::{ExportController, JobHandle, JobSnapshot, ProgressEvent};
