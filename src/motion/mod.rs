//! Motion estimation: corner detection, pyramidal Lucas–Kanade flow, block matching and robust
//! model fitting.
//!
//! All estimators are deterministic: data-parallel loops collect results in input order and
//! RANSAC draws from a seeded generator.

pub(crate) mod dense;
pub(crate) mod features;
pub(crate) mod fit;
pub(crate) mod flow;
pub(crate) mod image;
mod estimator;
pub mod tracker;

pub use dense::DenseParams;
pub use estimator::{EstimatorParams, MotionEstimator, MotionSample, PreparedFrame, Strategy};
pub use features::FeatureParams;
pub use fit::{MotionModel, RansacParams};
pub use flow::LkParams;
pub use tracker::{PointTracker, TrackLog, TrackPoint, TrackRecord, TrackUpdate, TrackerParams};
