//! Persistent point tracking across frames and the track export formats.

use std::io::{Read, Write};

use anyhow::Context as _;

use crate::foundation::core::{FrameIndex, Point};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;
use crate::motion::features::{self, FeatureParams};
use crate::motion::flow::{self, LkParams};
use crate::motion::image::{GrayImage, Pyramid};

/// A tracked point. Ids are never reused within a tracker.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackPoint {
    /// Stable identity.
    pub id: u64,
    /// Position in the current frame.
    pub position: Point,
    /// Tracking confidence in `[0, 1]`; freshly detected points start at 1.
    pub confidence: f64,
}

/// Tracker settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Corner detection for initial and replenishing detections.
    pub features: FeatureParams,
    /// Optical flow; `flow.min_confidence` is the retirement threshold.
    pub flow: LkParams,
    /// Detect new corners when fewer than this many points survive. `0` disables replenishing.
    pub replenish_below: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            // The interactive picker is stricter than the stabilization detector.
            features: FeatureParams {
                quality_level: 0.3,
                ..FeatureParams::default()
            },
            flow: LkParams::default(),
            replenish_below: 0,
        }
    }
}

/// Per-frame bookkeeping returned by [`PointTracker::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    /// Points carried over from the previous frame.
    pub tracked: usize,
    /// Points retired on this frame.
    pub retired: usize,
    /// Points newly detected on this frame.
    pub detected: usize,
}

/// Detect → track → retire loop over consecutive frames.
pub struct PointTracker {
    params: TrackerParams,
    points: Vec<TrackPoint>,
    next_id: u64,
    prev: Option<Pyramid>,
}

impl PointTracker {
    /// Empty tracker; the first [`PointTracker::update`] detects initial corners.
    pub fn new(params: TrackerParams) -> FramelabResult<Self> {
        params.features.validate()?;
        params.flow.validate()?;
        Ok(Self {
            params,
            points: Vec::new(),
            next_id: 0,
            prev: None,
        })
    }

    /// Live points.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Add a manually picked point on the current frame; returns its id.
    pub fn add_point(&mut self, position: Point) -> u64 {
        let id = self.alloc_id();
        self.points.push(TrackPoint {
            id,
            position,
            confidence: 1.0,
        });
        id
    }

    /// Drop every live point. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Advance to `frame`.
    ///
    /// On the first frame (or after every point was lost) corners are detected. Afterwards live
    /// points are tracked and retired when flow fails, confidence drops below
    /// `flow.min_confidence`, or they leave the frame.
    pub fn update(&mut self, frame: &Frame) -> TrackUpdate {
        let pyramid = Pyramid::build(GrayImage::from_frame(frame), self.params.flow.pyramid_levels);
        let mut stats = TrackUpdate::default();

        if let Some(prev) = self.prev.as_ref() {
            let same_size = prev.base().width == pyramid.base().width
                && prev.base().height == pyramid.base().height;
            let positions: Vec<Point> = self.points.iter().map(|p| p.position).collect();
            let results = if same_size {
                flow::track_points(prev, &pyramid, &positions, &self.params.flow)
            } else {
                Vec::new()
            };
            let before = self.points.len();
            let mut kept = Vec::with_capacity(before);
            for (p, r) in self.points.iter().zip(&results) {
                if r.found {
                    kept.push(TrackPoint {
                        id: p.id,
                        position: r.position,
                        confidence: r.confidence,
                    });
                }
            }
            stats.tracked = kept.len();
            stats.retired = before - kept.len();
            self.points = kept;
        }

        let needs_detection = self.prev.is_none()
            || self.points.is_empty()
            || self.points.len() < self.params.replenish_below;
        if needs_detection {
            let existing: Vec<Point> = self.points.iter().map(|p| p.position).collect();
            let mut fp = self.params.features;
            fp.max_corners = fp.max_corners.saturating_sub(self.points.len());
            if fp.max_corners > 0 {
                for c in features::detect_corners(&pyramid.levels[0], &fp, &existing) {
                    let id = self.alloc_id();
                    self.points.push(TrackPoint {
                        id,
                        position: c,
                        confidence: 1.0,
                    });
                    stats.detected += 1;
                }
            }
        }

        if stats.retired > 0 || stats.detected > 0 {
            tracing::debug!(
                frame = frame.index().0,
                tracked = stats.tracked,
                retired = stats.retired,
                detected = stats.detected,
                "tracker update"
            );
        }
        self.prev = Some(pyramid);
        stats
    }
}

/// One exported track sample.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackRecord {
    /// Frame index.
    pub frame: u64,
    /// Track id.
    pub point_id: u64,
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
    /// Tracking confidence.
    pub confidence: f64,
}

/// Accumulated tracks, exportable as CSV (`frame,point_id,x,y,confidence`) or JSON.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TrackLog {
    records: Vec<TrackRecord>,
}

impl TrackLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the live points of `frame`.
    pub fn record(&mut self, frame: FrameIndex, points: &[TrackPoint]) {
        self.records.extend(points.iter().map(|p| TrackRecord {
            frame: frame.0,
            point_id: p.id,
            x: p.position.x,
            y: p.position.y,
            confidence: p.confidence,
        }));
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write CSV with a header row.
    pub fn write_csv<W: Write>(&self, out: W) -> FramelabResult<()> {
        let mut w = csv::Writer::from_writer(out);
        for r in &self.records {
            w.serialize(r).map_err(|e| FramelabError::serde(e.to_string()))?;
        }
        w.flush().context("failed to flush track CSV")?;
        Ok(())
    }

    /// Read CSV produced by [`TrackLog::write_csv`].
    pub fn read_csv<R: Read>(input: R) -> FramelabResult<Self> {
        let mut r = csv::Reader::from_reader(input);
        let records = r
            .deserialize()
            .collect::<Result<Vec<TrackRecord>, _>>()
            .map_err(|e| FramelabError::serde(e.to_string()))?;
        Ok(Self { records })
    }

    /// Serialize as a JSON array of records.
    pub fn to_json(&self) -> FramelabResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/tracker.rs"]
mod tests;
