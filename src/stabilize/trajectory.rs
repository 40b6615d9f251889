use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::math::Mat3;
use crate::motion::MotionSample;

/// Cumulative camera poses, one per frame, contiguous from `start`.
///
/// Pose `P_k` maps coordinates of the first frame onto frame `k`; the first pose is the identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    start: FrameIndex,
    poses: Vec<Mat3>,
    unreliable: usize,
}

impl Trajectory {
    /// Trajectory holding only the origin pose of `start`.
    pub fn new(start: FrameIndex) -> Self {
        Self {
            start,
            poses: vec![Mat3::IDENTITY],
            unreliable: 0,
        }
    }

    /// Append the pose of `sample.to` as `T · P_prev`.
    ///
    /// Samples must continue the trajectory: `sample.from` is the last frame and `sample.to` the
    /// next one.
    pub fn push(&mut self, sample: &MotionSample) -> FramelabResult<()> {
        let last = self.last_index();
        if sample.from != last || sample.to.0 != last.0 + 1 {
            return Err(FramelabError::validation(format!(
                "motion sample {} -> {} does not continue trajectory ending at {}",
                sample.from.0, sample.to.0, last.0
            )));
        }
        let prev = self.poses[self.poses.len() - 1];
        self.poses.push(sample.transform.compose(&prev).normalized());
        if !sample.reliable {
            self.unreliable += 1;
        }
        Ok(())
    }

    /// First frame.
    pub fn start(&self) -> FrameIndex {
        self.start
    }

    fn last_index(&self) -> FrameIndex {
        FrameIndex(self.start.0 + self.poses.len() as u64 - 1)
    }

    /// Frames covered.
    pub fn range(&self) -> FrameRange {
        FrameRange {
            start: self.start,
            end: FrameIndex(self.start.0 + self.poses.len() as u64),
        }
    }

    /// Number of poses (never zero).
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Never `true`: a trajectory always holds its origin pose.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Poses in frame order.
    pub fn poses(&self) -> &[Mat3] {
        &self.poses
    }

    /// Pose of `frame`, if covered.
    pub fn pose(&self, frame: FrameIndex) -> Option<&Mat3> {
        let offset = frame.0.checked_sub(self.start.0)?;
        self.poses.get(usize::try_from(offset).ok()?)
    }

    /// Samples pushed with `reliable == false`.
    pub fn unreliable_count(&self) -> usize {
        self.unreliable
    }

    /// Moving average over `[k - radius, k + radius]`, truncated at both ends of the range.
    pub fn smooth(&self, radius: u32) -> Vec<Mat3> {
        let n = self.poses.len();
        let r = radius as usize;
        let mut prefix = Vec::with_capacity(n + 1);
        let mut acc = [[0.0f64; 3]; 3];
        prefix.push(acc);
        for p in &self.poses {
            for (row, src) in acc.iter_mut().zip(p.0.iter()) {
                for (a, v) in row.iter_mut().zip(src) {
                    *a += v;
                }
            }
            prefix.push(acc);
        }
        (0..n)
            .map(|k| {
                let lo = k.saturating_sub(r);
                let hi = (k + r + 1).min(n);
                let count = (hi - lo) as f64;
                let mut m = [[0.0f64; 3]; 3];
                for (i, row) in m.iter_mut().enumerate() {
                    for (j, v) in row.iter_mut().enumerate() {
                        *v = (prefix[hi][i][j] - prefix[lo][i][j]) / count;
                    }
                }
                Mat3(m)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stabilize/trajectory.rs"]
mod tests;
