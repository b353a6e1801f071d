//! Min-max normalization bounds
//!
//! Bounds are a single scalar min/max over a whole tensor of poses, not one
//! pair per dimension. Joints with little movement therefore keep a narrow
//! slice of [0, 1]; kept as-is for compatibility with recorded behavior.

use duet_core::{DuetError, DuetResult, FlatPose, FLAT_POSE_LEN};

use crate::Dataset;

/// Scalar min/max over every coordinate of a set of poses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationBounds {
    pub min: f32,
    pub max: f32,
}

impl NormalizationBounds {
    /// Bounds over all coordinates of all poses
    pub fn from_poses<'a, I>(poses: I) -> DuetResult<Self>
    where
        I: IntoIterator<Item = &'a FlatPose>,
    {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut seen = false;

        for pose in poses {
            min = min.min(pose.min());
            max = max.max(pose.max());
            seen = true;
        }

        if !seen {
            return Err(DuetError::EmptyDataset);
        }

        Ok(Self { min, max })
    }

    /// Width of the interval; a degenerate interval scales by 1
    pub fn range(&self) -> f32 {
        let range = self.max - self.min;
        if range > f32::EPSILON {
            range
        } else {
            1.0
        }
    }

    /// Scale into [0, 1]
    pub fn normalize(&self, pose: &FlatPose) -> FlatPose {
        let range = self.range();
        let mut out = [0.0; FLAT_POSE_LEN];
        for (o, v) in out.iter_mut().zip(pose.0.iter()) {
            *o = (v - self.min) / range;
        }
        FlatPose(out)
    }

    /// Map a [0, 1] value back into the original interval
    pub fn denormalize(&self, pose: &FlatPose) -> FlatPose {
        let range = self.range();
        let mut out = [0.0; FLAT_POSE_LEN];
        for (o, v) in out.iter_mut().zip(pose.0.iter()) {
            *o = v * range + self.min;
        }
        FlatPose(out)
    }
}

/// Input and label bounds of one trained model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBounds {
    /// Bounds of the driving poses
    pub input: NormalizationBounds,
    /// Bounds of the driven poses
    pub label: NormalizationBounds,
}

impl ModelBounds {
    /// Compute both bounds from a dataset
    pub fn from_dataset(dataset: &Dataset) -> DuetResult<Self> {
        Ok(Self {
            input: NormalizationBounds::from_poses(dataset.sources())?,
            label: NormalizationBounds::from_poses(dataset.targets())?,
        })
    }
}
