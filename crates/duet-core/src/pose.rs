//! Pose data - joint sets, flat poses and detection batches
//!
//! A `JointSet` is what the sensor saw of one body in one frame. A `FlatPose`
//! is the same body reduced to its interleaved x,y coordinates, the unit that
//! training and prediction work with.

use crate::{DuetError, DuetResult, Joint, JOINT_COUNT};

/// Length of a flat pose (x,y per joint)
pub const FLAT_POSE_LEN: usize = JOINT_COUNT * 2;

/// Maximum number of bodies tracked at once
pub const MAX_BODIES: usize = 2;

/// One sensor landmark (normalized image coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 1.0,
        }
    }
}

impl Landmark {
    /// Landmark in the image plane
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Linear interpolation in the image plane
    pub fn lerp(&self, other: &Landmark, t: f32) -> Landmark {
        Landmark::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Midpoint of two landmarks
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Is this landmark higher on screen than `other`? (Y grows downwards)
    pub fn is_above(&self, other: &Landmark) -> bool {
        self.y < other.y
    }
}

/// The joints of one detected body in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSet {
    landmarks: [Landmark; JOINT_COUNT],
}

impl Default for JointSet {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); JOINT_COUNT],
        }
    }
}

impl JointSet {
    /// Build from a full landmark array
    pub fn new(landmarks: [Landmark; JOINT_COUNT]) -> Self {
        Self { landmarks }
    }

    /// Build from whatever the sensor reported.
    ///
    /// Missing trailing landmarks are zero-filled, extra ones are ignored.
    pub fn from_landmarks(landmarks: &[Landmark]) -> Self {
        let mut set = [Landmark {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 0.0,
        }; JOINT_COUNT];
        for (slot, landmark) in set.iter_mut().zip(landmarks) {
            *slot = *landmark;
        }
        Self { landmarks: set }
    }

    /// Get a joint
    #[inline]
    pub fn joint(&self, joint: Joint) -> &Landmark {
        &self.landmarks[joint.index()]
    }

    /// Replace a joint
    pub fn with_joint(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.landmarks[joint.index()] = landmark;
        self
    }

    /// All landmarks in layout order
    pub fn landmarks(&self) -> &[Landmark; JOINT_COUNT] {
        &self.landmarks
    }

    /// Interleave x,y of every joint
    pub fn flatten(&self) -> FlatPose {
        let mut values = [0.0; FLAT_POSE_LEN];
        for (i, landmark) in self.landmarks.iter().enumerate() {
            values[i * 2] = landmark.x;
            values[i * 2 + 1] = landmark.y;
        }
        FlatPose(values)
    }
}

/// A body pose as a 66D vector `[x0, y0, x1, y1, ..., x32, y32]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatPose(pub [f32; FLAT_POSE_LEN]);

impl FlatPose {
    /// All-zero pose
    pub fn zeros() -> Self {
        FlatPose([0.0; FLAT_POSE_LEN])
    }

    /// Build from a slice of exactly 66 values
    pub fn from_slice(values: &[f32]) -> DuetResult<Self> {
        let array: [f32; FLAT_POSE_LEN] =
            values.try_into().map_err(|_| DuetError::DimensionMismatch {
                expected: FLAT_POSE_LEN,
                actual: values.len(),
            })?;
        Ok(FlatPose(array))
    }

    /// Raw values
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Rebuild a joint set; z and visibility take their defaults
    pub fn unflatten(&self) -> JointSet {
        let mut landmarks = [Landmark::default(); JOINT_COUNT];
        for (i, landmark) in landmarks.iter_mut().enumerate() {
            landmark.x = self.0[i * 2];
            landmark.y = self.0[i * 2 + 1];
        }
        JointSet::new(landmarks)
    }

    /// Smallest coordinate
    pub fn min(&self) -> f32 {
        self.0.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest coordinate
    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

impl From<&JointSet> for FlatPose {
    fn from(set: &JointSet) -> Self {
        set.flatten()
    }
}

/// Bodies detected in one sensor frame (at most two)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseBatch {
    bodies: Vec<JointSet>,
}

impl PoseBatch {
    /// Create a batch; bodies beyond the second are dropped
    pub fn new(mut bodies: Vec<JointSet>) -> Self {
        bodies.truncate(MAX_BODIES);
        Self { bodies }
    }

    /// Frame with nobody in view
    pub fn empty() -> Self {
        Self::default()
    }

    /// Body by detection index
    pub fn body(&self, index: usize) -> Option<&JointSet> {
        self.bodies.get(index)
    }

    /// All detected bodies
    pub fn bodies(&self) -> &[JointSet] {
        &self.bodies
    }

    /// Number of detected bodies
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Nobody detected?
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
