//! Training datasets built from two capture buffers

use rand::seq::SliceRandom;
use rand::Rng;

use duet_core::FlatPose;

/// One aligned pair of poses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    /// Driving pose
    pub source: FlatPose,
    /// Pose to be predicted
    pub target: FlatPose,
}

impl TrainingSample {
    pub fn new(source: FlatPose, target: FlatPose) -> Self {
        Self { source, target }
    }

    /// Same pair with roles exchanged
    pub fn swapped(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }
}

/// Ordered training samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<TrainingSample>,
}

impl Dataset {
    /// Pair two buffers by index.
    ///
    /// The longer buffer is truncated to the shorter one's length; nothing is
    /// resampled or interpolated.
    pub fn align(buffer1: &[FlatPose], buffer2: &[FlatPose]) -> Self {
        let samples = buffer1
            .iter()
            .zip(buffer2.iter())
            .map(|(a, b)| TrainingSample::new(*a, *b))
            .collect();
        Self { samples }
    }

    /// Dataset with every sample's roles swapped
    pub fn mirrored(&self) -> Self {
        Self {
            samples: self.samples.iter().map(TrainingSample::swapped).collect(),
        }
    }

    /// Shuffle sample order in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    /// Driving poses in sample order
    pub fn sources(&self) -> impl Iterator<Item = &FlatPose> + '_ {
        self.samples.iter().map(|s| &s.source)
    }

    /// Target poses in sample order
    pub fn targets(&self) -> impl Iterator<Item = &FlatPose> + '_ {
        self.samples.iter().map(|s| &s.target)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
