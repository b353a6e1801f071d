//! Body joints in the sensor's landmark layout
//!
//! The pose sensor reports 33 landmarks per body in a fixed order. The
//! discriminant of each variant is its landmark index.

/// Number of landmarks the sensor reports per body
pub const JOINT_COUNT: usize = 33;

/// Joint identifier for the 33-landmark body layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Joint {
    // Head
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,

    // Arms
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,

    // Hands
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,

    // Legs
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Joint {
    /// All joints in landmark order
    pub fn all() -> &'static [Joint] {
        &[
            Joint::Nose,
            Joint::LeftEyeInner,
            Joint::LeftEye,
            Joint::LeftEyeOuter,
            Joint::RightEyeInner,
            Joint::RightEye,
            Joint::RightEyeOuter,
            Joint::LeftEar,
            Joint::RightEar,
            Joint::MouthLeft,
            Joint::MouthRight,
            Joint::LeftShoulder,
            Joint::RightShoulder,
            Joint::LeftElbow,
            Joint::RightElbow,
            Joint::LeftWrist,
            Joint::RightWrist,
            Joint::LeftPinky,
            Joint::RightPinky,
            Joint::LeftIndex,
            Joint::RightIndex,
            Joint::LeftThumb,
            Joint::RightThumb,
            Joint::LeftHip,
            Joint::RightHip,
            Joint::LeftKnee,
            Joint::RightKnee,
            Joint::LeftAnkle,
            Joint::RightAnkle,
            Joint::LeftHeel,
            Joint::RightHeel,
            Joint::LeftFootIndex,
            Joint::RightFootIndex,
        ]
    }

    /// Number of joints
    pub fn count() -> usize {
        JOINT_COUNT
    }

    /// Landmark index of this joint
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Joint for a landmark index
    pub fn from_index(index: usize) -> Option<Joint> {
        Self::all().get(index).copied()
    }

    /// Face landmarks other than the nose
    pub fn is_face(self) -> bool {
        (1..=10).contains(&self.index())
    }

    /// Thumb and pinky landmarks (never rendered directly)
    pub fn is_finger(self) -> bool {
        matches!(
            self,
            Joint::LeftPinky | Joint::RightPinky | Joint::LeftThumb | Joint::RightThumb
        )
    }
}
