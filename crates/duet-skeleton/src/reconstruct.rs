//! Skeleton reconstruction
//!
//! Turns the sparse joints of one body into a dense set of weighted points so
//! that the scalar-field renderer draws a continuous blobby body: a strong
//! head blob, a strong torso column and tubes along each limb bone.

use duet_core::{Joint, JointSet, Landmark};

use crate::{lane_offset, place, Color, RenderPrimitive, SUBTRACT_HINT};

/// Head strength relative to the base strength
pub const HEAD_STRENGTH_FACTOR: f32 = 8.0;

/// Torso strength relative to the base strength
pub const TORSO_STRENGTH_FACTOR: f32 = 5.0;

/// Legs get this many times the arm subdivisions (floored)
pub const LEG_MULTIPLIER: f32 = 1.5;

/// Joints drawn as single base-strength points.
///
/// Face landmarks are covered by the head blob; pinkies and thumbs are left
/// out so hands stay compact.
pub const DIRECT_JOINTS: [Joint; 19] = [
    Joint::Nose,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftIndex,
    Joint::RightIndex,
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
];

/// Limb bones that get interpolated tubes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bone {
    RightUpperArm,
    LeftUpperArm,
    RightForearm,
    LeftForearm,
    RightThigh,
    RightShin,
    LeftThigh,
    LeftShin,
}

impl Bone {
    /// All limb bones in drawing order
    pub fn all() -> &'static [Bone] {
        &[
            Bone::RightUpperArm,
            Bone::LeftUpperArm,
            Bone::RightForearm,
            Bone::LeftForearm,
            Bone::RightThigh,
            Bone::RightShin,
            Bone::LeftThigh,
            Bone::LeftShin,
        ]
    }

    /// Proximal and distal joint
    pub fn joints(self) -> (Joint, Joint) {
        match self {
            Bone::RightUpperArm => (Joint::RightShoulder, Joint::RightElbow),
            Bone::LeftUpperArm => (Joint::LeftShoulder, Joint::LeftElbow),
            Bone::RightForearm => (Joint::RightElbow, Joint::RightWrist),
            Bone::LeftForearm => (Joint::LeftElbow, Joint::LeftWrist),
            Bone::RightThigh => (Joint::RightHip, Joint::RightKnee),
            Bone::RightShin => (Joint::RightKnee, Joint::RightAnkle),
            Bone::LeftThigh => (Joint::LeftHip, Joint::LeftKnee),
            Bone::LeftShin => (Joint::LeftKnee, Joint::LeftAnkle),
        }
    }

    pub fn is_leg(self) -> bool {
        matches!(
            self,
            Bone::RightThigh | Bone::RightShin | Bone::LeftThigh | Bone::LeftShin
        )
    }

    /// Interpolated points along this bone for an arm subdivision count
    pub fn subdivisions(self, arm_subdivisions: usize) -> usize {
        if self.is_leg() {
            leg_subdivisions(arm_subdivisions)
        } else {
            arm_subdivisions
        }
    }
}

/// `floor(n × 1.5)`
pub fn leg_subdivisions(arm_subdivisions: usize) -> usize {
    (arm_subdivisions as f32 * LEG_MULTIPLIER).floor() as usize
}

/// Number of primitives `reconstruct` emits for one body
pub fn primitive_count(subdivisions: usize) -> usize {
    let bones: usize = Bone::all().iter().map(|b| b.subdivisions(subdivisions)).sum();
    DIRECT_JOINTS.len() + 1 + subdivisions + bones
}

/// `count` points strictly between `a` and `b`, walking from `b` towards `a`
fn interpolate(a: Landmark, b: Landmark, count: usize) -> impl Iterator<Item = Landmark> {
    let steps = (count + 1) as f32;
    (1..=count).map(move |i| b.lerp(&a, i as f32 / steps))
}

/// Emits primitives for one body in one lane
struct Emitter<'a> {
    out: &'a mut Vec<RenderPrimitive>,
    lane: f32,
    color: Color,
    body_index: usize,
}

impl Emitter<'_> {
    fn emit(&mut self, landmark: &Landmark, strength: f32) {
        self.out.push(RenderPrimitive {
            position: place(landmark, self.lane),
            strength,
            subtract: SUBTRACT_HINT,
            color: self.color,
            body_index: self.body_index,
        });
    }
}

/// Reconstruct one body as render primitives.
///
/// Pure function of its inputs. Output per body: one point per direct joint,
/// the head blob at the nose, the torso column from the shoulder midpoint to
/// the hip midpoint, then the limb tubes (legs denser than arms).
pub fn reconstruct(
    pose: &JointSet,
    body_index: usize,
    total_tracked_bodies: usize,
    strength: f32,
    subdivisions: usize,
) -> Vec<RenderPrimitive> {
    let mut out = Vec::with_capacity(primitive_count(subdivisions));
    let mut emitter = Emitter {
        out: &mut out,
        lane: lane_offset(body_index, total_tracked_bodies),
        color: Color::for_body(body_index),
        body_index,
    };

    for joint in DIRECT_JOINTS {
        emitter.emit(pose.joint(joint), strength);
    }

    emitter.emit(pose.joint(Joint::Nose), HEAD_STRENGTH_FACTOR * strength);

    let shoulders = pose
        .joint(Joint::LeftShoulder)
        .midpoint(pose.joint(Joint::RightShoulder));
    let hips = pose.joint(Joint::LeftHip).midpoint(pose.joint(Joint::RightHip));
    for point in interpolate(shoulders, hips, subdivisions) {
        emitter.emit(&point, TORSO_STRENGTH_FACTOR * strength);
    }

    for &bone in Bone::all() {
        let (from, to) = bone.joints();
        let count = bone.subdivisions(subdivisions);
        for point in interpolate(*pose.joint(from), *pose.joint(to), count) {
            emitter.emit(&point, strength);
        }
    }

    out
}

/// Reconstruct several bodies; body index is the position in the slice
pub fn reconstruct_all(
    bodies: &[JointSet],
    total_tracked_bodies: usize,
    strength: f32,
    subdivisions: usize,
) -> Vec<RenderPrimitive> {
    bodies
        .iter()
        .enumerate()
        .flat_map(|(i, body)| reconstruct(body, i, total_tracked_bodies, strength, subdivisions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BODY_SCALE, TWO_PLAYER_X_POSITIONS};
    use duet_core::JOINT_COUNT;
    use proptest::prelude::*;

    /// A standing figure with every joint at a distinct position
    fn figure() -> JointSet {
        let mut landmarks = [Landmark::default(); JOINT_COUNT];
        for (i, l) in landmarks.iter_mut().enumerate() {
            *l = Landmark::new(0.3 + (i % 7) as f32 * 0.05, 0.1 + i as f32 * 0.025);
        }
        JointSet::new(landmarks)
    }

    fn strength_count(prims: &[RenderPrimitive], strength: f32) -> usize {
        prims.iter().filter(|p| (p.strength - strength).abs() < 1e-6).count()
    }

    #[test]
    fn test_leg_subdivisions() {
        assert_eq!(leg_subdivisions(0), 0);
        assert_eq!(leg_subdivisions(1), 1);
        assert_eq!(leg_subdivisions(3), 4);
        assert_eq!(leg_subdivisions(8), 12);
    }

    #[test]
    fn test_counts_per_group() {
        let n = 8;
        let prims = reconstruct(&figure(), 0, 1, 0.1, n);
        assert_eq!(prims.len(), primitive_count(n));
        // 19 direct joints, 8 per arm bone, 12 per leg bone
        assert_eq!(strength_count(&prims, 0.1), 19 + 4 * 8 + 4 * 12);
        assert_eq!(strength_count(&prims, 0.8), 1);
        assert_eq!(strength_count(&prims, 0.5), n);
    }

    #[test]
    fn test_head_blob_sits_on_nose() {
        let pose = figure();
        let prims = reconstruct(&pose, 0, 2, 0.05, 4);
        let head = prims
            .iter()
            .find(|p| (p.strength - 0.4).abs() < 1e-6)
            .unwrap();
        assert_eq!(head.position, place(pose.joint(Joint::Nose), -2.0));
    }

    #[test]
    fn test_no_finger_primitives() {
        let pose = figure();
        let prims = reconstruct(&pose, 0, 2, 0.1, 0);
        let lane = lane_offset(0, 2);
        for finger in [
            Joint::LeftPinky,
            Joint::RightPinky,
            Joint::LeftThumb,
            Joint::RightThumb,
        ] {
            let at = place(pose.joint(finger), lane);
            assert!(prims.iter().all(|p| p.position.distance(&at) > 1e-6));
        }
    }

    #[test]
    fn test_interpolation_excludes_endpoints() {
        let a = Landmark::new(1.0, 1.0);
        let b = Landmark::new(0.0, 0.0);
        let points: Vec<Landmark> = interpolate(a, b, 3).collect();
        assert_eq!(points.len(), 3);
        assert!((points[0].x - 0.25).abs() < 1e-6);
        assert!((points[1].x - 0.5).abs() < 1e-6);
        assert!((points[2].x - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_y_is_flipped() {
        let high = JointSet::default().with_joint(Joint::Nose, Landmark::new(0.5, 0.1));
        let prims = reconstruct(&high, 0, 1, 0.1, 0);
        assert!((prims[0].position.y - 0.9 * BODY_SCALE).abs() < 1e-6);
    }

    #[test]
    fn test_bodies_take_their_own_lane() {
        let pose = figure();
        let prims = reconstruct_all(&[pose, pose], 2, 0.1, 2);
        let first = prims.iter().find(|p| p.body_index == 0).unwrap();
        let second = prims.iter().find(|p| p.body_index == 1).unwrap();

        let shift = (TWO_PLAYER_X_POSITIONS[1] - TWO_PLAYER_X_POSITIONS[0]) * BODY_SCALE;
        assert!((second.position.x - first.position.x - shift).abs() < 1e-6);
        assert_ne!(first.color, second.color);
        assert!(prims.iter().all(|p| p.subtract == SUBTRACT_HINT));
    }

    proptest! {
        #[test]
        fn prop_reconstruction_is_pure(
            x in 0.0f32..1.0,
            y in 0.0f32..1.0,
            body in 0usize..4,
            players in 0usize..3,
            n in 0usize..12,
        ) {
            let pose = figure().with_joint(Joint::LeftWrist, Landmark::new(x, y));
            let a = reconstruct(&pose, body, players, 0.033, n);
            let b = reconstruct(&pose, body, players, 0.033, n);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_subdivision_is_monotone(n in 0usize..32) {
            let pose = figure();
            let fewer = reconstruct(&pose, 0, 1, 0.1, n).len();
            let more = reconstruct(&pose, 0, 1, 0.1, n + 1).len();
            prop_assert!(more > fewer);
            prop_assert_eq!(leg_subdivisions(n), (n as f32 * 1.5).floor() as usize);
        }
    }
}
