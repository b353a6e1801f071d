//! Raised-hand gesture detection
//!
//! Holding the right wrist above the right eye for long enough fires a
//! record trigger. With two players both must hold the pose.

use duet_core::{Joint, JointSet, PoseBatch};

/// Default consecutive frames the hand must stay raised
pub const DEFAULT_GESTURE_THRESHOLD: u32 = 100;

/// Is this body's right wrist above its right eye?
pub fn hand_raised(body: &JointSet) -> bool {
    body.joint(Joint::RightWrist)
        .is_above(body.joint(Joint::RightEye))
}

/// The raised-hand condition for a whole detection batch.
///
/// Body 0 must always raise; body 1 too when two players are tracked. A
/// missing required body fails the condition.
pub fn gesture_condition(batch: &PoseBatch, players: usize) -> bool {
    let first = batch.body(0).map_or(false, hand_raised);
    if players == 2 {
        first && batch.body(1).map_or(false, hand_raised)
    } else {
        first
    }
}

/// Result of one evaluated frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureStep {
    /// The trigger fired on this frame
    pub fired: bool,
    /// Hold progress in percent
    pub progress: f32,
}

/// Counts consecutive frames of the raised-hand condition
#[derive(Debug, Clone)]
pub struct GestureDetector {
    threshold: u32,
    count: u32,
    armed: bool,
}

impl GestureDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            count: 0,
            armed: true,
        }
    }

    /// Feed one frame's condition.
    ///
    /// Fires once when the count first exceeds the threshold, then stays
    /// disarmed until the condition is released.
    pub fn update(&mut self, condition: bool) -> GestureStep {
        if !condition {
            self.count = 0;
            self.armed = true;
            return self.step(false);
        }
        if !self.armed {
            return self.step(false);
        }

        self.count += 1;
        if self.count > self.threshold {
            self.count = 0;
            self.armed = false;
            tracing::debug!(threshold = self.threshold, "raised-hand gesture fired");
            return self.step(true);
        }
        self.step(false)
    }

    /// Forget any partial hold (the detector stays armed)
    pub fn reset(&mut self) {
        self.count = 0;
        self.armed = true;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Hold progress in percent (may briefly read just over 100)
    pub fn progress(&self) -> f32 {
        self.count as f32 / self.threshold as f32 * 100.0
    }

    fn step(&self, fired: bool) -> GestureStep {
        GestureStep {
            fired,
            progress: self.progress(),
        }
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_GESTURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::Landmark;
    use proptest::prelude::*;

    fn body(raised: bool) -> JointSet {
        let wrist_y = if raised { 0.1 } else { 0.8 };
        JointSet::default()
            .with_joint(Joint::RightEye, Landmark::new(0.5, 0.3))
            .with_joint(Joint::RightWrist, Landmark::new(0.4, wrist_y))
    }

    #[test]
    fn test_sustained_hold_fires_once_at_threshold() {
        let mut detector = GestureDetector::default();
        let mut fired_at = Vec::new();
        for frame in 0..400 {
            if detector.update(true).fired {
                fired_at.push(frame);
                assert_eq!(detector.count(), 0);
            }
        }
        assert_eq!(fired_at, vec![100]);
    }

    #[test]
    fn test_interruption_resets_progress() {
        let mut detector = GestureDetector::default();
        for _ in 0..50 {
            detector.update(true);
        }
        assert_eq!(detector.progress(), 50.0);

        let step = detector.update(false);
        assert!(!step.fired);
        assert_eq!(step.progress, 0.0);

        // needs a full hold again
        for _ in 0..100 {
            assert!(!detector.update(true).fired);
        }
        assert!(detector.update(true).fired);
    }

    #[test]
    fn test_release_rearms() {
        let mut detector = GestureDetector::new(2);
        assert!(!detector.update(true).fired);
        assert!(!detector.update(true).fired);
        assert!(detector.update(true).fired);
        assert!(!detector.is_armed());
        assert!(!detector.update(true).fired);

        detector.update(false);
        assert!(detector.is_armed());
        detector.update(true);
        detector.update(true);
        assert!(detector.update(true).fired);
    }

    #[test]
    fn test_condition_single_player() {
        assert!(gesture_condition(&PoseBatch::new(vec![body(true)]), 1));
        assert!(!gesture_condition(&PoseBatch::new(vec![body(false)]), 1));
        assert!(!gesture_condition(&PoseBatch::empty(), 1));
        // second body ignored with one player
        assert!(gesture_condition(&PoseBatch::new(vec![body(true), body(false)]), 1));
    }

    #[test]
    fn test_condition_two_players() {
        let both = PoseBatch::new(vec![body(true), body(true)]);
        assert!(gesture_condition(&both, 2));

        let one = PoseBatch::new(vec![body(true), body(false)]);
        assert!(!gesture_condition(&one, 2));

        let missing = PoseBatch::new(vec![body(true)]);
        assert!(!gesture_condition(&missing, 2));
    }

    proptest! {
        #[test]
        fn prop_fires_only_after_unbroken_hold(
            threshold in 1u32..20,
            frames in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let mut detector = GestureDetector::new(threshold);
            let mut run = 0u32;
            for condition in frames {
                run = if condition { run + 1 } else { 0 };
                let step = detector.update(condition);
                if step.fired {
                    // only the first crossing of each hold fires
                    prop_assert_eq!(run, threshold + 1);
                }
                prop_assert!(detector.count() <= threshold);
            }
        }
    }
}
