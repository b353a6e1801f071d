//! Horizontal lanes - where each body stands on screen
//!
//! Lane order is person 1, person 2, AI 1, AI 2. With a single player the
//! live body and its AI partner share the middle of the stage.

use duet_core::Landmark;

use crate::Position3D;

/// Lane offsets with two tracked players
pub const TWO_PLAYER_X_POSITIONS: [f32; 4] = [-2.0, -1.0, 0.0, 1.0];

/// Lane offsets with one tracked player (fourth entry is a spare)
pub const ONE_PLAYER_X_POSITIONS: [f32; 4] = [-1.5, -0.5, 0.5, 0.5];

/// Uniform scale from sensor space to scene space
pub const BODY_SCALE: f32 = 0.5;

/// Lane offset of a body for the given number of tracked players
pub fn lane_offset(body_index: usize, total_tracked_bodies: usize) -> f32 {
    let table = if total_tracked_bodies == 1 {
        &ONE_PLAYER_X_POSITIONS
    } else {
        &TWO_PLAYER_X_POSITIONS
    };
    table[body_index % table.len()]
}

/// Map a sensor landmark into scene space.
///
/// Both axes are flipped (the screen acts as a mirror and sensor y grows
/// downwards), x is shifted into the body's lane, and the result is scaled.
pub fn place(landmark: &Landmark, lane: f32) -> Position3D {
    Position3D::new(
        (1.0 - landmark.x + lane) * BODY_SCALE,
        (1.0 - landmark.y) * BODY_SCALE,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_selection() {
        assert_eq!(lane_offset(0, 1), -1.5);
        assert_eq!(lane_offset(2, 1), 0.5);
        assert_eq!(lane_offset(0, 2), -2.0);
        assert_eq!(lane_offset(3, 2), 1.0);
        // no players tracked falls back to the two-player table
        assert_eq!(lane_offset(1, 0), -1.0);
    }

    #[test]
    fn test_place_flips_and_scales() {
        let p = place(&Landmark::new(0.25, 0.75), 0.0);
        assert!((p.x - 0.375).abs() < 1e-6);
        assert!((p.y - 0.125).abs() < 1e-6);
        assert_eq!(p.z, 0.0);
    }

    #[test]
    fn test_lanes_do_not_overlap() {
        // full sensor width is 1.0, lanes are a full unit apart
        for players in [1, 2] {
            let right_edge_0 = place(&Landmark::new(0.0, 0.5), lane_offset(0, players)).x;
            let left_edge_1 = place(&Landmark::new(1.0, 0.5), lane_offset(1, players)).x;
            assert!(right_edge_0 <= left_edge_1);
        }
    }
}
