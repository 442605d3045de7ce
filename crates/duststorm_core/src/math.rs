//! Spatial math helpers and the simulation RNG.
//!
//! Positions are [`glam::Vec3`] with the Y axis as "up". Most gameplay
//! distances are compared on the ground plane or with the vertical axis
//! flattened, so the helpers here exist to keep those conventions in one
//! place. Angles are yaw values in radians around the Y axis.

use serde::{Deserialize, Serialize};

pub use glam::{Vec2, Vec3};

/// Full turn in radians.
pub const TAU: f32 = std::f32::consts::TAU;

/// Squared distance between two points with the vertical axis flattened
/// to `from`'s height.
///
/// Arrival checks use this so that a flying unit hovering above its
/// destination still counts as "there".
#[must_use]
pub fn level_distance_sq(from: Vec3, to: Vec3) -> f32 {
    from.distance_squared(Vec3::new(to.x, from.y, to.z))
}

/// Squared distance on the ground plane, ignoring height entirely.
#[must_use]
pub fn ground_distance_sq(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Step from `from` toward `to` by at most `step`, without overshooting.
#[must_use]
pub fn move_toward(from: Vec3, to: Vec3, step: f32) -> Vec3 {
    let delta = to - from;
    let dist = delta.length();
    if dist <= step || dist <= f32::EPSILON {
        return to;
    }
    from + delta / dist * step
}

/// Yaw (radians around Y) of a direction vector, measured from +Z.
///
/// Returns 0 for degenerate directions with no horizontal component.
#[must_use]
pub fn yaw_of(dir: Vec3) -> f32 {
    if dir.x.abs() < f32::EPSILON && dir.z.abs() < f32::EPSILON {
        0.0
    } else {
        dir.x.atan2(dir.z)
    }
}

/// Unit direction vector on the ground plane for a yaw angle.
#[must_use]
pub fn yaw_to_dir(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Wrap an angle into the `(-PI, PI]` range.
#[must_use]
pub fn wrap_angle(mut angle: f32) -> f32 {
    while angle > std::f32::consts::PI {
        angle -= TAU;
    }
    while angle <= -std::f32::consts::PI {
        angle += TAU;
    }
    angle
}

/// Signed shortest-arc difference `to - from`, wrapped.
#[must_use]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Rotate `current` toward `target` by at most `max_step` radians along
/// the shortest arc. Returns the new angle, wrapped.
#[must_use]
pub fn rotate_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = angle_delta(current, target);
    if delta.abs() <= max_step {
        wrap_angle(target)
    } else {
        wrap_angle(current + max_step.copysign(delta))
    }
}

/// Rotate a vector around the Y axis by `yaw` radians.
///
/// Converts unit-local offsets (shoot points, docking points) into world
/// space given the hull facing.
#[must_use]
pub fn rotate_y(v: Vec3, yaw: f32) -> Vec3 {
    let (sin, cos) = yaw.sin_cos();
    Vec3::new(v.x * cos + v.z * sin, v.y, -v.x * sin + v.z * cos)
}

/// Deterministic pseudo-random number generator for simulation decisions.
///
/// A linear congruential generator seeded once per world. Attack spread
/// offsets, formation jitter, turret idle sweeps and carry slot offsets all
/// draw from this so that a seeded world replays identically on the same
/// build. Not suitable for anything cryptographic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(0x5_DEEC_E66D).wrapping_add(11);
        self.state
    }

    /// Next value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() % 10000) as f32 / 10000.0
    }

    /// Next value in `[min, max)`.
    pub fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Random offset on the ground plane within a disc of `radius`.
    pub fn offset_in_disc(&mut self, radius: f32) -> Vec3 {
        let angle = self.next_f32() * TAU;
        let r = self.next_f32() * radius;
        Vec3::new(angle.sin() * r, 0.0, angle.cos() * r)
    }
}

/// Hash an `f32` by bit pattern into a `std::hash::Hasher`.
///
/// State hashing treats floats as opaque bit patterns; two identical runs
/// on the same build produce identical bits.
pub fn hash_f32<H: std::hash::Hasher>(hasher: &mut H, value: f32) {
    use std::hash::Hash;
    value.to_bits().hash(hasher);
}

/// Hash a `Vec3` by component bit patterns.
pub fn hash_vec3<H: std::hash::Hasher>(hasher: &mut H, value: Vec3) {
    hash_f32(hasher, value.x);
    hash_f32(hasher, value.y);
    hash_f32(hasher, value.z);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_distance_ignores_height_difference() {
        let ground = Vec3::new(0.0, 0.0, 0.0);
        let above_target = Vec3::new(3.0, 12.0, 4.0);
        // 3² + 4² = 25 regardless of the 12 unit height difference
        assert!((level_distance_sq(above_target, ground) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_move_toward_does_not_overshoot() {
        let from = Vec3::ZERO;
        let to = Vec3::new(1.0, 0.0, 0.0);
        let stepped = move_toward(from, to, 5.0);
        assert_eq!(stepped, to);

        let partial = move_toward(from, Vec3::new(10.0, 0.0, 0.0), 1.0);
        assert!((partial.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * std::f32::consts::PI) - std::f32::consts::PI).abs() < 1e-5);
        assert!(wrap_angle(-4.0 * std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_rotate_toward_takes_shortest_arc() {
        // From just below +PI to just above -PI: the short way crosses the seam
        let current = 3.0;
        let target = -3.0;
        let next = rotate_toward(current, target, 0.1);
        assert!(next > current || next < -3.0 + 0.2, "rotated the long way: {next}");

        // Within tolerance snaps exactly
        assert_eq!(rotate_toward(1.0, 1.05, 0.1), 1.05);
    }

    #[test]
    fn test_rotate_y_matches_yaw_dir() {
        // Rotating +Z by a yaw must land on yaw_to_dir(yaw)
        for yaw in [-1.2f32, 0.0, 0.7, 2.4] {
            let rotated = rotate_y(Vec3::Z, yaw);
            let expected = yaw_to_dir(yaw);
            assert!((rotated - expected).length() < 1e-5);
        }
    }

    #[test]
    fn test_yaw_round_trip() {
        for yaw in [-2.0f32, -0.5, 0.0, 0.9, 2.8] {
            let dir = yaw_to_dir(yaw);
            assert!((yaw_of(dir) - yaw).abs() < 1e-4);
        }
    }

    #[test]
    fn test_rng_determinism() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_rng_range_bounds() {
        let mut rng = SimRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_range(2.0, 5.0);
            assert!(v >= 2.0 && v < 5.0);
        }
    }

    #[test]
    fn test_offset_in_disc_within_radius() {
        let mut rng = SimRng::new(99);
        for _ in 0..100 {
            let offset = rng.offset_in_disc(3.0);
            assert!(offset.length() <= 3.0 + 1e-4);
            assert_eq!(offset.y, 0.0);
        }
    }
}
