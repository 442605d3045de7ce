//! Group-move waypoint geometry.
//!
//! A group command carries one destination; these functions turn it into
//! per-unit waypoints. The offset strategy preserves the group's current
//! arrangement (tightened), the grid strategy imposes a near-square block,
//! and the combined strategy matches each unit's tightened spot to the
//! nearest free grid cell so the result is compact but never stacks two
//! units on one point.
//!
//! Everything here is pure geometry; callers apply the waypoints as move
//! orders.

use glam::Vec3;

use crate::math::SimRng;

/// Scale applied to each unit's offset from the group centroid.
const OFFSET_TIGHTEN: f32 = 4.0;

/// Waypoints that keep the group's relative arrangement.
///
/// Each unit's offset from the centroid is divided by [`OFFSET_TIGHTEN`]
/// and added to the destination, then a relaxation pass pushes apart any
/// two waypoints closer than `min_separation` along their connecting
/// vector. Output order matches `positions`; all waypoints sit on the
/// destination's height.
#[must_use]
pub fn spread_offsets(positions: &[Vec3], destination: Vec3, min_separation: f32) -> Vec<Vec3> {
    if positions.is_empty() {
        return Vec::new();
    }
    let centroid = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
    let mut waypoints: Vec<Vec3> = positions
        .iter()
        .map(|p| {
            let mut offset = (*p - centroid) / OFFSET_TIGHTEN;
            offset.y = 0.0;
            destination + offset
        })
        .collect();

    for a in 0..waypoints.len() {
        for b in (a + 1)..waypoints.len() {
            let delta = waypoints[b] - waypoints[a];
            let dist = delta.length();
            if dist >= min_separation {
                continue;
            }
            let push = if dist > 1e-5 {
                delta / dist * (min_separation - dist) * 0.5
            } else {
                // Same point; split along X.
                Vec3::X * min_separation * 0.5
            };
            waypoints[a] -= push;
            waypoints[b] += push;
        }
    }
    waypoints
}

/// Exactly `count` waypoints in a near-square grid centered on the
/// destination, each displaced by a small random jitter.
#[must_use]
pub fn grid_points(
    count: usize,
    destination: Vec3,
    spacing: f32,
    jitter: f32,
    rng: &mut SimRng,
) -> Vec<Vec3> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f32).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let origin = destination
        - Vec3::new(
            (cols - 1) as f32 * spacing * 0.5,
            0.0,
            (rows - 1) as f32 * spacing * 0.5,
        );

    let mut points = Vec::with_capacity(count);
    'grid: for row in 0..rows {
        for col in 0..cols {
            if points.len() == count {
                break 'grid;
            }
            let cell = origin + Vec3::new(col as f32 * spacing, 0.0, row as f32 * spacing);
            points.push(cell + rng.offset_in_disc(jitter));
        }
    }
    points
}

/// Per-unit waypoints combining both strategies.
///
/// Computes the tightened offset waypoints and a grid of the same size,
/// then greedily gives each unit the free grid point nearest its offset
/// waypoint, removing points as they are claimed. The result is a
/// bijection: every grid point is used exactly once.
#[must_use]
pub fn combined_assign(
    positions: &[Vec3],
    destination: Vec3,
    min_separation: f32,
    spacing: f32,
    jitter: f32,
    rng: &mut SimRng,
) -> Vec<Vec3> {
    let ideal = spread_offsets(positions, destination, min_separation);
    let mut pool = grid_points(positions.len(), destination, spacing, jitter, rng);

    let mut assigned = Vec::with_capacity(positions.len());
    for want in &ideal {
        let mut best = 0;
        let mut best_sq = f32::INFINITY;
        for (index, point) in pool.iter().enumerate() {
            let dist_sq = point.distance_squared(*want);
            if dist_sq < best_sq {
                best_sq = dist_sq;
                best = index;
            }
        }
        assigned.push(pool.swap_remove(best));
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(n: usize, gap: f32) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32 * gap, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_offsets_preserve_arrangement_tightened() {
        let positions = vec![Vec3::new(-8.0, 0.0, 0.0), Vec3::new(8.0, 0.0, 0.0)];
        let destination = Vec3::new(0.0, 0.0, 50.0);
        let waypoints = spread_offsets(&positions, destination, 1.5);

        // 16 apart tightens to 4 apart, centered on the destination.
        assert!((waypoints[0] - Vec3::new(-2.0, 0.0, 50.0)).length() < 1e-4);
        assert!((waypoints[1] - Vec3::new(2.0, 0.0, 50.0)).length() < 1e-4);
    }

    #[test]
    fn test_relaxation_enforces_separation() {
        let positions = vec![Vec3::ZERO, Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0)];
        let waypoints = spread_offsets(&positions, Vec3::new(10.0, 0.0, 10.0), 1.5);
        for a in 0..waypoints.len() {
            for b in (a + 1)..waypoints.len() {
                assert!(
                    waypoints[a].distance(waypoints[b]) > 0.5,
                    "waypoints {a} and {b} still stacked"
                );
            }
        }
    }

    #[test]
    fn test_grid_emits_exact_count() {
        let mut rng = SimRng::new(7);
        let points = grid_points(10, Vec3::ZERO, 2.0, 0.0, &mut rng);
        assert_eq!(points.len(), 10);

        // 10 units pack into a 4-wide grid.
        let max_x = points.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let min_x = points.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        assert!((max_x - min_x - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_combined_is_a_bijection() {
        let positions = line(9, 3.0);
        let mut rng = SimRng::new(42);
        let assigned = combined_assign(&positions, Vec3::new(20.0, 0.0, 20.0), 1.5, 2.0, 0.4, &mut rng);

        assert_eq!(assigned.len(), positions.len());
        for a in 0..assigned.len() {
            for b in (a + 1)..assigned.len() {
                assert!(
                    assigned[a].distance_squared(assigned[b]) > 1e-6,
                    "two units share a waypoint"
                );
            }
        }
    }

    #[test]
    fn test_combined_is_deterministic() {
        let positions = line(6, 2.5);
        let destination = Vec3::new(-15.0, 0.0, 4.0);

        let mut rng_a = SimRng::new(123);
        let mut rng_b = SimRng::new(123);
        let a = combined_assign(&positions, destination, 1.5, 2.0, 0.4, &mut rng_a);
        let b = combined_assign(&positions, destination, 1.5, 2.0, 0.4, &mut rng_b);
        assert_eq!(a, b);
    }

    proptest! {
        /// However the group is arranged, the combined strategy hands out
        /// exactly one waypoint per unit and never stacks two on a point.
        #[test]
        fn prop_combined_waypoints_are_distinct(
            xz in proptest::collection::vec((-200.0f32..200.0, -200.0f32..200.0), 1..32),
            seed in 0u64..1_000,
        ) {
            let positions: Vec<Vec3> = xz.iter().map(|&(x, z)| Vec3::new(x, 0.0, z)).collect();
            let mut rng = SimRng::new(seed);
            let assigned =
                combined_assign(&positions, Vec3::new(12.0, 0.0, -7.0), 1.5, 2.0, 0.4, &mut rng);

            prop_assert_eq!(assigned.len(), positions.len());
            for a in 0..assigned.len() {
                for b in (a + 1)..assigned.len() {
                    prop_assert!(assigned[a].distance_squared(assigned[b]) > 1e-6);
                }
            }
        }

        /// The grid always emits the requested number of waypoints.
        #[test]
        fn prop_grid_count_is_exact(count in 1usize..64, seed in 0u64..1_000) {
            let mut rng = SimRng::new(seed);
            let points = grid_points(count, Vec3::ZERO, 2.0, 0.3, &mut rng);
            prop_assert_eq!(points.len(), count);
        }
    }
}
