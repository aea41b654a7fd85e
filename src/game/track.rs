//! Powerup and obstacle placement for each race

use rand::Rng;

use crate::ws::protocol::{Obstacle, ObstacleKind, Powerup, PowerupKind};

use super::physics::PhysicsSystem;

pub const POWERUP_COUNT: usize = 15;
pub const OBSTACLE_COUNT: usize = 10;

/// Max jitter as a fraction of the spacing between entities
const JITTER_FRACTION: f64 = 0.3;

/// Entities placed on the track for one race
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackLayout {
    pub powerups: Vec<Powerup>,
    pub obstacles: Vec<Obstacle>,
}

impl TrackLayout {
    /// Clear every powerup that is still active and within `radius`.
    /// Returns the ids that were picked up.
    pub fn collect_powerups(&mut self, lap_position: f64, radius: f64) -> Vec<u32> {
        self.powerups
            .iter_mut()
            .filter(|p| p.active && PhysicsSystem::within(lap_position, p.position, radius))
            .map(|p| {
                p.active = false;
                p.id
            })
            .collect()
    }

    /// Ids of every obstacle within `radius`
    pub fn obstacles_hit(&self, lap_position: f64, radius: f64) -> Vec<u32> {
        self.obstacles
            .iter()
            .filter(|o| PhysicsSystem::within(lap_position, o.position, radius))
            .map(|o| o.id)
            .collect()
    }
}

/// Builds fresh track layouts
pub struct TrackGenerator {
    track_length: f64,
}

impl TrackGenerator {
    pub fn new(track_length: f64) -> Self {
        Self { track_length }
    }

    /// Spread 15 powerups and 10 obstacles over one lap with per-entity jitter
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> TrackLayout {
        let powerups = self
            .placements(POWERUP_COUNT, rng)
            .into_iter()
            .enumerate()
            .map(|(id, position)| Powerup {
                id: id as u32,
                position,
                active: true,
                kind: PowerupKind::Boost,
            })
            .collect();

        let obstacles = self
            .placements(OBSTACLE_COUNT, rng)
            .into_iter()
            .enumerate()
            .map(|(id, position)| Obstacle {
                id: id as u32,
                position,
                kind: ObstacleKind::Cone,
            })
            .collect();

        TrackLayout {
            powerups,
            obstacles,
        }
    }

    /// Segment centres plus jitter, always strictly inside (0, track_length)
    fn placements<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<f64> {
        let segment = self.track_length / count as f64;
        let max_jitter = segment * JITTER_FRACTION;

        (0..count)
            .map(|i| {
                let centre = segment * (i as f64 + 0.5);
                centre + rng.gen_range(-max_jitter..=max_jitter)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn generates_expected_counts() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let layout = TrackGenerator::new(5000.0).generate(&mut rng);

        assert_eq!(layout.powerups.len(), POWERUP_COUNT);
        assert_eq!(layout.obstacles.len(), OBSTACLE_COUNT);
        assert!(layout.powerups.iter().all(|p| p.active));
    }

    #[test]
    fn positions_stay_inside_track() {
        let generator = TrackGenerator::new(5000.0);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let layout = generator.generate(&mut rng);

            for p in &layout.powerups {
                assert!(p.position > 0.0 && p.position < 5000.0, "{}", p.position);
            }
            for o in &layout.obstacles {
                assert!(o.position > 0.0 && o.position < 5000.0, "{}", o.position);
            }
        }
    }

    #[test]
    fn ids_are_unique_within_a_generation() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let layout = TrackGenerator::new(5000.0).generate(&mut rng);

        let powerup_ids: HashSet<u32> = layout.powerups.iter().map(|p| p.id).collect();
        assert_eq!(powerup_ids.len(), POWERUP_COUNT);

        let obstacle_ids: HashSet<u32> = layout.obstacles.iter().map(|o| o.id).collect();
        assert_eq!(obstacle_ids.len(), OBSTACLE_COUNT);
    }

    #[test]
    fn powerups_are_collected_once() {
        let mut layout = TrackLayout {
            powerups: vec![Powerup {
                id: 3,
                position: 1000.0,
                active: true,
                kind: PowerupKind::Boost,
            }],
            obstacles: Vec::new(),
        };

        assert_eq!(layout.collect_powerups(1030.0, 50.0), vec![3]);
        assert!(layout.collect_powerups(1000.0, 50.0).is_empty());
        assert!(!layout.powerups[0].active);
    }

    #[test]
    fn obstacles_stay_hittable() {
        let layout = TrackLayout {
            powerups: Vec::new(),
            obstacles: vec![Obstacle {
                id: 0,
                position: 500.0,
                kind: ObstacleKind::Cone,
            }],
        };

        assert_eq!(layout.obstacles_hit(520.0, 40.0), vec![0]);
        assert_eq!(layout.obstacles_hit(520.0, 40.0), vec![0]);
        assert!(layout.obstacles_hit(540.0, 40.0).is_empty());
    }
}
