//! Speed and position rules along the one-dimensional track

/// Tunables for a race
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceRules {
    /// Length of one lap
    pub track_length: f64,
    /// Laps needed to finish
    pub laps_to_win: u32,
    /// Speed added per click
    pub click_boost: f64,
    /// Speed added per click while holding a powerup
    pub powered_click_boost: f64,
    /// Ceiling for click-driven speed
    pub max_speed: f64,
    /// Speed added when a powerup is activated
    pub powerup_boost: f64,
    /// Ceiling for boosted speed
    pub max_boost_speed: f64,
    /// Speed lost on hitting an obstacle
    pub obstacle_penalty: f64,
    /// Speed lost every tick
    pub friction: f64,
    /// Pickup distance for powerups
    pub pickup_radius: f64,
    /// Collision distance for obstacles
    pub collision_radius: f64,
    /// Countdown length in seconds
    pub countdown_secs: u32,
    /// Leaderboard size
    pub leaderboard_size: usize,
}

impl Default for RaceRules {
    fn default() -> Self {
        Self {
            track_length: 5000.0,
            laps_to_win: 3,
            click_boost: 2.0,
            powered_click_boost: 3.0,
            max_speed: 20.0,
            powerup_boost: 10.0,
            max_boost_speed: 30.0,
            obstacle_penalty: 5.0,
            friction: 0.1,
            pickup_radius: 50.0,
            collision_radius: 40.0,
            countdown_secs: 3,
            leaderboard_size: 10,
        }
    }
}

impl RaceRules {
    /// Total distance to the finish line
    pub fn finish_distance(&self) -> f64 {
        self.track_length * self.laps_to_win as f64
    }

    /// Distance into the current lap
    pub fn lap_position(&self, position: f64) -> f64 {
        position.rem_euclid(self.track_length)
    }
}

/// Stateless speed updates applied by inputs and the tick loop
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Speed after one click. Never lowers a speed already above the
    /// ordinary ceiling from an activated boost.
    pub fn click(speed: f64, has_powerup: bool, rules: &RaceRules) -> f64 {
        let boost = if has_powerup {
            rules.powered_click_boost
        } else {
            rules.click_boost
        };
        let ceiling = rules.max_speed.max(speed);
        (speed + boost).min(ceiling)
    }

    /// Speed after activating a powerup
    pub fn powerup_boost(speed: f64, rules: &RaceRules) -> f64 {
        (speed + rules.powerup_boost).min(rules.max_boost_speed)
    }

    /// Speed after driving into an obstacle
    pub fn collide(speed: f64, rules: &RaceRules) -> f64 {
        (speed - rules.obstacle_penalty).max(0.0)
    }

    /// Speed after one tick of friction
    pub fn apply_friction(speed: f64, rules: &RaceRules) -> f64 {
        if speed > 0.0 {
            (speed - rules.friction).max(0.0)
        } else {
            speed
        }
    }

    /// Whether two track positions are strictly closer than `radius`
    pub fn within(a: f64, b: f64, radius: f64) -> bool {
        (a - b).abs() < radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicks_cap_at_max_speed() {
        let rules = RaceRules::default();
        let mut speed = 0.0;
        for _ in 0..50 {
            speed = PhysicsSystem::click(speed, false, &rules);
        }
        assert_eq!(speed, rules.max_speed);
    }

    #[test]
    fn powered_click_adds_more() {
        let rules = RaceRules::default();
        assert_eq!(PhysicsSystem::click(0.0, false, &rules), 2.0);
        assert_eq!(PhysicsSystem::click(0.0, true, &rules), 3.0);
    }

    #[test]
    fn click_keeps_boosted_speed() {
        let rules = RaceRules::default();
        assert_eq!(PhysicsSystem::click(25.0, false, &rules), 25.0);
        assert_eq!(PhysicsSystem::click(19.5, false, &rules), 20.0);
    }

    #[test]
    fn boost_caps_at_max_boost_speed() {
        let rules = RaceRules::default();
        assert_eq!(PhysicsSystem::powerup_boost(5.0, &rules), 15.0);
        assert_eq!(PhysicsSystem::powerup_boost(25.0, &rules), 30.0);
    }

    #[test]
    fn collision_and_friction_floor_at_zero() {
        let rules = RaceRules::default();
        assert_eq!(PhysicsSystem::collide(3.0, &rules), 0.0);
        assert_eq!(PhysicsSystem::collide(12.0, &rules), 7.0);
        assert_eq!(PhysicsSystem::apply_friction(0.05, &rules), 0.0);
        assert_eq!(PhysicsSystem::apply_friction(0.0, &rules), 0.0);
    }

    #[test]
    fn lap_position_wraps() {
        let rules = RaceRules::default();
        assert_eq!(rules.finish_distance(), 15000.0);
        assert_eq!(rules.lap_position(5100.0), 100.0);
        assert_eq!(rules.lap_position(300.0), 300.0);
    }

    #[test]
    fn within_is_strict() {
        assert!(PhysicsSystem::within(100.0, 149.0, 50.0));
        assert!(!PhysicsSystem::within(100.0, 150.0, 50.0));
    }
}
