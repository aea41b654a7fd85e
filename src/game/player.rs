//! Player state and the connection-keyed registry

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::ws::protocol::{CarType, LobbyPlayer, PlayerView, RacePhase};

use super::physics::{PhysicsSystem, RaceRules};

/// Colors handed out to players on join
pub const COLOR_PALETTE: [&str; 8] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22", "#1abc9c", "#ff6b81",
];

pub const MAX_NAME_LEN: usize = 20;

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub car: CarType,

    // Race-local
    pub position: f64,
    pub speed: f64,
    pub lap: u32,
    pub finished: bool,
    pub finish_time_ms: Option<u64>,
    pub clicks: u32,
    pub has_powerup: bool,
    pub invincible: bool,
    /// Bumped on every powerup activation so only the latest expiry applies
    pub invincibility_grant: u64,

    // Cumulative
    pub total_races: u32,
    pub wins: u32,
    pub best_time_ms: Option<u64>,
}

impl Player {
    pub fn new(id: Uuid, name: String, color: String) -> Self {
        Self {
            id,
            name,
            color,
            car: CarType::default(),
            position: 0.0,
            speed: 0.0,
            lap: 1,
            finished: false,
            finish_time_ms: None,
            clicks: 0,
            has_powerup: false,
            invincible: false,
            invincibility_grant: 0,
            total_races: 0,
            wins: 0,
            best_time_ms: None,
        }
    }

    /// Clear everything that only lives for one race
    pub fn reset_race_fields(&mut self) {
        self.position = 0.0;
        self.speed = 0.0;
        self.lap = 1;
        self.finished = false;
        self.finish_time_ms = None;
        self.clicks = 0;
        self.has_powerup = false;
        self.invincible = false;
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            position: self.position,
            speed: self.speed,
            lap: self.lap,
            finished: self.finished,
            finish_time_ms: self.finish_time_ms,
            clicks: self.clicks,
            has_powerup: self.has_powerup,
            invincible: self.invincible,
            color: self.color.clone(),
            car: self.car,
            total_races: self.total_races,
            wins: self.wins,
            best_time_ms: self.best_time_ms,
        }
    }

    pub fn lobby_entry(&self) -> LobbyPlayer {
        LobbyPlayer {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            car: self.car,
            wins: self.wins,
        }
    }
}

/// Discrete race inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Click,
    UsePowerup,
}

/// What an accepted input did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Clicked,
    /// Powerup spent; `grant` identifies this invincibility window
    PowerupUsed { grant: u64 },
}

/// Connected players keyed by connection id
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<Uuid, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player with fresh race state. Blank names become `Player<N>`
    /// from the current registry size, so defaults can repeat.
    /// Returns `None` if the connection already joined.
    pub fn join<R: Rng + ?Sized>(&mut self, id: Uuid, name: &str, rng: &mut R) -> Option<&Player> {
        if self.players.contains_key(&id) {
            return None;
        }

        let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        let name = if trimmed.is_empty() {
            format!("Player{}", self.players.len() + 1)
        } else {
            trimmed
        };
        let color = COLOR_PALETTE
            .choose(rng)
            .copied()
            .unwrap_or(COLOR_PALETTE[0])
            .to_string();

        self.players.insert(id, Player::new(id, name, color));
        self.players.get(&id)
    }

    /// Remove a player; the flag reports whether the registry is now empty
    pub fn leave(&mut self, id: Uuid) -> Option<(Player, bool)> {
        let player = self.players.remove(&id)?;
        Some((player, self.players.is_empty()))
    }

    /// Apply a click or powerup activation. Ignored (returns `None`) for
    /// unknown players, outside `racing`, after finishing, or when using a
    /// powerup that isn't held.
    pub fn record_input(
        &mut self,
        id: Uuid,
        kind: InputKind,
        phase: RacePhase,
        rules: &RaceRules,
    ) -> Option<InputOutcome> {
        let player = self.players.get_mut(&id)?;
        if phase != RacePhase::Racing || player.finished {
            return None;
        }

        match kind {
            InputKind::Click => {
                player.clicks += 1;
                player.speed = PhysicsSystem::click(player.speed, player.has_powerup, rules);
                Some(InputOutcome::Clicked)
            }
            InputKind::UsePowerup => {
                if !player.has_powerup {
                    return None;
                }
                player.has_powerup = false;
                player.speed = PhysicsSystem::powerup_boost(player.speed, rules);
                player.invincible = true;
                player.invincibility_grant += 1;
                Some(InputOutcome::PowerupUsed {
                    grant: player.invincibility_grant,
                })
            }
        }
    }

    /// Clear invincibility if `grant` is still the latest activation
    pub fn expire_invincibility(&mut self, id: Uuid, grant: u64) -> Option<&Player> {
        let player = self.players.get_mut(&id)?;
        if !player.invincible || player.invincibility_grant != grant {
            return None;
        }
        player.invincible = false;
        Some(&*player)
    }

    pub fn reset_race_fields(&mut self) {
        for player in self.players.values_mut() {
            player.reset_race_fields();
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn finished_count(&self) -> usize {
        self.players.values().filter(|p| p.finished).count()
    }

    pub fn all_finished(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.finished)
    }

    pub fn views(&self) -> Vec<PlayerView> {
        self.players.values().map(Player::view).collect()
    }

    pub fn lobby_roster(&self) -> Vec<LobbyPlayer> {
        self.players.values().map(Player::lobby_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn join_creates_fresh_player() {
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        let player = registry.join(id, "  Alice  ", &mut rng()).unwrap();

        assert_eq!(player.name, "Alice");
        assert_eq!(player.position, 0.0);
        assert_eq!(player.speed, 0.0);
        assert_eq!(player.lap, 1);
        assert!(!player.finished);
        assert_eq!(player.car, CarType::Classic);
        assert!(COLOR_PALETTE.contains(&player.color.as_str()));
    }

    #[test]
    fn blank_names_get_positional_defaults() {
        let mut registry = PlayerRegistry::new();
        let mut rng = rng();
        let a = registry.join(Uuid::new_v4(), "", &mut rng).unwrap().name.clone();
        let b = registry.join(Uuid::new_v4(), "   ", &mut rng).unwrap().name.clone();

        assert_eq!(a, "Player1");
        assert_eq!(b, "Player2");
    }

    #[test]
    fn default_names_can_repeat_after_leave() {
        let mut registry = PlayerRegistry::new();
        let mut rng = rng();
        let first = Uuid::new_v4();
        registry.join(first, "", &mut rng);
        registry.join(Uuid::new_v4(), "", &mut rng);
        registry.leave(first);

        let third = registry.join(Uuid::new_v4(), "", &mut rng).unwrap();
        assert_eq!(third.name, "Player2");
    }

    #[test]
    fn long_names_are_truncated() {
        let mut registry = PlayerRegistry::new();
        let player = registry
            .join(Uuid::new_v4(), &"x".repeat(64), &mut rng())
            .unwrap();
        assert_eq!(player.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn double_join_is_ignored() {
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        registry.join(id, "a", &mut rng());
        assert!(registry.join(id, "b", &mut rng()).is_none());
        assert_eq!(registry.get(&id).unwrap().name, "a");
    }

    #[test]
    fn leave_reports_empty_registry() {
        let mut registry = PlayerRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join(a, "a", &mut rng());
        registry.join(b, "b", &mut rng());

        assert!(!registry.leave(a).unwrap().1);
        assert!(registry.leave(b).unwrap().1);
        assert!(registry.leave(b).is_none());
    }

    #[test]
    fn inputs_are_gated_by_phase_and_finish() {
        let rules = RaceRules::default();
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        registry.join(id, "a", &mut rng());

        assert!(registry
            .record_input(id, InputKind::Click, RacePhase::Lobby, &rules)
            .is_none());
        assert!(registry
            .record_input(Uuid::new_v4(), InputKind::Click, RacePhase::Racing, &rules)
            .is_none());
        assert_eq!(
            registry.record_input(id, InputKind::Click, RacePhase::Racing, &rules),
            Some(InputOutcome::Clicked)
        );
        assert_eq!(registry.get(&id).unwrap().clicks, 1);

        registry.get_mut(&id).unwrap().finished = true;
        assert!(registry
            .record_input(id, InputKind::Click, RacePhase::Racing, &rules)
            .is_none());
        assert_eq!(registry.get(&id).unwrap().clicks, 1);
    }

    #[test]
    fn powerup_requires_holding_one() {
        let rules = RaceRules::default();
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        registry.join(id, "a", &mut rng());

        assert!(registry
            .record_input(id, InputKind::UsePowerup, RacePhase::Racing, &rules)
            .is_none());

        registry.get_mut(&id).unwrap().has_powerup = true;
        let outcome = registry.record_input(id, InputKind::UsePowerup, RacePhase::Racing, &rules);
        assert_eq!(outcome, Some(InputOutcome::PowerupUsed { grant: 1 }));

        let player = registry.get(&id).unwrap();
        assert!(!player.has_powerup);
        assert!(player.invincible);
        assert_eq!(player.speed, rules.powerup_boost);
    }

    #[test]
    fn stale_invincibility_grant_is_ignored() {
        let rules = RaceRules::default();
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        registry.join(id, "a", &mut rng());

        for _ in 0..2 {
            registry.get_mut(&id).unwrap().has_powerup = true;
            registry.record_input(id, InputKind::UsePowerup, RacePhase::Racing, &rules);
        }

        assert!(registry.expire_invincibility(id, 1).is_none());
        assert!(registry.get(&id).unwrap().invincible);
        assert!(registry.expire_invincibility(id, 2).is_some());
        assert!(!registry.get(&id).unwrap().invincible);
    }

    #[test]
    fn reset_keeps_cumulative_fields() {
        let mut registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        registry.join(id, "a", &mut rng());
        {
            let p = registry.get_mut(&id).unwrap();
            p.position = 15000.0;
            p.speed = 12.0;
            p.lap = 3;
            p.finished = true;
            p.finish_time_ms = Some(30_000);
            p.clicks = 99;
            p.has_powerup = true;
            p.invincible = true;
            p.total_races = 4;
            p.wins = 2;
            p.best_time_ms = Some(28_000);
        }

        registry.reset_race_fields();

        let p = registry.get(&id).unwrap();
        assert_eq!((p.position, p.speed, p.lap, p.clicks), (0.0, 0.0, 1, 0));
        assert!(!p.finished && !p.has_powerup && !p.invincible);
        assert_eq!(p.finish_time_ms, None);
        assert_eq!((p.total_races, p.wins, p.best_time_ms), (4, 2, Some(28_000)));
    }
}
