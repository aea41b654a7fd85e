//! Session state machine and the authoritative simulation tick
//!
//! `Session` is plain synchronous state. Every operation writes the
//! messages it wants delivered and the timers it wants scheduled into an
//! [`Outbox`]; the room task owning the session does the actual I/O.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{COUNTDOWN_STEP, INVINCIBILITY_DURATION};
use crate::ws::protocol::{CarType, GameStateView, LeaderboardEntry, RacePhase, ServerMsg};

use super::leaderboard::Leaderboard;
use super::physics::{PhysicsSystem, RaceRules};
use super::player::{InputKind, InputOutcome, PlayerRegistry};
use super::track::{TrackGenerator, TrackLayout};

pub const MAX_CHAT_LEN: usize = 200;

/// Who a message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Connection(Uuid),
}

/// Deferred work the session asks its owner to schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Countdown {
        race_id: u64,
        after: Duration,
    },
    InvincibilityExpiry {
        player_id: Uuid,
        race_id: u64,
        grant: u64,
        after: Duration,
    },
}

/// Messages and timers produced by one session operation
#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<(Recipient, ServerMsg)>,
    pub timers: Vec<TimerRequest>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&mut self, msg: ServerMsg) {
        self.messages.push((Recipient::All, msg));
    }

    pub fn direct(&mut self, connection: Uuid, msg: ServerMsg) {
        self.messages.push((Recipient::Connection(connection), msg));
    }

    pub fn schedule(&mut self, timer: TimerRequest) {
        self.timers.push(timer);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.timers.is_empty()
    }
}

/// The one global race session
pub struct Session {
    rules: RaceRules,
    phase: RacePhase,
    countdown: u32,
    race_start: Option<u64>,
    /// Bumped whenever a countdown begins or the session resets, so timers
    /// scheduled for an earlier race are ignored
    race_id: u64,
    players: PlayerRegistry,
    track: TrackLayout,
    generator: TrackGenerator,
    leaderboard: Leaderboard,
    rng: ChaCha8Rng,
}

impl Session {
    pub fn new(rules: RaceRules, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let generator = TrackGenerator::new(rules.track_length);
        let track = generator.generate(&mut rng);

        Self {
            rules,
            phase: RacePhase::Lobby,
            countdown: 0,
            race_start: None,
            race_id: 0,
            players: PlayerRegistry::new(),
            track,
            generator,
            leaderboard: Leaderboard::new(rules.leaderboard_size),
            rng,
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    #[cfg(test)]
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    #[cfg(test)]
    pub fn race_start(&self) -> Option<u64> {
        self.race_start
    }

    #[cfg(test)]
    pub fn race_id(&self) -> u64 {
        self.race_id
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.leaderboard.snapshot()
    }

    /// Full state for init and resync messages
    pub fn snapshot(&self) -> GameStateView {
        GameStateView {
            phase: self.phase,
            countdown: self.countdown,
            race_start_time: self.race_start,
            track_length: self.rules.track_length,
            laps_to_win: self.rules.laps_to_win,
            players: self.players.views(),
            powerups: self.track.powerups.clone(),
            obstacles: self.track.obstacles.clone(),
            leaderboard: self.leaderboard.snapshot(),
        }
    }

    // ------------------------------------------------------------------
    // Registry events
    // ------------------------------------------------------------------

    pub fn join(&mut self, connection: Uuid, name: &str, out: &mut Outbox) {
        let Some(player) = self.players.join(connection, name, &mut self.rng) else {
            debug!(player_id = %connection, "Duplicate join ignored");
            return;
        };
        let view = player.view();

        info!(
            player_id = %connection,
            name = %view.name,
            player_count = self.players.len(),
            "Player joined"
        );

        out.direct(
            connection,
            ServerMsg::Init {
                your_id: connection,
                state: self.snapshot(),
            },
        );
        out.broadcast(ServerMsg::PlayerJoined { player: view });
        out.broadcast(self.lobby_update());
    }

    /// Drop a player; an empty registry resets the session
    pub fn leave(&mut self, connection: Uuid, out: &mut Outbox) {
        let Some((player, now_empty)) = self.players.leave(connection) else {
            return;
        };

        info!(
            player_id = %connection,
            name = %player.name,
            player_count = self.players.len(),
            "Player left"
        );

        out.broadcast(ServerMsg::PlayerLeft {
            player_id: connection,
        });
        out.broadcast(self.lobby_update());

        if now_empty {
            self.reset(out);
        }
    }

    pub fn chat(&mut self, connection: Uuid, text: &str, now: u64, out: &mut Outbox) {
        let Some(player) = self.players.get(&connection) else {
            return;
        };
        let text: String = text.trim().chars().take(MAX_CHAT_LEN).collect();
        if text.is_empty() {
            return;
        }

        out.broadcast(ServerMsg::Chat {
            player_id: connection,
            name: player.name.clone(),
            text,
            timestamp: now,
        });
    }

    pub fn select_car(&mut self, connection: Uuid, car: CarType, out: &mut Outbox) {
        let Some(player) = self.players.get_mut(&connection) else {
            return;
        };
        player.car = car;
        let view = player.view();

        out.broadcast(ServerMsg::PlayerUpdated { player: view });
        out.broadcast(self.lobby_update());
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    /// lobby -> countdown
    pub fn start_race(&mut self, out: &mut Outbox) {
        if self.phase != RacePhase::Lobby || self.players.is_empty() {
            debug!(phase = ?self.phase, "Start request ignored");
            return;
        }

        self.race_id += 1;
        self.phase = RacePhase::Countdown;
        self.countdown = self.rules.countdown_secs;
        self.race_start = None;
        self.players.reset_race_fields();
        self.track = self.generator.generate(&mut self.rng);

        info!(race_id = self.race_id, players = self.players.len(), "Countdown started");

        out.broadcast(ServerMsg::PhaseChange {
            phase: self.phase,
            countdown: Some(self.countdown),
        });
        out.broadcast(self.track_elements());
        out.schedule(TimerRequest::Countdown {
            race_id: self.race_id,
            after: COUNTDOWN_STEP,
        });
    }

    /// One countdown second elapsed; at zero the race begins
    pub fn countdown_elapsed(&mut self, race_id: u64, now: u64, out: &mut Outbox) {
        if self.phase != RacePhase::Countdown || race_id != self.race_id {
            debug!(race_id, current = self.race_id, "Stale countdown timer");
            return;
        }

        self.countdown = self.countdown.saturating_sub(1);
        out.broadcast(ServerMsg::CountdownTick {
            countdown: self.countdown,
        });

        if self.countdown > 0 {
            out.schedule(TimerRequest::Countdown {
                race_id,
                after: COUNTDOWN_STEP,
            });
            return;
        }

        self.phase = RacePhase::Racing;
        self.race_start = Some(now);
        info!(race_id, "Race started");

        out.broadcast(ServerMsg::PhaseChange {
            phase: self.phase,
            countdown: None,
        });
        out.broadcast(ServerMsg::RaceStart { start_time: now });
    }

    /// Any phase -> lobby
    pub fn reset(&mut self, out: &mut Outbox) {
        self.race_id += 1;
        self.phase = RacePhase::Lobby;
        self.countdown = 0;
        self.race_start = None;
        self.players.reset_race_fields();
        self.track = self.generator.generate(&mut self.rng);

        info!(race_id = self.race_id, players = self.players.len(), "Session reset");

        out.broadcast(ServerMsg::GameReset);
        out.broadcast(ServerMsg::FullState {
            state: self.snapshot(),
        });
    }

    // ------------------------------------------------------------------
    // Race inputs
    // ------------------------------------------------------------------

    pub fn click(&mut self, connection: Uuid) {
        self.players
            .record_input(connection, InputKind::Click, self.phase, &self.rules);
    }

    pub fn use_powerup(&mut self, connection: Uuid, out: &mut Outbox) {
        let outcome =
            self.players
                .record_input(connection, InputKind::UsePowerup, self.phase, &self.rules);

        if let Some(InputOutcome::PowerupUsed { grant }) = outcome {
            debug!(player_id = %connection, grant, "Powerup used");
            out.broadcast(ServerMsg::PowerupUsed {
                player_id: connection,
            });
            out.schedule(TimerRequest::InvincibilityExpiry {
                player_id: connection,
                race_id: self.race_id,
                grant,
                after: INVINCIBILITY_DURATION,
            });
        }
    }

    /// Timer callback clearing a powerup's invincibility
    pub fn invincibility_expired(
        &mut self,
        player_id: Uuid,
        race_id: u64,
        grant: u64,
        out: &mut Outbox,
    ) {
        if race_id != self.race_id {
            return;
        }
        if let Some(player) = self.players.expire_invincibility(player_id, grant) {
            out.broadcast(ServerMsg::PlayerUpdated {
                player: player.view(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Advance every unfinished player by one tick
    pub fn tick(&mut self, now: u64, out: &mut Outbox) {
        if self.phase != RacePhase::Racing {
            return;
        }

        let rules = self.rules;
        let finish_line = rules.finish_distance();
        let race_start = self.race_start.unwrap_or(now);
        let mut finishers = self.players.finished_count();
        let mut changed = false;

        for player in self.players.values_mut() {
            if player.finished {
                continue;
            }
            let before = (player.position, player.speed);

            player.position += player.speed;

            if player.position >= rules.track_length * player.lap as f64
                && player.lap < rules.laps_to_win
            {
                player.lap += 1;
                out.broadcast(ServerMsg::LapComplete {
                    player_id: player.id,
                    lap: player.lap,
                });
            }

            let lap_position = rules.lap_position(player.position);

            for powerup_id in self
                .track
                .collect_powerups(lap_position, rules.pickup_radius)
            {
                player.has_powerup = true;
                changed = true;
                out.broadcast(ServerMsg::PowerupCollected {
                    player_id: player.id,
                    powerup_id,
                });
            }

            if !player.invincible {
                for obstacle_id in self
                    .track
                    .obstacles_hit(lap_position, rules.collision_radius)
                {
                    player.speed = PhysicsSystem::collide(player.speed, &rules);
                    out.broadcast(ServerMsg::ObstacleHit {
                        player_id: player.id,
                        obstacle_id,
                    });
                }
            }

            player.speed = PhysicsSystem::apply_friction(player.speed, &rules);

            if player.position >= finish_line {
                player.position = finish_line;
                player.finished = true;
                let elapsed = now.saturating_sub(race_start);
                player.finish_time_ms = Some(elapsed);
                player.total_races += 1;
                if player.best_time_ms.map_or(true, |best| elapsed < best) {
                    player.best_time_ms = Some(elapsed);
                }

                finishers += 1;
                if finishers == 1 {
                    player.wins += 1;
                }

                if self.leaderboard.record(&player.name, elapsed, player.clicks) {
                    debug!(entries = self.leaderboard.len(), "Leaderboard changed");
                }

                info!(
                    player_id = %player.id,
                    name = %player.name,
                    rank = finishers,
                    time_ms = elapsed,
                    "Player finished"
                );

                out.broadcast(ServerMsg::PlayerFinished {
                    player_id: player.id,
                    name: player.name.clone(),
                    rank: finishers as u32,
                    time_ms: elapsed,
                    clicks: player.clicks,
                });
                out.broadcast(ServerMsg::LeaderboardUpdate {
                    entries: self.leaderboard.snapshot(),
                });
                changed = true;
            }

            if (player.position, player.speed) != before {
                changed = true;
            }
        }

        if self.players.all_finished() {
            self.phase = RacePhase::Finished;
            info!(race_id = self.race_id, "All players finished");
            out.broadcast(ServerMsg::PhaseChange {
                phase: self.phase,
                countdown: None,
            });
        }

        if changed {
            out.broadcast(ServerMsg::PlayersUpdate {
                players: self.players.views(),
            });
        }
    }

    fn lobby_update(&self) -> ServerMsg {
        ServerMsg::LobbyUpdate {
            players: self.players.lobby_roster(),
        }
    }

    fn track_elements(&self) -> ServerMsg {
        ServerMsg::TrackElements {
            powerups: self.track.powerups.clone(),
            obstacles: self.track.obstacles.clone(),
        }
    }
}

/// Seed from the config, or a random one
pub fn session_seed(configured: Option<u64>) -> u64 {
    configured.unwrap_or_else(|| rand::thread_rng().gen())
}
