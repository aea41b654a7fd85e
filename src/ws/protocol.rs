//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cosmetic car selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarType {
    #[default]
    Classic,
    Sport,
    Truck,
    Buggy,
}

/// Top-level session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    Lobby,
    Countdown,
    Racing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupKind {
    #[default]
    Boost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    #[default]
    Cone,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the lobby under a display name (empty picks a default)
    Join {
        #[serde(default)]
        name: String,
    },

    Chat {
        text: String,
    },

    SelectCar {
        car: CarType,
    },

    /// Request the lobby to begin the countdown
    StartRace,

    /// One click of speed
    Click,

    /// Spend the held powerup
    UsePowerup,

    /// Send everyone back to the lobby
    Reset,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full state, sent only to a newly joined connection
    Init {
        your_id: Uuid,
        state: GameStateView,
    },

    PlayerJoined {
        player: PlayerView,
    },

    PlayerUpdated {
        player: PlayerView,
    },

    PlayerLeft {
        player_id: Uuid,
    },

    /// Roster shown in the lobby
    LobbyUpdate {
        players: Vec<LobbyPlayer>,
    },

    PhaseChange {
        phase: RacePhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        countdown: Option<u32>,
    },

    /// Freshly generated track entities
    TrackElements {
        powerups: Vec<Powerup>,
        obstacles: Vec<Obstacle>,
    },

    CountdownTick {
        countdown: u32,
    },

    RaceStart {
        start_time: u64,
    },

    LapComplete {
        player_id: Uuid,
        lap: u32,
    },

    PowerupCollected {
        player_id: Uuid,
        powerup_id: u32,
    },

    ObstacleHit {
        player_id: Uuid,
        obstacle_id: u32,
    },

    PowerupUsed {
        player_id: Uuid,
    },

    PlayerFinished {
        player_id: Uuid,
        name: String,
        /// Order of crossing the line within this race, starting at 1
        rank: u32,
        time_ms: u64,
        clicks: u32,
    },

    LeaderboardUpdate {
        entries: Vec<LeaderboardEntry>,
    },

    GameReset,

    /// Periodic full-state resync
    FullState {
        state: GameStateView,
    },

    /// All players, sent on every tick where something moved
    PlayersUpdate {
        players: Vec<PlayerView>,
    },

    Chat {
        player_id: Uuid,
        name: String,
        text: String,
        timestamp: u64,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player state as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub position: f64,
    pub speed: f64,
    pub lap: u32,
    pub finished: bool,
    pub finish_time_ms: Option<u64>,
    pub clicks: u32,
    pub has_powerup: bool,
    pub invincible: bool,
    pub color: String,
    pub car: CarType,
    pub total_races: u32,
    pub wins: u32,
    pub best_time_ms: Option<u64>,
}

/// Player entry in the lobby roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub car: CarType,
    pub wins: u32,
}

/// Pickup that boosts the next clicks and can be activated once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Powerup {
    pub id: u32,
    /// Distance from the start of a lap
    pub position: f64,
    pub active: bool,
    pub kind: PowerupKind,
}

/// Track hazard that slows anyone driving through it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    /// Distance from the start of a lap
    pub position: f64,
    pub kind: ObstacleKind,
}

/// One row of the best-times table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub time_ms: u64,
    pub clicks: u32,
}

/// Everything a client needs to render the session from scratch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateView {
    pub phase: RacePhase,
    pub countdown: u32,
    pub race_start_time: Option<u64>,
    pub track_length: f64,
    pub laps_to_win: u32,
    pub players: Vec<PlayerView>,
    pub powerups: Vec<Powerup>,
    pub obstacles: Vec<Obstacle>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"start_race"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::StartRace));

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"select_car","car":"truck"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::SelectCar { car: CarType::Truck }));
    }

    #[test]
    fn join_without_name_defaults_to_empty() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        match msg {
            ClientMsg::Join { name } => assert!(name.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_car_is_rejected() {
        let parsed = serde_json::from_str::<ClientMsg>(r#"{"type":"select_car","car":"tank"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn phase_change_omits_missing_countdown() {
        let json = serde_json::to_value(ServerMsg::PhaseChange {
            phase: RacePhase::Racing,
            countdown: None,
        })
        .unwrap();

        assert_eq!(json["type"], "phase_change");
        assert_eq!(json["phase"], "racing");
        assert!(json.get("countdown").is_none());
    }
}
