//! Game simulation modules

pub mod leaderboard;
pub mod physics;
pub mod player;
pub mod room;
pub mod session;
pub mod snapshot;
pub mod track;

pub use physics::RaceRules;
pub use room::{GameRoom, RoomError, RoomHandle};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Client message received from a WebSocket connection
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub connection_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
