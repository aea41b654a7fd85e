//! Periodic full-state resync

use crate::ws::protocol::ServerMsg;

use super::session::Session;

/// Decides when the room re-sends the whole session state
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Build the resync message, or nothing when nobody is playing
    pub fn build(&self, session: &Session) -> Option<ServerMsg> {
        if session.players().is_empty() {
            return None;
        }
        Some(ServerMsg::FullState {
            state: session.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::RaceRules;
    use crate::game::session::Outbox;
    use uuid::Uuid;

    #[test]
    fn fires_every_interval() {
        let mut builder = SnapshotBuilder::new(3);
        let fired: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn zero_interval_fires_every_tick() {
        let mut builder = SnapshotBuilder::new(0);
        assert!(builder.should_send());
        assert!(builder.should_send());
    }

    #[test]
    fn empty_session_sends_nothing() {
        let builder = SnapshotBuilder::new(1);
        let mut session = Session::new(RaceRules::default(), 1);
        assert!(builder.build(&session).is_none());

        session.join(Uuid::new_v4(), "a", &mut Outbox::new());
        match builder.build(&session) {
            Some(ServerMsg::FullState { state }) => assert_eq!(state.players.len(), 1),
            other => panic!("expected full state, got {:?}", other),
        }
    }
}
