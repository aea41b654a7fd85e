//! The race room task: sole owner of the session

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_duration, unix_millis, FULL_STATE_INTERVAL_TICKS};
use crate::ws::protocol::{ClientMsg, LeaderboardEntry, RacePhase, ServerMsg};

use super::physics::RaceRules;
use super::session::{Outbox, Recipient, Session, TimerRequest};
use super::snapshot::SnapshotBuilder;
use super::PlayerInput;

const COMMAND_CHANNEL_CAPACITY: usize = 1024;
const BROADCAST_CAPACITY: usize = 256;
const DIRECT_CHANNEL_CAPACITY: usize = 32;

/// Everything the room reacts to besides its own tick
#[derive(Debug)]
pub enum RoomCommand {
    Connect {
        connection_id: Uuid,
        direct_tx: mpsc::Sender<ServerMsg>,
    },
    Input(PlayerInput),
    Disconnect {
        connection_id: Uuid,
    },
    CountdownElapsed {
        race_id: u64,
    },
    InvincibilityElapsed {
        player_id: Uuid,
        race_id: u64,
        grant: u64,
    },
    QueryLeaderboard {
        reply: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Race room is not running")]
    Closed,
}

/// Counters readable without going through the room task
#[derive(Debug, Default)]
pub struct RoomStats {
    connections: AtomicUsize,
    players: AtomicUsize,
}

/// Handle to the running room
#[derive(Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::Sender<RoomCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<RoomStats>,
    phase_rx: watch::Receiver<RacePhase>,
}

impl RoomHandle {
    /// Register a connection. Returns its direct channel and a subscription
    /// to room-wide broadcasts.
    pub async fn connect(
        &self,
        connection_id: Uuid,
    ) -> Result<(mpsc::Receiver<ServerMsg>, broadcast::Receiver<ServerMsg>), RoomError> {
        let (direct_tx, direct_rx) = mpsc::channel(DIRECT_CHANNEL_CAPACITY);
        // Subscribe first so nothing broadcast after registration is missed
        let broadcast_rx = self.broadcast_tx.subscribe();

        self.cmd_tx
            .send(RoomCommand::Connect {
                connection_id,
                direct_tx,
            })
            .await
            .map_err(|_| RoomError::Closed)?;

        Ok((direct_rx, broadcast_rx))
    }

    pub async fn send_input(&self, input: PlayerInput) -> Result<(), RoomError> {
        self.cmd_tx
            .send(RoomCommand::Input(input))
            .await
            .map_err(|_| RoomError::Closed)
    }

    pub async fn disconnect(&self, connection_id: Uuid) -> Result<(), RoomError> {
        self.cmd_tx
            .send(RoomCommand::Disconnect { connection_id })
            .await
            .map_err(|_| RoomError::Closed)
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::QueryLeaderboard { reply })
            .await
            .map_err(|_| RoomError::Closed)?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    pub fn connection_count(&self) -> usize {
        self.stats.connections.load(Ordering::Relaxed)
    }

    pub fn player_count(&self) -> usize {
        self.stats.players.load(Ordering::Relaxed)
    }

    /// Phase as of the last command or tick the room processed
    pub fn phase(&self) -> RacePhase {
        *self.phase_rx.borrow()
    }
}

/// The authoritative race room
pub struct GameRoom {
    session: Session,
    cmd_rx: mpsc::Receiver<RoomCommand>,
    /// Weak so pending timers don't keep the room alive
    timer_tx: mpsc::WeakSender<RoomCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    connections: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
    snapshot_builder: SnapshotBuilder,
    stats: Arc<RoomStats>,
    phase_tx: watch::Sender<RacePhase>,
}

impl GameRoom {
    pub fn new(rules: RaceRules, seed: u64) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let stats = Arc::new(RoomStats::default());
        let session = Session::new(rules, seed);
        let (phase_tx, phase_rx) = watch::channel(session.phase());

        let room = Self {
            session,
            cmd_rx,
            timer_tx: cmd_tx.downgrade(),
            broadcast_tx: broadcast_tx.clone(),
            connections: HashMap::new(),
            snapshot_builder: SnapshotBuilder::new(FULL_STATE_INTERVAL_TICKS),
            stats: stats.clone(),
            phase_tx,
        };

        let handle = RoomHandle {
            cmd_tx,
            broadcast_tx,
            stats,
            phase_rx,
        };

        (room, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Race room started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.run_tick(),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
        }

        info!("Race room stopped");
    }

    fn run_tick(&mut self) {
        let mut out = Outbox::new();
        self.session.tick(unix_millis(), &mut out);

        if self.snapshot_builder.should_send() {
            if let Some(msg) = self.snapshot_builder.build(&self.session) {
                out.broadcast(msg);
            }
        }

        self.dispatch(out);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        let mut out = Outbox::new();

        match cmd {
            RoomCommand::Connect {
                connection_id,
                direct_tx,
            } => {
                self.connections.insert(connection_id, direct_tx);
                debug!(connection_id = %connection_id, "Connection registered");
            }
            RoomCommand::Input(input) => self.handle_input(input, &mut out),
            RoomCommand::Disconnect { connection_id } => {
                self.connections.remove(&connection_id);
                self.session.leave(connection_id, &mut out);
                debug!(connection_id = %connection_id, "Connection removed");
            }
            RoomCommand::CountdownElapsed { race_id } => {
                self.session.countdown_elapsed(race_id, unix_millis(), &mut out);
            }
            RoomCommand::InvincibilityElapsed {
                player_id,
                race_id,
                grant,
            } => {
                self.session
                    .invincibility_expired(player_id, race_id, grant, &mut out);
            }
            RoomCommand::QueryLeaderboard { reply } => {
                let _ = reply.send(self.session.leaderboard());
            }
        }

        self.dispatch(out);
    }

    fn handle_input(&mut self, input: PlayerInput, out: &mut Outbox) {
        let id = input.connection_id;
        match input.msg {
            ClientMsg::Join { name } => self.session.join(id, &name, out),
            ClientMsg::Chat { text } => self.session.chat(id, &text, input.received_at, out),
            ClientMsg::SelectCar { car } => self.session.select_car(id, car, out),
            ClientMsg::StartRace => self.session.start_race(out),
            ClientMsg::Click => self.session.click(id),
            ClientMsg::UsePowerup => self.session.use_powerup(id, out),
            ClientMsg::Reset => {
                info!(connection_id = %id, "Reset requested");
                self.session.reset(out);
            }
            ClientMsg::Ping { t } => out.direct(id, ServerMsg::Pong { t }),
        }
    }

    /// Deliver messages and start requested timers
    fn dispatch(&mut self, out: Outbox) {
        self.stats
            .connections
            .store(self.connections.len(), Ordering::Relaxed);
        self.stats
            .players
            .store(self.session.players().len(), Ordering::Relaxed);
        let phase = self.session.phase();
        self.phase_tx.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });

        if out.is_empty() {
            return;
        }

        for (recipient, msg) in out.messages {
            match recipient {
                Recipient::All => {
                    // No subscribers is fine
                    let _ = self.broadcast_tx.send(msg);
                }
                Recipient::Connection(id) => {
                    if let Some(tx) = self.connections.get(&id) {
                        if let Err(e) = tx.try_send(msg) {
                            warn!(connection_id = %id, error = %e, "Dropped direct message");
                        }
                    }
                }
            }
        }

        for timer in out.timers {
            self.schedule(timer);
        }
    }

    fn schedule(&self, timer: TimerRequest) {
        let (after, cmd) = match timer {
            TimerRequest::Countdown { race_id, after } => {
                (after, RoomCommand::CountdownElapsed { race_id })
            }
            TimerRequest::InvincibilityExpiry {
                player_id,
                race_id,
                grant,
                after,
            } => (
                after,
                RoomCommand::InvincibilityElapsed {
                    player_id,
                    race_id,
                    grant,
                },
            ),
        };

        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(cmd).await;
            }
        });
    }
}
