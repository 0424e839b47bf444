//! Room task - owns one session and runs its authoritative tick loop

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{GameSnapshot, ServerMsg};

use super::catalog::{PlantKind, ZombieKind};
use super::clock::{wall_millis, FixedStep};
use super::error::GameError;
use super::session::Session;
use super::snapshot::{self, SnapshotBuilder};
use super::state::{EndReason, MatchOutcome, SessionStatus};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Commands serialised into a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_id: Uuid,
        reply: Reply<()>,
    },
    PlacePlant {
        player_id: Uuid,
        kind: PlantKind,
        x: f64,
        y: f64,
        reply: Reply<()>,
    },
    PlaceZombie {
        player_id: Uuid,
        kind: ZombieKind,
        y: f64,
        reply: Reply<()>,
    },
    Leave {
        player_id: Uuid,
        reply: Reply<MatchOutcome>,
    },
    Snapshot {
        reply: Reply<GameSnapshot>,
    },
    /// Tear the room down without a winner
    Close { reason: EndReason },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    cmd_tx: mpsc::Sender<RoomCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    last_activity: Arc<AtomicU64>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Unix ms of the last tick or command handled by the room
    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// True if both handles address the same room task
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.cmd_tx.same_channel(&other.cmd_tx)
    }

    /// Send a command and wait for the room's answer
    pub async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, GameError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .await
            .map_err(|_| GameError::Closed)?;
        rx.await.map_err(|_| GameError::Closed)?
    }

    /// Ask the room to shut down. A no-op if it already has.
    pub fn close(&self, reason: EndReason) {
        match self.cmd_tx.try_send(RoomCommand::Close { reason }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                let cmd_tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let _ = cmd_tx.send(cmd).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %self.id, "Room already stopped");
            }
        }
    }
}

/// The authoritative room
pub struct GameRoom {
    session: Session,
    cmd_rx: mpsc::Receiver<RoomCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    stepper: FixedStep,
    config: GameConfig,
    player_count: Arc<AtomicUsize>,
    last_activity: Arc<AtomicU64>,
}

impl GameRoom {
    /// Create a room around a fresh session
    pub fn new(session: Session, config: GameConfig) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (events_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(session.players.len()));
        let last_activity = Arc::new(AtomicU64::new(wall_millis()));

        let handle = RoomHandle {
            id: session.id.clone(),
            cmd_tx,
            events_tx: events_tx.clone(),
            player_count: player_count.clone(),
            last_activity: last_activity.clone(),
        };

        let room = Self {
            session,
            cmd_rx,
            events_tx,
            snapshot_builder: SnapshotBuilder::new(config.snapshot_every_ticks),
            stepper: FixedStep::new(config.tick_duration(), config.max_catchup_steps),
            config,
            player_count,
            last_activity,
        };

        (room, handle)
    }

    /// Run until the session ends or every handle is dropped
    pub async fn run(mut self) {
        info!(session_id = %self.session.id, "Room opened");

        // Lobby: no scheduler until the second player arrives
        while self.session.status == SessionStatus::Waiting {
            match self.cmd_rx.recv().await {
                Some(cmd) => self.handle_command(cmd),
                None => {
                    self.session.finish(None, EndReason::Idle);
                }
            }
        }

        if self.session.status == SessionStatus::Playing {
            self.run_match().await;
        }

        self.announce_end();
        info!(session_id = %self.session.id, "Room closed");
    }

    async fn run_match(&mut self) {
        let mut ticker = interval(self.config.tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        while self.session.status == SessionStatus::Playing {
            tokio::select! {
                tick = ticker.tick() => {
                    let elapsed = tick.saturating_duration_since(last_tick);
                    last_tick = tick;
                    self.run_tick(elapsed);
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.session.finish(None, EndReason::Idle);
                    }
                },
            }
        }
    }

    /// Drain due fixed steps and broadcast the result
    fn run_tick(&mut self, elapsed: std::time::Duration) {
        let (steps, dropped) = self.stepper.advance(elapsed);
        if dropped > 0 {
            warn!(
                session_id = %self.session.id,
                dropped_steps = dropped,
                "Room fell behind, dropping simulation steps"
            );
        }

        let step_ms = self.stepper.step_ms();
        for _ in 0..steps {
            if self.session.step(step_ms).is_some() {
                break;
            }
        }

        self.touch();

        if self.session.status == SessionStatus::Playing && self.snapshot_builder.should_send() {
            self.broadcast_update();
        }
    }

    /// Process one command
    fn handle_command(&mut self, cmd: RoomCommand) {
        self.touch();

        match cmd {
            RoomCommand::Join { player_id, reply } => {
                let result = self.session.join(player_id);
                if result.is_ok() {
                    self.player_count
                        .store(self.session.players.len(), Ordering::Relaxed);
                    let _ = self.events_tx.send(ServerMsg::GameStart {
                        state: snapshot::build(&self.session),
                    });
                }
                let _ = reply.send(result);
            }
            RoomCommand::PlacePlant {
                player_id,
                kind,
                x,
                y,
                reply,
            } => {
                let result = self.session.place_plant(player_id, kind, x, y);
                self.after_placement(player_id, &result);
                let _ = reply.send(result);
            }
            RoomCommand::PlaceZombie {
                player_id,
                kind,
                y,
                reply,
            } => {
                let result = self.session.place_zombie(player_id, kind, y);
                self.after_placement(player_id, &result);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.session.leave(player_id);
                if result.is_ok() {
                    info!(session_id = %self.session.id, player_id = %player_id, "Player left");
                }
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(snapshot::build(&self.session)));
            }
            RoomCommand::Close { reason } => {
                self.session.finish(None, reason);
            }
        }
    }

    fn after_placement(&mut self, player_id: Uuid, result: &Result<(), GameError>) {
        match result {
            Ok(()) => {
                self.broadcast_update();
                self.snapshot_builder.force_next();
            }
            Err(e) => {
                warn!(
                    session_id = %self.session.id,
                    player_id = %player_id,
                    error = %e,
                    "Placement rejected"
                );
            }
        }
    }

    fn broadcast_update(&self) {
        // No receivers is fine, the room keeps running
        let _ = self.events_tx.send(ServerMsg::GameUpdate {
            state: snapshot::build(&self.session),
        });
    }

    fn announce_end(&self) {
        let outcome = self.session.outcome;
        let _ = self.events_tx.send(ServerMsg::GameEnded {
            winner: outcome.and_then(|o| o.winner),
            score: self.session.score,
            reason: outcome.map(|o| o.reason.as_str().to_string()),
        });
    }

    fn touch(&self) {
        self.last_activity.store(wall_millis(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Side;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn open_room() -> (RoomHandle, Uuid) {
        let owner = Uuid::new_v4();
        let session = Session::new("ROOM01".into(), owner, &GameConfig::default());
        let (room, handle) = GameRoom::new(session, GameConfig::default());
        tokio::spawn(room.run());
        (handle, owner)
    }

    #[tokio::test]
    async fn join_broadcasts_game_start() {
        let (handle, _) = open_room();
        let mut events = handle.subscribe();

        let guest = Uuid::new_v4();
        assert_ok!(
            handle
                .request(|reply| RoomCommand::Join {
                    player_id: guest,
                    reply
                })
                .await
        );
        assert_eq!(handle.player_count(), 2);

        match events.recv().await.unwrap() {
            ServerMsg::GameStart { state } => {
                assert_eq!(state.status, SessionStatus::Playing);
                assert_eq!(state.wave_budget, 100);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn leave_ends_the_room_and_stops_it() {
        let (handle, _) = open_room();
        let guest = Uuid::new_v4();
        assert_ok!(
            handle
                .request(|reply| RoomCommand::Join {
                    player_id: guest,
                    reply
                })
                .await
        );
        let mut events = handle.subscribe();

        let outcome = handle
            .request(|reply| RoomCommand::Leave {
                player_id: guest,
                reply,
            })
            .await
            .unwrap();
        assert_eq!(outcome.winner, Some(Side::Plants));

        loop {
            match events.recv().await {
                Ok(ServerMsg::GameEnded { winner, score, .. }) => {
                    assert_eq!(winner, Some(Side::Plants));
                    assert_eq!(score.plant_wins, 1);
                    break;
                }
                Ok(_) => continue,
                Err(e) => panic!("room closed without gameEnded: {e}"),
            }
        }

        // The task has exited, further commands fail cleanly
        let snapshot = handle
            .request(|reply| RoomCommand::Snapshot { reply })
            .await;
        assert_eq!(assert_err!(snapshot), GameError::Closed);
        handle.close(EndReason::Idle);
    }

    fn started_room() -> (GameRoom, Uuid) {
        let config = GameConfig::default();
        let guest = Uuid::new_v4();
        let mut session = Session::new("ROOM02".into(), Uuid::new_v4(), &config);
        session.join(guest).unwrap();
        let (room, _handle) = GameRoom::new(session, config);
        (room, guest)
    }

    #[tokio::test]
    async fn uneven_wakeups_advance_in_whole_steps() {
        let (mut room, _) = started_room();

        room.run_tick(Duration::from_millis(30));
        assert_eq!(room.session.clock_ms, 0);

        room.run_tick(Duration::from_millis(70));
        assert_eq!(room.session.clock_ms, 100);

        room.run_tick(Duration::from_millis(40));
        assert_eq!(room.session.clock_ms, 100);

        room.run_tick(Duration::from_millis(10));
        assert_eq!(room.session.clock_ms, 150);
    }

    #[tokio::test]
    async fn match_ending_mid_batch_stops_stepping() {
        let (mut room, guest) = started_room();
        room.session.vehicles[1].used = true;
        room.session
            .place_zombie(guest, crate::game::catalog::ZombieKind::Basic, 1.0)
            .unwrap();
        // Two 50 ms steps at 0.25 cells/s carry it over the house line
        room.session.zombies[0].x = 0.02;

        room.run_tick(Duration::from_millis(500));
        assert_eq!(room.session.status, SessionStatus::Ended);
        assert_eq!(room.session.clock_ms, 100);
        assert_eq!(room.session.score.zombie_wins, 1);

        room.run_tick(Duration::from_millis(500));
        assert_eq!(room.session.clock_ms, 100);
        assert_eq!(room.session.score.zombie_wins, 1);
    }
}
