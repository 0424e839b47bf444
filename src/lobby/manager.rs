//! Session manager - owns the room registry and routes player commands

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::catalog::{PlantKind, ZombieKind};
use crate::game::clock::wall_millis;
use crate::game::state::{EndReason, MatchOutcome};
use crate::game::{GameError, GameRoom, RoomCommand, RoomHandle, Session};
use crate::ws::protocol::{GameSnapshot, ServerMsg};

/// Length of a room code
pub const SESSION_ID_LEN: usize = 6;
const SESSION_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Creates, joins and tears down sessions.
///
/// The registry is the only state shared across rooms; everything inside a
/// session is owned by its room task and reached through its handle.
pub struct SessionManager {
    rooms: DashMap<String, RoomHandle>,
    rng: Mutex<ChaCha8Rng>,
    config: GameConfig,
}

impl SessionManager {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Manager with a deterministic room-code sequence
    pub fn with_rng(config: GameConfig, rng: ChaCha8Rng) -> Self {
        Self {
            rooms: DashMap::new(),
            rng: Mutex::new(rng),
            config,
        }
    }

    fn next_session_id(&self) -> String {
        generate_session_id(&mut *self.rng.lock())
    }

    /// Open a room with `owner` seated in slot 0 and spawn its task
    pub fn create_session(self: &Arc<Self>, owner: Uuid) -> String {
        loop {
            let id = self.next_session_id();
            match self.rooms.entry(id.clone()) {
                Entry::Occupied(_) => {
                    warn!(session_id = %id, "Session id collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    let session = Session::new(id.clone(), owner, &self.config);
                    let (room, handle) = GameRoom::new(session, self.config.clone());
                    slot.insert(handle.clone());

                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        room.run().await;
                        manager.forget(&handle);
                    });

                    info!(session_id = %id, owner = %owner, "Session created");
                    return id;
                }
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<RoomHandle> {
        self.rooms.get(session_id).map(|r| r.value().clone())
    }

    fn room(&self, session_id: &str) -> Result<RoomHandle, GameError> {
        self.get(session_id).ok_or(GameError::NotFound)
    }

    /// Subscribe to a room's broadcast events
    pub fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<ServerMsg>, GameError> {
        Ok(self.room(session_id)?.subscribe())
    }

    pub async fn join_session(&self, session_id: &str, player_id: Uuid) -> Result<(), GameError> {
        let room = self.room(session_id)?;
        room.request(|reply| RoomCommand::Join { player_id, reply })
            .await?;
        info!(session_id = %session_id, player_id = %player_id, "Player joined session");
        Ok(())
    }

    pub async fn place_plant(
        &self,
        session_id: &str,
        player_id: Uuid,
        kind: PlantKind,
        x: f64,
        y: f64,
    ) -> Result<(), GameError> {
        self.room(session_id)?
            .request(|reply| RoomCommand::PlacePlant {
                player_id,
                kind,
                x,
                y,
                reply,
            })
            .await
    }

    pub async fn place_zombie(
        &self,
        session_id: &str,
        player_id: Uuid,
        kind: ZombieKind,
        y: f64,
    ) -> Result<(), GameError> {
        self.room(session_id)?
            .request(|reply| RoomCommand::PlaceZombie {
                player_id,
                kind,
                y,
                reply,
            })
            .await
    }

    /// End the session on behalf of a departing player and drop it from the registry
    pub async fn leave(&self, session_id: &str, player_id: Uuid) -> Result<MatchOutcome, GameError> {
        let room = self.room(session_id)?;
        let outcome = room
            .request(|reply| RoomCommand::Leave { player_id, reply })
            .await?;
        self.forget(&room);
        Ok(outcome)
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<GameSnapshot, GameError> {
        self.room(session_id)?
            .request(|reply| RoomCommand::Snapshot { reply })
            .await
    }

    /// Tear down every room idle since before `now_ms - idle_timeout`.
    /// Returns the reaped session ids.
    pub fn reap_idle(&self, now_ms: u64) -> Vec<String> {
        let cutoff = now_ms.saturating_sub(self.config.idle_timeout.as_millis() as u64);

        let stale: Vec<RoomHandle> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().last_activity() < cutoff)
            .map(|entry| entry.value().clone())
            .collect();

        stale
            .into_iter()
            .map(|room| {
                self.forget(&room);
                room.close(EndReason::Idle);
                info!(session_id = %room.id, "Reaped idle session");
                room.id
            })
            .collect()
    }

    /// Periodic idle sweep
    pub async fn run_reaper(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.reap_interval);

        loop {
            interval.tick().await;
            self.reap_idle(wall_millis());
        }
    }

    /// Remove `room` from the registry unless the slot was already reused
    fn forget(&self, room: &RoomHandle) {
        self.rooms
            .remove_if(&room.id, |_, current| current.same_room(room));
    }

    pub fn active_sessions(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms
            .iter()
            .map(|r| r.value().player_count())
            .sum()
    }
}

/// Random uppercase alphanumeric room code
pub fn generate_session_id(rng: &mut impl Rng) -> String {
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{SessionStatus, Side};
    use tokio_test::{assert_err, assert_ok};

    fn manager(seed: u64) -> Arc<SessionManager> {
        Arc::new(SessionManager::with_rng(
            GameConfig::default(),
            ChaCha8Rng::seed_from_u64(seed),
        ))
    }

    #[tokio::test]
    async fn create_then_join_starts_play() {
        let manager = manager(7);
        let owner = Uuid::new_v4();
        let id = manager.create_session(owner);
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert_eq!(manager.active_sessions(), 1);

        assert_ok!(manager.join_session(&id, Uuid::new_v4()).await);
        assert_eq!(
            assert_err!(manager.join_session(&id, Uuid::new_v4()).await),
            GameError::Full
        );

        let snapshot = manager.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Playing);
        assert_eq!(manager.total_players(), 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let manager = manager(7);
        assert_eq!(
            assert_err!(manager.join_session("NOPE00", Uuid::new_v4()).await),
            GameError::NotFound
        );
        assert_eq!(
            assert_err!(
                manager
                    .place_plant("NOPE00", Uuid::new_v4(), PlantKind::Sunflower, 0.0, 0.0)
                    .await
            ),
            GameError::NotFound
        );
    }

    #[tokio::test]
    async fn colliding_id_is_regenerated() {
        let manager = manager(99);
        let mut probe = ChaCha8Rng::seed_from_u64(99);
        let first = generate_session_id(&mut probe);
        let second = generate_session_id(&mut probe);

        let taken = manager.create_session(Uuid::new_v4());
        assert_eq!(taken, first);

        // Rewind the generator so the next draw collides with the live room
        *manager.rng.lock() = ChaCha8Rng::seed_from_u64(99);
        let fresh = manager.create_session(Uuid::new_v4());
        assert_eq!(fresh, second);
        assert_eq!(manager.active_sessions(), 2);
    }

    #[tokio::test]
    async fn rejected_commands_leave_state_unchanged() {
        let manager = manager(3);
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let id = manager.create_session(owner);

        // Not started yet
        assert!(matches!(
            manager
                .place_plant(&id, owner, PlantKind::Sunflower, 0.0, 0.0)
                .await,
            Err(GameError::InvalidState(_))
        ));
        assert_ok!(manager.join_session(&id, guest).await);

        let before = manager.snapshot(&id).await.unwrap();
        assert_eq!(
            assert_err!(
                manager
                    .place_plant(&id, owner, PlantKind::Peashooter, 1.0, 1.0)
                    .await
            ),
            GameError::InsufficientResource(crate::game::error::Resource::Sun)
        );
        let after = manager.snapshot(&id).await.unwrap();
        assert_eq!(before.sun, after.sun);
        assert_eq!(before.plants, after.plants);

        assert_ok!(
            manager
                .place_zombie(&id, guest, ZombieKind::Basic, 3.0)
                .await
        );
        let after = manager.snapshot(&id).await.unwrap();
        assert_eq!(after.wave_budget, 75);
        assert_eq!(after.zombies.len(), 1);
    }

    #[tokio::test]
    async fn leave_ends_and_removes_session() {
        let manager = manager(5);
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let id = manager.create_session(owner);
        assert_ok!(manager.join_session(&id, guest).await);

        let outcome = manager.leave(&id, owner).await.unwrap();
        assert_eq!(outcome.winner, Some(Side::Zombies));
        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(
            assert_err!(manager.snapshot(&id).await),
            GameError::NotFound
        );
    }

    #[tokio::test]
    async fn idle_sessions_are_reaped() {
        let manager = manager(11);
        let id = manager.create_session(Uuid::new_v4());
        let mut events = manager.subscribe(&id).unwrap();

        assert!(manager.reap_idle(wall_millis()).is_empty());

        let later = wall_millis() + GameConfig::default().idle_timeout.as_millis() as u64 + 1_000;
        assert_eq!(manager.reap_idle(later), vec![id.clone()]);
        assert_eq!(manager.active_sessions(), 0);

        match events.recv().await.unwrap() {
            ServerMsg::GameEnded { winner, reason, .. } => {
                assert_eq!(winner, None);
                assert_eq!(reason.as_deref(), Some(EndReason::Idle.as_str()));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
