//! Session aggregate - validated player commands against one room's state

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;

use super::catalog::{in_grid, PlantKind, PlantStats, ZombieKind, ZombieStats, GRID_ROWS};
use super::error::{GameError, Resource};
use super::state::{
    EndReason, MatchOutcome, Plant, RescueVehicle, Score, SessionStatus, Side, Zombie,
};
use super::wave::WaveState;

/// Maximum players per room
pub const MAX_PLAYERS: usize = 2;

/// One isolated two-player match and its simulation state.
///
/// Every mutation goes through `&mut self`; the owning room task is the only
/// holder, so commands and ticks are serialised by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Slot 0 defends with plants, slot 1 sends zombies
    pub players: Vec<Uuid>,
    pub status: SessionStatus,
    pub sun: u32,
    pub score: Score,
    pub wave: WaveState,
    pub vehicles: Vec<RescueVehicle>,
    pub plants: Vec<Plant>,
    pub zombies: Vec<Zombie>,
    /// Simulation clock, advanced only by fixed steps
    pub clock_ms: u64,
    pub outcome: Option<MatchOutcome>,
    next_entity_id: u32,
}

impl Session {
    pub fn new(id: String, owner: Uuid, config: &GameConfig) -> Self {
        Self {
            id,
            players: vec![owner],
            status: SessionStatus::Waiting,
            sun: config.starting_sun,
            score: Score::default(),
            wave: WaveState::new(config),
            vehicles: (0..GRID_ROWS).map(RescueVehicle::parked).collect(),
            plants: Vec::new(),
            zombies: Vec::new(),
            clock_ms: 0,
            outcome: None,
            next_entity_id: 1,
        }
    }

    pub fn is_member(&self, player_id: Uuid) -> bool {
        self.players.contains(&player_id)
    }

    pub fn side_of(&self, player_id: Uuid) -> Option<Side> {
        self.players
            .iter()
            .position(|p| *p == player_id)
            .map(Side::for_slot)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    /// Seat the second player and start the match
    pub fn join(&mut self, player_id: Uuid) -> Result<(), GameError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::Full);
        }
        if self.status != SessionStatus::Waiting {
            return Err(GameError::InvalidState("game is not accepting players"));
        }
        if self.is_member(player_id) {
            return Err(GameError::InvalidState("already in this game"));
        }

        self.players.push(player_id);
        self.status = SessionStatus::Playing;
        self.wave.start(self.clock_ms);

        info!(session_id = %self.id, player_id = %player_id, "Match started");
        Ok(())
    }

    fn ensure_playing(&self, player_id: Uuid) -> Result<(), GameError> {
        if self.status != SessionStatus::Playing {
            return Err(GameError::InvalidState("game is not in progress"));
        }
        if !self.is_member(player_id) {
            return Err(GameError::InvalidState("not a player in this game"));
        }
        Ok(())
    }

    /// Place a plant on the cell containing (`x`, `y`)
    pub fn place_plant(
        &mut self,
        player_id: Uuid,
        kind: PlantKind,
        x: f64,
        y: f64,
    ) -> Result<(), GameError> {
        self.ensure_playing(player_id)?;

        if !in_grid(x, y) {
            return Err(GameError::InvalidPosition);
        }
        let column = x.floor() as u8;
        let row = y.floor() as u8;

        if self
            .plants
            .iter()
            .any(|p| p.column == column && p.row == row)
        {
            return Err(GameError::SpotTaken);
        }

        let stats = PlantStats::for_kind(kind);
        self.sun = self
            .sun
            .checked_sub(stats.cost)
            .ok_or(GameError::InsufficientResource(Resource::Sun))?;

        let id = self.next_id();
        self.plants
            .push(Plant::new(id, kind, column, row, self.clock_ms));
        debug!(session_id = %self.id, plant = stats.name, column, row, sun = self.sun, "Plant placed");
        Ok(())
    }

    /// Send a zombie down lane `y`
    pub fn place_zombie(
        &mut self,
        player_id: Uuid,
        kind: ZombieKind,
        y: f64,
    ) -> Result<(), GameError> {
        self.ensure_playing(player_id)?;
        if !self.wave.is_active() {
            return Err(GameError::InvalidState("zombies can only be placed during a wave"));
        }

        if !in_grid(0.0, y) {
            return Err(GameError::InvalidPosition);
        }
        let row = y.floor() as u8;

        let stats = ZombieStats::for_kind(kind);
        if !self.wave.try_spend(stats.cost) {
            return Err(GameError::InsufficientResource(Resource::WaveBudget));
        }

        let id = self.next_id();
        self.zombies.push(Zombie::new(id, kind, row, self.clock_ms));
        debug!(
            session_id = %self.id,
            zombie = stats.name,
            row,
            budget = self.wave.budget,
            "Zombie placed"
        );
        Ok(())
    }

    /// Remove a player. Any departure ends the session; with two players
    /// seated the remaining player's side wins.
    pub fn leave(&mut self, player_id: Uuid) -> Result<MatchOutcome, GameError> {
        let side = self
            .side_of(player_id)
            .ok_or(GameError::InvalidState("not a player in this game"))?;

        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }

        let winner = (self.players.len() == MAX_PLAYERS).then(|| side.opponent());
        Ok(self.finish(winner, EndReason::PlayerLeft))
    }

    /// Move to `Ended`, recording the winner in the score. Idempotent.
    pub fn finish(&mut self, winner: Option<Side>, reason: EndReason) -> MatchOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        self.status = SessionStatus::Ended;
        if let Some(side) = winner {
            self.score.record(side);
        }
        let outcome = MatchOutcome { winner, reason };
        self.outcome = Some(outcome);

        info!(
            session_id = %self.id,
            winner = ?winner,
            reason = reason.as_str(),
            "Session ended"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::wave::WavePhase;

    fn playing() -> (Session, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let mut session = Session::new("ROOM01".into(), owner, &GameConfig::default());
        session.join(guest).unwrap();
        (session, owner, guest)
    }

    #[test]
    fn join_starts_the_match() {
        let owner = Uuid::new_v4();
        let mut session = Session::new("ROOM01".into(), owner, &GameConfig::default());
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.sun, 50);
        assert_eq!(session.vehicles.len(), 5);

        session.join(Uuid::new_v4()).unwrap();
        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.wave.phase, WavePhase::Active);
        assert_eq!(session.wave.index, 0);
        assert_eq!(session.wave.budget, 100);

        assert_eq!(session.join(Uuid::new_v4()), Err(GameError::Full));
    }

    #[test]
    fn placing_before_start_is_rejected() {
        let owner = Uuid::new_v4();
        let mut session = Session::new("ROOM01".into(), owner, &GameConfig::default());
        assert!(matches!(
            session.place_plant(owner, PlantKind::Sunflower, 0.0, 0.0),
            Err(GameError::InvalidState(_))
        ));
        assert_eq!(session.sun, 50);
    }

    #[test]
    fn plant_placement_debits_sun_exactly_once() {
        let (mut session, owner, _) = playing();
        session
            .place_plant(owner, PlantKind::Sunflower, 0.4, 0.7)
            .unwrap();
        assert_eq!(session.sun, 0);
        assert_eq!(session.plants[0].column, 0);
        assert_eq!(session.plants[0].row, 0);

        // Out of sun: rejected, nothing changes
        let before = session.clone();
        assert_eq!(
            session.place_plant(owner, PlantKind::WallNut, 3.0, 3.0),
            Err(GameError::InsufficientResource(Resource::Sun))
        );
        assert_eq!(session, before);
    }

    #[test]
    fn one_plant_per_cell() {
        let (mut session, owner, _) = playing();
        session.sun = 500;
        session
            .place_plant(owner, PlantKind::WallNut, 4.2, 1.1)
            .unwrap();
        assert_eq!(
            session.place_plant(owner, PlantKind::Peashooter, 4.9, 1.9),
            Err(GameError::SpotTaken)
        );
        assert_eq!(session.sun, 450);
        assert_eq!(session.plants.len(), 1);
    }

    #[test]
    fn plant_bounds_are_checked() {
        let (mut session, owner, _) = playing();
        for (x, y) in [(9.0, 0.0), (0.0, 5.0), (-1.0, 2.0), (2.0, -0.5)] {
            assert_eq!(
                session.place_plant(owner, PlantKind::Sunflower, x, y),
                Err(GameError::InvalidPosition)
            );
        }
        assert_eq!(session.sun, 50);
    }

    #[test]
    fn zombie_placement_spends_wave_budget() {
        let (mut session, _, guest) = playing();
        session
            .place_zombie(guest, ZombieKind::Buckethead, 2.0)
            .unwrap();
        assert_eq!(session.wave.budget, 25);
        assert_eq!(session.zombies[0].x, 8.0);
        assert_eq!(session.zombies[0].row, 2);

        assert_eq!(
            session.place_zombie(guest, ZombieKind::Conehead, 1.0),
            Err(GameError::InsufficientResource(Resource::WaveBudget))
        );
        assert_eq!(session.wave.budget, 25);
        assert_eq!(
            session.place_zombie(guest, ZombieKind::Basic, 5.0),
            Err(GameError::InvalidPosition)
        );
        assert_eq!(session.zombies.len(), 1);
    }

    #[test]
    fn zombies_are_refused_during_a_break() {
        let (mut session, _, guest) = playing();
        session.wave.phase = WavePhase::Break;
        assert!(matches!(
            session.place_zombie(guest, ZombieKind::Basic, 0.0),
            Err(GameError::InvalidState(_))
        ));
        assert_eq!(session.wave.budget, 100);
    }

    #[test]
    fn outsiders_cannot_act() {
        let (mut session, _, _) = playing();
        assert!(matches!(
            session.place_plant(Uuid::new_v4(), PlantKind::Sunflower, 0.0, 0.0),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn leaving_hands_the_win_to_the_opponent() {
        let (mut session, owner, _) = playing();
        let outcome = session.leave(owner).unwrap();
        assert_eq!(outcome.winner, Some(Side::Zombies));
        assert_eq!(outcome.reason, EndReason::PlayerLeft);
        assert_eq!(session.status, SessionStatus::Ended);
        assert_eq!(session.score.zombie_wins, 1);

        // Idempotent
        assert_eq!(session.finish(Some(Side::Plants), EndReason::Idle), outcome);
        assert_eq!(session.score.plant_wins, 0);
    }

    #[test]
    fn leaving_a_waiting_room_has_no_winner() {
        let owner = Uuid::new_v4();
        let mut session = Session::new("ROOM01".into(), owner, &GameConfig::default());
        let outcome = session.leave(owner).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(session.score, Score::default());
        assert_eq!(session.status, SessionStatus::Ended);
    }
}
