//! Entities and bookkeeping owned by a session

use serde::{Deserialize, Serialize};

use super::catalog::{PlantKind, PlantStats, ZombieKind, ZombieStats, RESCUE, ZOMBIE_SPAWN_X};

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    /// Created, waiting for the second player
    Waiting,
    /// Both players present, scheduler running
    Playing,
    /// Terminal
    Ended,
}

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Plants,
    Zombies,
}

impl Side {
    /// Side played by the given player slot (creator defends)
    pub fn for_slot(slot: usize) -> Self {
        if slot == 0 {
            Side::Plants
        } else {
            Side::Zombies
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Side::Plants => Side::Zombies,
            Side::Zombies => Side::Plants,
        }
    }
}

/// Win tally for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub plant_wins: u32,
    pub zombie_wins: u32,
}

impl Score {
    pub fn record(&mut self, winner: Side) {
        match winner {
            Side::Plants => self.plant_wins += 1,
            Side::Zombies => self.zombie_wins += 1,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// A zombie crossed the house line with no rescue vehicle left
    HouseReached,
    /// The plants outlasted every wave
    WavesSurvived,
    /// A player disconnected or left
    PlayerLeft,
    /// No activity within the idle timeout
    Idle,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::HouseReached => "zombies reached the house",
            EndReason::WavesSurvived => "all waves survived",
            EndReason::PlayerLeft => "opponent left the game",
            EndReason::Idle => "session idle",
        }
    }
}

/// Terminal result of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// None when the session was torn down before a match took place
    pub winner: Option<Side>,
    pub reason: EndReason,
}

/// A placed plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: u32,
    pub kind: PlantKind,
    pub column: u8,
    pub row: u8,
    pub health: i32,
    /// Sim clock of the last shot
    pub last_shot_ms: u64,
    /// Sim clock of the last sun payout
    pub last_sun_ms: u64,
}

impl Plant {
    pub fn new(id: u32, kind: PlantKind, column: u8, row: u8, now_ms: u64) -> Self {
        Self {
            id,
            kind,
            column,
            row,
            health: PlantStats::for_kind(kind).health,
            last_shot_ms: now_ms,
            last_sun_ms: now_ms,
        }
    }

    /// Lane position used for contact and targeting
    pub fn x(&self) -> f64 {
        self.column as f64
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// A zombie walking down a lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zombie {
    pub id: u32,
    pub kind: ZombieKind,
    pub x: f64,
    pub row: u8,
    pub health: i32,
    /// Sim clock of the last bite
    pub last_attack_ms: u64,
}

impl Zombie {
    pub fn new(id: u32, kind: ZombieKind, row: u8, now_ms: u64) -> Self {
        Self {
            id,
            kind,
            x: ZOMBIE_SPAWN_X,
            row,
            health: ZombieStats::for_kind(kind).health,
            last_attack_ms: now_ms,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// Motion state of a rescue vehicle, derived from its flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleMotion {
    Parked,
    Rolling,
    Spent,
}

/// Single-use lane clearer parked left of each row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueVehicle {
    pub row: u8,
    pub x: f64,
    pub active: bool,
    /// Terminal: a used vehicle never moves again
    pub used: bool,
}

impl RescueVehicle {
    pub fn parked(row: u8) -> Self {
        Self {
            row,
            x: RESCUE.start_x,
            active: false,
            used: false,
        }
    }

    /// Start rolling. Returns false if the vehicle was already rolling or spent.
    pub fn trigger(&mut self) -> bool {
        if self.used || self.active {
            return false;
        }
        self.active = true;
        true
    }

    pub fn motion(&self) -> VehicleMotion {
        match (self.active, self.used) {
            (_, true) => VehicleMotion::Spent,
            (true, false) => VehicleMotion::Rolling,
            (false, false) => VehicleMotion::Parked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spent_vehicle_cannot_be_triggered() {
        let mut vehicle = RescueVehicle::parked(3);
        assert_eq!(vehicle.motion(), VehicleMotion::Parked);
        assert!(vehicle.trigger());
        assert!(!vehicle.trigger());
        assert_eq!(vehicle.motion(), VehicleMotion::Rolling);

        vehicle.active = false;
        vehicle.used = true;
        assert!(!vehicle.trigger());
        assert_eq!(vehicle.motion(), VehicleMotion::Spent);
    }

    #[test]
    fn creator_defends() {
        assert_eq!(Side::for_slot(0), Side::Plants);
        assert_eq!(Side::for_slot(1), Side::Zombies);
        assert_eq!(Side::Plants.opponent(), Side::Zombies);
    }
}
