//! Static entity tables - plant, zombie and rescue vehicle stats

use serde::{Deserialize, Serialize};

/// Lawn width in columns
pub const GRID_COLUMNS: u8 = 9;
/// Lawn height in rows (lanes)
pub const GRID_ROWS: u8 = 5;
/// Column zombies enter at
pub const ZOMBIE_SPAWN_X: f64 = 8.0;
/// Horizontal distance (in columns) at which two entities in a lane touch
pub const CONTACT_RANGE: f64 = 0.5;

/// Plant kinds the defending side can place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlantKind {
    /// Produces sun over time
    Sunflower,
    /// Shoots the nearest zombie in its lane
    Peashooter,
    /// Cheap, very durable blocker
    WallNut,
}

/// What a plant does on its own timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantAction {
    /// Credit `amount` sun every `interval_ms`
    GenerateSun { amount: u32, interval_ms: u64 },
    /// Hit the nearest zombie ahead for `damage` every `interval_ms`
    Shoot { damage: i32, interval_ms: u64 },
    /// No timed action
    Block,
}

/// Plant stats per kind
#[derive(Debug, Clone, Copy)]
pub struct PlantStats {
    pub name: &'static str,
    /// Sun cost to place
    pub cost: u32,
    /// Starting health
    pub health: i32,
    pub action: PlantAction,
}

impl PlantStats {
    pub fn for_kind(kind: PlantKind) -> Self {
        match kind {
            PlantKind::Sunflower => Self {
                name: "Sunflower",
                cost: 50,
                health: 100,
                action: PlantAction::GenerateSun {
                    amount: 25,
                    interval_ms: 10_000,
                },
            },
            PlantKind::Peashooter => Self {
                name: "Peashooter",
                cost: 100,
                health: 100,
                action: PlantAction::Shoot {
                    damage: 20,
                    interval_ms: 1_500,
                },
            },
            PlantKind::WallNut => Self {
                name: "Wall-nut",
                cost: 50,
                health: 400,
                action: PlantAction::Block,
            },
        }
    }
}

/// Zombie kinds the attacking side can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZombieKind {
    Basic,
    Conehead,
    Buckethead,
}

/// Zombie stats per kind
#[derive(Debug, Clone, Copy)]
pub struct ZombieStats {
    pub name: &'static str,
    /// Wave budget cost to place
    pub cost: u32,
    /// Starting health
    pub health: i32,
    /// Damage per bite
    pub damage: i32,
    /// Time between bites (ms)
    pub attack_interval_ms: u64,
    /// Walking speed in columns per second
    pub speed: f64,
}

impl ZombieStats {
    pub fn for_kind(kind: ZombieKind) -> Self {
        match kind {
            ZombieKind::Basic => Self {
                name: "Zombie",
                cost: 25,
                health: 100,
                damage: 10,
                attack_interval_ms: 1_000,
                speed: 0.25,
            },
            ZombieKind::Conehead => Self {
                name: "Conehead Zombie",
                cost: 50,
                health: 200,
                damage: 10,
                attack_interval_ms: 1_000,
                speed: 0.25,
            },
            ZombieKind::Buckethead => Self {
                name: "Buckethead Zombie",
                cost: 75,
                health: 400,
                damage: 10,
                attack_interval_ms: 1_000,
                speed: 0.2,
            },
        }
    }
}

/// Rescue vehicle (lawn mower) stats, one kind shared by every lane
#[derive(Debug, Clone, Copy)]
pub struct RescueStats {
    /// Travel speed in columns per second
    pub speed: f64,
    /// Parking position, left of the lawn
    pub start_x: f64,
    /// Once past this x the vehicle is spent
    pub exit_x: f64,
}

pub const RESCUE: RescueStats = RescueStats {
    speed: 3.0,
    start_x: -1.0,
    exit_x: GRID_COLUMNS as f64,
};

/// True if (column, row) lies on the lawn
pub fn in_grid(column: f64, row: f64) -> bool {
    column.is_finite()
        && row.is_finite()
        && column >= 0.0
        && column < GRID_COLUMNS as f64
        && row >= 0.0
        && row < GRID_ROWS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_wire_names() {
        let plant: PlantKind = serde_json::from_str("\"wallNut\"").unwrap();
        assert_eq!(plant, PlantKind::WallNut);
        let zombie: ZombieKind = serde_json::from_str("\"buckethead\"").unwrap();
        assert_eq!(zombie, ZombieKind::Buckethead);
        assert!(serde_json::from_str::<PlantKind>("\"cactus\"").is_err());
    }

    #[test]
    fn grid_bounds_are_half_open() {
        assert!(in_grid(0.0, 0.0));
        assert!(in_grid(8.9, 4.9));
        assert!(!in_grid(9.0, 0.0));
        assert!(!in_grid(0.0, 5.0));
        assert!(!in_grid(-0.1, 2.0));
        assert!(!in_grid(f64::NAN, 2.0));
    }
}
