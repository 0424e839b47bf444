//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::catalog::{PlantKind, ZombieKind};
use crate::game::state::{Score, SessionStatus, Side, VehicleMotion};
use crate::game::wave::WavePhase;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Open a new room with the sender as its only member
    CreateGame,

    /// Take the second seat in an existing room
    #[serde(rename_all = "camelCase")]
    JoinGame { game_id: String },

    /// Place a plant on the cell containing (x, y)
    #[serde(rename_all = "camelCase")]
    PlacePlant {
        game_id: String,
        #[serde(rename = "type")]
        kind: PlantKind,
        /// Column, 0..9
        x: f64,
        /// Row, 0..5
        y: f64,
    },

    /// Send a zombie down a lane
    #[serde(rename_all = "camelCase")]
    PlaceZombie {
        game_id: String,
        #[serde(rename = "type")]
        kind: ZombieKind,
        /// Row, 0..5
        y: f64,
    },

    /// Leave the room, conceding the match
    #[serde(rename_all = "camelCase")]
    LeaveGame { game_id: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Room created, sender is seated in slot 0
    #[serde(rename_all = "camelCase")]
    GameCreated { game_id: String },

    /// Sender took the second seat
    #[serde(rename_all = "camelCase")]
    GameJoined { game_id: String },

    /// Both seats filled, the match is running
    GameStart { state: GameSnapshot },

    /// Routine state broadcast
    GameUpdate { state: GameSnapshot },

    /// Terminal event for the room
    GameEnded {
        winner: Option<Side>,
        score: Score,
        reason: Option<String>,
    },

    /// Command rejected (sent to the originating socket only)
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Full room state as broadcast to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub game_id: String,
    pub status: SessionStatus,
    pub sun: u32,
    pub score: Score,
    pub plants: Vec<PlantSnapshot>,
    pub zombies: Vec<ZombieSnapshot>,
    pub vehicles: Vec<VehicleSnapshot>,
    pub wave_index: u32,
    pub wave_phase: WavePhase,
    pub wave_budget: u32,
    /// Simulation clock (ms) at which the current wave phase began
    pub wave_started_at: u64,
    /// Current simulation clock (ms)
    pub clock_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantSnapshot {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: PlantKind,
    pub x: u8,
    pub y: u8,
    pub health: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZombieSnapshot {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ZombieKind,
    pub x: f64,
    pub y: u8,
    pub health: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub y: u8,
    pub x: f64,
    pub active: bool,
    pub used: bool,
    pub motion: VehicleMotion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_commands() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"event":"placePlant","gameId":"AB12CD","type":"peashooter","x":2,"y":2.5}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::PlacePlant { game_id, kind, x, y } => {
                assert_eq!(game_id, "AB12CD");
                assert_eq!(kind, PlantKind::Peashooter);
                assert_eq!((x, y), (2.0, 2.5));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let msg: ClientMsg = serde_json::from_str(r#"{"event":"createGame"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::CreateGame));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let parsed = serde_json::from_str::<ClientMsg>(
            r#"{"event":"placeZombie","gameId":"AB12CD","type":"gargantuar","y":1}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn ended_event_shape() {
        let msg = ServerMsg::GameEnded {
            winner: Some(Side::Zombies),
            score: Score {
                plant_wins: 0,
                zombie_wins: 1,
            },
            reason: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "gameEnded");
        assert_eq!(json["winner"], "zombies");
        assert_eq!(json["score"]["zombieWins"], 1);
    }
}
