//! Snapshot building and broadcast throttling

use crate::ws::protocol::{GameSnapshot, PlantSnapshot, VehicleSnapshot, ZombieSnapshot};

use super::session::Session;

/// Decides which scheduler ticks carry a snapshot broadcast
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

    /// Force snapshot on next check (used after player commands)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }
}

/// Build the outbound view of a session
pub fn build(session: &Session) -> GameSnapshot {
    GameSnapshot {
        game_id: session.id.clone(),
        status: session.status,
        sun: session.sun,
        score: session.score,
        plants: session
            .plants
            .iter()
            .map(|p| PlantSnapshot {
                id: p.id,
                kind: p.kind,
                x: p.column,
                y: p.row,
                health: p.health,
            })
            .collect(),
        zombies: session
            .zombies
            .iter()
            .map(|z| ZombieSnapshot {
                id: z.id,
                kind: z.kind,
                x: z.x,
                y: z.row,
                health: z.health,
            })
            .collect(),
        vehicles: session
            .vehicles
            .iter()
            .map(|v| VehicleSnapshot {
                y: v.row,
                x: v.x,
                active: v.active,
                used: v.used,
                motion: v.motion(),
            })
            .collect(),
        wave_index: session.wave.index,
        wave_phase: session.wave.phase,
        wave_budget: session.wave.budget,
        wave_started_at: session.wave.phase_started_ms,
        clock_ms: session.clock_ms,
    }
}
