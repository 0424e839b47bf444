//! Simulation step - one fixed quantum of lane combat

use tracing::{debug, info};

use super::catalog::{PlantAction, PlantStats, ZombieStats, CONTACT_RANGE, RESCUE};
use super::session::Session;
use super::state::{EndReason, MatchOutcome, SessionStatus, Side};
use super::wave::WaveTransition;

impl Session {
    /// Advance the session by `dt_ms` of simulation time.
    ///
    /// Returns the outcome if this step ended the match. Does nothing unless
    /// the session is playing.
    pub fn step(&mut self, dt_ms: u64) -> Option<MatchOutcome> {
        if self.status != SessionStatus::Playing {
            return None;
        }

        self.clock_ms += dt_ms;
        let now = self.clock_ms;
        let dt = dt_ms as f64 / 1000.0;

        if let Some(outcome) = self.update_waves(now) {
            return Some(outcome);
        }

        self.update_vehicles(dt);

        if let Some(outcome) = self.update_zombies(now, dt) {
            return Some(outcome);
        }

        self.update_plants(now);

        self.zombies.retain(|z| z.is_alive());
        self.plants.retain(|p| p.is_alive());

        None
    }

    fn update_waves(&mut self, now: u64) -> Option<MatchOutcome> {
        match self.wave.advance(now, !self.zombies.is_empty()) {
            WaveTransition::None => None,
            WaveTransition::BreakStarted => {
                debug!(session_id = %self.id, wave = self.wave.index, "Wave break");
                None
            }
            WaveTransition::WaveStarted { index, budget } => {
                info!(session_id = %self.id, wave = index, budget, "Wave started");
                None
            }
            WaveTransition::PlantsSurvived => {
                Some(self.finish(Some(Side::Plants), EndReason::WavesSurvived))
            }
        }
    }

    /// Roll triggered vehicles forward, flattening every zombie they sweep over
    fn update_vehicles(&mut self, dt: f64) {
        let Self {
            vehicles, zombies, ..
        } = self;

        for vehicle in vehicles.iter_mut().filter(|v| v.active && !v.used) {
            let from = vehicle.x;
            vehicle.x += RESCUE.speed * dt;

            for zombie in zombies.iter_mut().filter(|z| z.row == vehicle.row) {
                if zombie.x >= from - CONTACT_RANGE && zombie.x <= vehicle.x + CONTACT_RANGE {
                    zombie.health = 0;
                }
            }

            if vehicle.x > RESCUE.exit_x {
                vehicle.active = false;
                vehicle.used = true;
            }
        }
    }

    /// Zombies bite whatever plant they touch, otherwise walk toward the house
    fn update_zombies(&mut self, now: u64, dt: f64) -> Option<MatchOutcome> {
        let mut breached = false;

        let Self {
            id,
            plants,
            zombies,
            vehicles,
            ..
        } = self;

        for zombie in zombies.iter_mut().filter(|z| z.is_alive()) {
            let stats = ZombieStats::for_kind(zombie.kind);

            let blocker = plants.iter_mut().find(|p| {
                p.is_alive() && p.row == zombie.row && (p.x() - zombie.x).abs() < CONTACT_RANGE
            });

            if let Some(plant) = blocker {
                if now.saturating_sub(zombie.last_attack_ms) >= stats.attack_interval_ms {
                    plant.health -= stats.damage;
                    zombie.last_attack_ms = now;
                }
                continue;
            }

            zombie.x -= stats.speed * dt;
            if zombie.x > 0.0 {
                continue;
            }

            match vehicles
                .iter_mut()
                .find(|v| v.row == zombie.row && !v.used)
            {
                Some(vehicle) => {
                    if vehicle.trigger() {
                        info!(session_id = %id, row = vehicle.row, "Rescue vehicle triggered");
                    }
                }
                None => {
                    breached = true;
                    break;
                }
            }
        }

        breached.then(|| self.finish(Some(Side::Zombies), EndReason::HouseReached))
    }

    /// Sun payouts and shots, each on its own plant timer
    fn update_plants(&mut self, now: u64) {
        let Self {
            plants,
            zombies,
            sun,
            ..
        } = self;

        for plant in plants.iter_mut().filter(|p| p.is_alive()) {
            match PlantStats::for_kind(plant.kind).action {
                PlantAction::GenerateSun {
                    amount,
                    interval_ms,
                } => {
                    if now.saturating_sub(plant.last_sun_ms) >= interval_ms {
                        *sun = sun.saturating_add(amount);
                        plant.last_sun_ms = now;
                    }
                }
                PlantAction::Shoot {
                    damage,
                    interval_ms,
                } => {
                    if now.saturating_sub(plant.last_shot_ms) < interval_ms {
                        continue;
                    }
                    let plant_x = plant.x();
                    // min_by keeps the first of equal candidates, so ties resolve by spawn order
                    let target = zombies
                        .iter_mut()
                        .filter(|z| z.is_alive() && z.row == plant.row && z.x > plant_x)
                        .min_by(|a, b| a.x.total_cmp(&b.x));
                    if let Some(zombie) = target {
                        zombie.health -= damage;
                        plant.last_shot_ms = now;
                    }
                }
                PlantAction::Block => {}
            }
        }
    }
}
