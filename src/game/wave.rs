//! Wave director - alternating active/break phases with budget escalation

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Wave phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WavePhase {
    /// Zombies may be placed from the budget
    Active,
    /// Breather between waves
    Break,
}

/// Result of evaluating the director for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveTransition {
    None,
    /// Active phase ran out
    BreakStarted,
    /// A new wave began with a fresh budget
    WaveStarted { index: u32, budget: u32 },
    /// The final wave completed with the lawn clear
    PlantsSurvived,
}

/// Wave state carried by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveState {
    pub index: u32,
    pub phase: WavePhase,
    /// Sim clock at which the current phase began
    pub phase_started_ms: u64,
    /// Remaining zombie budget for this wave
    pub budget: u32,
    pub base_budget: u32,
    pub increment: u32,
    /// Waves the plants must survive
    pub total: u32,
    pub active_ms: u64,
    pub break_ms: u64,
}

impl WaveState {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            index: 0,
            phase: WavePhase::Active,
            phase_started_ms: 0,
            budget: config.wave_base_budget,
            base_budget: config.wave_base_budget,
            increment: config.wave_budget_increment,
            total: config.wave_total,
            active_ms: config.wave_active_ms,
            break_ms: config.wave_break_ms,
        }
    }

    /// Enter wave 0 at `now_ms`
    pub fn start(&mut self, now_ms: u64) {
        self.index = 0;
        self.phase = WavePhase::Active;
        self.phase_started_ms = now_ms;
        self.budget = self.budget_for(0);
    }

    pub fn budget_for(&self, index: u32) -> u32 {
        self.base_budget
            .saturating_add(index.saturating_mul(self.increment))
    }

    pub fn is_active(&self) -> bool {
        self.phase == WavePhase::Active
    }

    /// Debit `cost` from the budget, refusing (not clamping) an overdraw
    pub fn try_spend(&mut self, cost: u32) -> bool {
        match self.budget.checked_sub(cost) {
            Some(rest) => {
                self.budget = rest;
                true
            }
            None => false,
        }
    }

    /// Apply at most one phase transition for the sim clock `now_ms`
    pub fn advance(&mut self, now_ms: u64, zombies_alive: bool) -> WaveTransition {
        let elapsed = now_ms.saturating_sub(self.phase_started_ms);

        match self.phase {
            WavePhase::Active if elapsed >= self.active_ms => {
                self.phase = WavePhase::Break;
                self.phase_started_ms = now_ms;
                WaveTransition::BreakStarted
            }
            WavePhase::Break if elapsed >= self.break_ms => {
                self.index += 1;
                self.phase_started_ms = now_ms;
                if self.index >= self.total && !zombies_alive {
                    return WaveTransition::PlantsSurvived;
                }
                self.phase = WavePhase::Active;
                self.budget = self.budget_for(self.index);
                WaveTransition::WaveStarted {
                    index: self.index,
                    budget: self.budget,
                }
            }
            _ => WaveTransition::None,
        }
    }
}
