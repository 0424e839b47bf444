//! Application wiring shared by every handler

pub mod state;

pub use state::AppState;
