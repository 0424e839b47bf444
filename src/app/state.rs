//! Application state shared across routes

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::lobby::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    /// Process start, reported as uptime by `/health`
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = Arc::new(SessionManager::new(config.game.clone()));

        Self {
            config: Arc::new(config),
            sessions,
            started_at: Instant::now(),
        }
    }
}
