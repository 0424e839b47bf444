//! Session lifecycle: registry, id allocation, command routing, idle reaping

pub mod manager;

pub use manager::SessionManager;
