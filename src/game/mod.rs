//! Game simulation modules

pub mod catalog;
pub mod clock;
pub mod error;
pub mod room;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod state;
pub mod wave;


pub use error::GameError;
pub use room::{GameRoom, RoomCommand, RoomHandle};
pub use session::Session;
