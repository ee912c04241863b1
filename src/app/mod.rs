//! In-memory application state shared by all sessions.
//!
//! - `users`: registered accounts and who is currently logged in
//! - `rooms`: open rooms and their members

pub mod rooms;
pub mod users;

pub use rooms::{RoomData, RoomError, RoomManager};
pub use users::{LoggedUser, LoginError, LoginManager};
