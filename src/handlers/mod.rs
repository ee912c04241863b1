//! Trivia session handlers.
//!
//! ```text
//! login        --Login, Signup-->   menu
//! menu         --Logout-->          login
//! menu         --CreateRoom-->      room-admin
//! menu         --JoinRoom-->        room-member
//! room-admin   --CloseRoom-->       menu
//! room-member  --LeaveRoom-->       menu
//! ```
//!
//! - `factory`: builds every state, and the initial one for the server
//! - `packet`: length-prefixed JSON bodies

pub mod factory;
pub mod login;
pub mod menu;
pub mod packet;
pub mod room;

pub use factory::{HandlerFactory, TriviaHandlerFactory};
