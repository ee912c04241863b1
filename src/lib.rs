//! trivia-server: a trivia game server
//!
//! Every connection is owned by a request handler that represents its
//! protocol state. Handling a request can name a new handler, which
//! replaces the old one for that connection:
//!
//! - `protocol`: frame layout and message codes
//! - `handler`: the contract every state implements
//! - `session`: which handler owns which connection
//! - `server`: accept loop and per-connection workers
//! - `handlers`: the trivia states (login, menu, rooms)
//! - `app`: accounts and rooms shared by all sessions

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;
