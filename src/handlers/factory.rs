//! Handler construction.
//!
//! The dispatcher only knows how to ask for the initial handler. Every other
//! state is built by the handler that transitions into it, through the same
//! factory.

use super::login::LoginRequestHandler;
use super::menu::MenuRequestHandler;
use super::room::{RoomAdminRequestHandler, RoomMemberRequestHandler};
use crate::app::{LoggedUser, LoginManager, RoomManager};
use crate::handler::RequestHandler;
use std::sync::Arc;

/// Builds the handler a freshly accepted connection starts with.
pub trait HandlerFactory: Send + Sync {
    fn create_login_handler(&self) -> Box<dyn RequestHandler>;
}

/// Factory for the trivia state machine.
///
/// Cheap to clone; handlers keep a copy to build their successors.
#[derive(Debug, Clone, Default)]
pub struct TriviaHandlerFactory {
    login_manager: Arc<LoginManager>,
    room_manager: Arc<RoomManager>,
}

impl TriviaHandlerFactory {
    pub fn new(login_manager: Arc<LoginManager>, room_manager: Arc<RoomManager>) -> Self {
        Self {
            login_manager,
            room_manager,
        }
    }

    pub fn login_manager(&self) -> &Arc<LoginManager> {
        &self.login_manager
    }

    pub fn room_manager(&self) -> &Arc<RoomManager> {
        &self.room_manager
    }

    pub fn create_menu_handler(&self, user: LoggedUser) -> Box<dyn RequestHandler> {
        Box::new(MenuRequestHandler::new(self.clone(), user))
    }

    pub fn create_room_admin_handler(&self, room_id: u32, user: LoggedUser) -> Box<dyn RequestHandler> {
        Box::new(RoomAdminRequestHandler::new(self.clone(), room_id, user))
    }

    pub fn create_room_member_handler(&self, room_id: u32, user: LoggedUser) -> Box<dyn RequestHandler> {
        Box::new(RoomMemberRequestHandler::new(self.clone(), room_id, user))
    }
}

impl HandlerFactory for TriviaHandlerFactory {
    fn create_login_handler(&self) -> Box<dyn RequestHandler> {
        Box::new(LoginRequestHandler::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_state() {
        let factory = TriviaHandlerFactory::default();
        let user = LoggedUser::new("alice");

        assert_eq!(factory.create_login_handler().name(), "login");
        assert_eq!(factory.create_menu_handler(user.clone()).name(), "menu");
        assert_eq!(factory.create_room_admin_handler(1, user.clone()).name(), "room-admin");
        assert_eq!(factory.create_room_member_handler(1, user).name(), "room-member");
    }

    #[test]
    fn test_clones_share_state() {
        let factory = TriviaHandlerFactory::default();
        let copy = factory.clone();

        factory.login_manager().signup("alice", "secret", "").unwrap();
        assert!(copy.login_manager().is_logged_in("alice"));
    }
}
