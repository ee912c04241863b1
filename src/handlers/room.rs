//! States of a user inside a room.
//!
//! The admin can close the room; members can leave it. Both can poll the
//! room state. A member whose room was closed is sent back to the menu on
//! its next poll.

use super::factory::TriviaHandlerFactory;
use super::packet::{self, RoomStateResponse};
use crate::app::LoggedUser;
use crate::handler::{RequestHandler, RequestResult};
use crate::protocol::{MessageCode, RequestInfo};
use tracing::debug;

/// What both room handlers hold.
struct RoomSession {
    factory: TriviaHandlerFactory,
    room_id: u32,
    user: LoggedUser,
}

impl RoomSession {
    fn room_state(&self) -> (bool, bytes::Bytes) {
        let room = self.factory.room_manager().get_room(self.room_id);
        let is_open = room.is_some();
        let reply = packet::response(
            MessageCode::GetRoomState,
            &RoomStateResponse {
                status: 1,
                is_open,
                room,
            },
        );
        (is_open, reply)
    }

    fn back_to_menu(&self, response: bytes::Bytes) -> RequestResult {
        RequestResult::switch(
            response,
            self.factory.create_menu_handler(self.user.clone()),
        )
    }
}

pub struct RoomAdminRequestHandler {
    session: RoomSession,
}

impl RoomAdminRequestHandler {
    pub fn new(factory: TriviaHandlerFactory, room_id: u32, user: LoggedUser) -> Self {
        Self {
            session: RoomSession {
                factory,
                room_id,
                user,
            },
        }
    }

    fn close_room(&self) -> RequestResult {
        let session = &self.session;
        match session
            .factory
            .room_manager()
            .close_room(session.room_id, session.user.username())
        {
            Ok(_) => session.back_to_menu(packet::ok(MessageCode::CloseRoom)),
            Err(e) => RequestResult::stay(packet::error(e.to_string())),
        }
    }
}

impl RequestHandler for RoomAdminRequestHandler {
    fn name(&self) -> &'static str {
        "room-admin"
    }

    fn is_request_relevant(&self, request: &RequestInfo) -> bool {
        matches!(request.code, MessageCode::CloseRoom | MessageCode::GetRoomState)
    }

    fn handle_request(&mut self, request: &RequestInfo) -> RequestResult {
        match request.code {
            MessageCode::CloseRoom => self.close_room(),
            MessageCode::GetRoomState => RequestResult::stay(self.session.room_state().1),
            other => RequestResult::stay(packet::error(format!("unexpected request {other:?}"))),
        }
    }

    fn on_disconnect(&mut self) {
        let session = &self.session;
        debug!(user = session.user.username(), room = session.room_id, "Room admin left");
        // The room may already be gone; nothing to report either way.
        let _ = session
            .factory
            .room_manager()
            .close_room(session.room_id, session.user.username());
        session.factory.login_manager().logout(&session.user);
    }
}

pub struct RoomMemberRequestHandler {
    session: RoomSession,
}

impl RoomMemberRequestHandler {
    pub fn new(factory: TriviaHandlerFactory, room_id: u32, user: LoggedUser) -> Self {
        Self {
            session: RoomSession {
                factory,
                room_id,
                user,
            },
        }
    }

    fn leave_room(&self) -> RequestResult {
        let session = &self.session;
        session
            .factory
            .room_manager()
            .leave_room(session.room_id, session.user.username());
        session.back_to_menu(packet::ok(MessageCode::LeaveRoom))
    }

    fn get_room_state(&self) -> RequestResult {
        match self.session.room_state() {
            (true, reply) => RequestResult::stay(reply),
            (false, reply) => self.session.back_to_menu(reply),
        }
    }
}

impl RequestHandler for RoomMemberRequestHandler {
    fn name(&self) -> &'static str {
        "room-member"
    }

    fn is_request_relevant(&self, request: &RequestInfo) -> bool {
        matches!(request.code, MessageCode::LeaveRoom | MessageCode::GetRoomState)
    }

    fn handle_request(&mut self, request: &RequestInfo) -> RequestResult {
        match request.code {
            MessageCode::LeaveRoom => self.leave_room(),
            MessageCode::GetRoomState => self.get_room_state(),
            other => RequestResult::stay(packet::error(format!("unexpected request {other:?}"))),
        }
    }

    fn on_disconnect(&mut self) {
        let session = &self.session;
        debug!(user = session.user.username(), room = session.room_id, "Room member left");
        session
            .factory
            .room_manager()
            .leave_room(session.room_id, session.user.username());
        session.factory.login_manager().logout(&session.user);
    }
}
