//! State of a logged-in user outside any room.

use super::factory::{HandlerFactory, TriviaHandlerFactory};
use super::packet::{
    self, CreateRoomRequest, CreateRoomResponse, GetPlayersInRoomResponse, GetRoomsResponse,
    RoomIdRequest,
};
use crate::app::LoggedUser;
use crate::handler::{RequestHandler, RequestResult};
use crate::protocol::{MessageCode, RequestInfo};
use tracing::debug;

pub struct MenuRequestHandler {
    factory: TriviaHandlerFactory,
    user: LoggedUser,
}

impl MenuRequestHandler {
    pub fn new(factory: TriviaHandlerFactory, user: LoggedUser) -> Self {
        Self { factory, user }
    }

    fn logout(&self) -> RequestResult {
        self.factory.login_manager().logout(&self.user);
        RequestResult::switch(
            packet::ok(MessageCode::Logout),
            self.factory.create_login_handler(),
        )
    }

    fn get_rooms(&self) -> RequestResult {
        let rooms = self.factory.room_manager().get_rooms();
        RequestResult::stay(packet::response(
            MessageCode::GetRooms,
            &GetRoomsResponse { status: 1, rooms },
        ))
    }

    fn get_players_in_room(&self, request: &RequestInfo) -> RequestResult {
        let body: RoomIdRequest = match packet::decode(&request.payload) {
            Ok(body) => body,
            Err(e) => return RequestResult::stay(packet::error(e.to_string())),
        };

        match self.factory.room_manager().get_room(body.room_id) {
            Some(room) => RequestResult::stay(packet::response(
                MessageCode::GetPlayersInRoom,
                &GetPlayersInRoomResponse {
                    status: 1,
                    players: room.players,
                },
            )),
            None => RequestResult::stay(packet::error(format!(
                "room {} does not exist",
                body.room_id
            ))),
        }
    }

    fn join_room(&self, request: &RequestInfo) -> RequestResult {
        let body: RoomIdRequest = match packet::decode(&request.payload) {
            Ok(body) => body,
            Err(e) => return RequestResult::stay(packet::error(e.to_string())),
        };

        match self
            .factory
            .room_manager()
            .join_room(body.room_id, self.user.username())
        {
            Ok(room) => RequestResult::switch(
                packet::ok(MessageCode::JoinRoom),
                self.factory
                    .create_room_member_handler(room.id, self.user.clone()),
            ),
            Err(e) => RequestResult::stay(packet::error(e.to_string())),
        }
    }

    fn create_room(&self, request: &RequestInfo) -> RequestResult {
        let body: CreateRoomRequest = match packet::decode(&request.payload) {
            Ok(body) => body,
            Err(e) => return RequestResult::stay(packet::error(e.to_string())),
        };

        match self.factory.room_manager().create_room(
            self.user.username(),
            &body.room_name,
            body.max_users,
        ) {
            Ok(room) => RequestResult::switch(
                packet::response(
                    MessageCode::CreateRoom,
                    &CreateRoomResponse {
                        status: 1,
                        room_id: room.id,
                    },
                ),
                self.factory
                    .create_room_admin_handler(room.id, self.user.clone()),
            ),
            Err(e) => RequestResult::stay(packet::error(e.to_string())),
        }
    }
}

impl RequestHandler for MenuRequestHandler {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn is_request_relevant(&self, request: &RequestInfo) -> bool {
        matches!(
            request.code,
            MessageCode::Logout
                | MessageCode::GetRooms
                | MessageCode::GetPlayersInRoom
                | MessageCode::JoinRoom
                | MessageCode::CreateRoom
        )
    }

    fn handle_request(&mut self, request: &RequestInfo) -> RequestResult {
        match request.code {
            MessageCode::Logout => self.logout(),
            MessageCode::GetRooms => self.get_rooms(),
            MessageCode::GetPlayersInRoom => self.get_players_in_room(request),
            MessageCode::JoinRoom => self.join_room(request),
            MessageCode::CreateRoom => self.create_room(request),
            other => RequestResult::stay(packet::error(format!("unexpected request {other:?}"))),
        }
    }

    fn on_disconnect(&mut self) {
        debug!(user = self.user.username(), "Menu session ended");
        self.factory.login_manager().logout(&self.user);
    }
}
