//! Initial state of every connection.

use super::factory::TriviaHandlerFactory;
use super::packet::{self, LoginRequest, SignupRequest};
use crate::handler::{RequestHandler, RequestResult};
use crate::protocol::{MessageCode, RequestInfo};
use tracing::debug;

/// Accepts `Login` and `Signup`. Success moves the session to the menu.
pub struct LoginRequestHandler {
    factory: TriviaHandlerFactory,
}

impl LoginRequestHandler {
    pub fn new(factory: TriviaHandlerFactory) -> Self {
        Self { factory }
    }

    fn login(&self, request: &RequestInfo) -> RequestResult {
        let body: LoginRequest = match packet::decode(&request.payload) {
            Ok(body) => body,
            Err(e) => return RequestResult::stay(packet::error(e.to_string())),
        };

        match self
            .factory
            .login_manager()
            .login(&body.username, &body.password)
        {
            Ok(user) => RequestResult::switch(
                packet::ok(MessageCode::Login),
                self.factory.create_menu_handler(user),
            ),
            Err(e) => {
                debug!(user = %body.username, error = %e, "Login rejected");
                RequestResult::stay(packet::error(e.to_string()))
            }
        }
    }

    fn signup(&self, request: &RequestInfo) -> RequestResult {
        let body: SignupRequest = match packet::decode(&request.payload) {
            Ok(body) => body,
            Err(e) => return RequestResult::stay(packet::error(e.to_string())),
        };

        match self
            .factory
            .login_manager()
            .signup(&body.username, &body.password, &body.email)
        {
            Ok(user) => RequestResult::switch(
                packet::ok(MessageCode::Signup),
                self.factory.create_menu_handler(user),
            ),
            Err(e) => RequestResult::stay(packet::error(e.to_string())),
        }
    }
}

impl RequestHandler for LoginRequestHandler {
    fn name(&self) -> &'static str {
        "login"
    }

    fn is_request_relevant(&self, request: &RequestInfo) -> bool {
        matches!(request.code, MessageCode::Login | MessageCode::Signup)
    }

    fn handle_request(&mut self, request: &RequestInfo) -> RequestResult {
        match request.code {
            MessageCode::Login => self.login(request),
            MessageCode::Signup => self.signup(request),
            other => RequestResult::stay(packet::error(format!("unexpected request {other:?}"))),
        }
    }
}
