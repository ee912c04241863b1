//! The contract every session handler implements.
//!
//! A handler is both the session's protocol state and the logic valid in
//! that state. The dispatcher asks the current handler whether a request is
//! relevant, lets it handle relevant ones, and installs whatever handler
//! the result names as the next state.

use crate::protocol::RequestInfo;
use bytes::Bytes;

/// What the session's handler should be after a request.
pub enum Transition {
    /// Keep the current handler.
    Stay,
    /// Replace the current handler. The old one is dropped.
    Switch(Box<dyn RequestHandler>),
    /// Write the reply, then end the session.
    Close,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Stay => f.write_str("Stay"),
            Transition::Switch(next) => write!(f, "Switch({})", next.name()),
            Transition::Close => f.write_str("Close"),
        }
    }
}

/// Outcome of handling one request.
#[derive(Debug)]
pub struct RequestResult {
    /// Bytes written back to the client verbatim.
    pub response: Bytes,
    pub transition: Transition,
}

impl RequestResult {
    /// Reply and keep the current handler.
    pub fn stay(response: impl Into<Bytes>) -> Self {
        RequestResult {
            response: response.into(),
            transition: Transition::Stay,
        }
    }

    /// Reply and move the session to `next`.
    pub fn switch(response: impl Into<Bytes>, next: Box<dyn RequestHandler>) -> Self {
        RequestResult {
            response: response.into(),
            transition: Transition::Switch(next),
        }
    }

    /// Reply and close the connection.
    pub fn close(response: impl Into<Bytes>) -> Self {
        RequestResult {
            response: response.into(),
            transition: Transition::Close,
        }
    }
}

/// A session state.
///
/// `handle_request` is only ever called with a request for which
/// `is_request_relevant` returned `true`; the dispatcher enforces this.
pub trait RequestHandler: Send {
    /// Short state name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this state accepts `request`. Must not have side effects.
    fn is_request_relevant(&self, request: &RequestInfo) -> bool;

    /// Execute `request` and name the next state.
    fn handle_request(&mut self, request: &RequestInfo) -> RequestResult;

    /// Called once on the handler that is current when its session ends.
    fn on_disconnect(&mut self) {}
}
