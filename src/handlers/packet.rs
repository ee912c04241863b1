//! Packet bodies used by the trivia handlers.
//!
//! Request payload (after the frame's code byte):
//!
//! ```text
//! | u32 big-endian body length | JSON body |
//! ```
//!
//! Replies repeat the layout with the code byte in front:
//!
//! ```text
//! | code | u32 big-endian body length | JSON body |
//! ```
//!
//! The explicit length lets a body be smaller than the frame that carried it.

use crate::app::RoomData;
use crate::protocol::MessageCode;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("malformed body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a length-prefixed JSON body.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PacketError> {
    if payload.len() < LENGTH_PREFIX {
        return Err(PacketError::Truncated {
            expected: LENGTH_PREFIX,
            actual: payload.len(),
        });
    }

    let (prefix, rest) = payload.split_at(LENGTH_PREFIX);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if rest.len() < len {
        return Err(PacketError::Truncated {
            expected: LENGTH_PREFIX + len,
            actual: payload.len(),
        });
    }

    Ok(serde_json::from_slice(&rest[..len])?)
}

/// Encode a body as a length-prefixed JSON payload without a code byte.
pub fn encode_body<T: Serialize>(body: &T) -> Result<Bytes, PacketError> {
    let json = serde_json::to_vec(body)?;
    Ok(frame_body(&json))
}

fn frame_body(json: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(LENGTH_PREFIX + json.len());
    out.put_u32(json.len() as u32);
    out.extend_from_slice(json);
    out.freeze()
}

/// Encode a full reply.
///
/// A body that fails to serialize becomes an `Error` reply.
pub fn response<T: Serialize>(code: MessageCode, body: &T) -> Bytes {
    let (code, body) = match encode_body(body) {
        Ok(body) => (code, body),
        Err(e) => {
            tracing::error!(code = ?code, error = %e, "Failed to encode reply");
            (
                MessageCode::Error,
                frame_body(br#"{"message":"internal error"}"#),
            )
        }
    };
    let mut out = BytesMut::with_capacity(1 + body.len());
    out.put_u8(code.into());
    out.extend_from_slice(&body);
    out.freeze()
}

/// `{"status": 1}` reply for `code`.
pub fn ok(code: MessageCode) -> Bytes {
    response(code, &StatusResponse { status: 1 })
}

/// Error reply carrying `message`.
pub fn error(message: impl Into<String>) -> Bytes {
    response(
        MessageCode::Error,
        &ErrorResponse {
            message: message.into(),
        },
    )
}

// Requests

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIdRequest {
    pub room_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub max_users: u32,
}

// Responses

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetRoomsResponse {
    pub status: u32,
    pub rooms: Vec<RoomData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetPlayersInRoomResponse {
    pub status: u32,
    pub players: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRoomResponse {
    pub status: u32,
    pub room_id: u32,
}

/// `room` is `None` once the room has been closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStateResponse {
    pub status: u32,
    pub is_open: bool,
    pub room: Option<RoomData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut payload = encode_body(&RoomIdRequest { room_id: 7 }).unwrap().to_vec();
        payload.extend_from_slice(&[0u8; 16]);

        let request: RoomIdRequest = decode(&payload).unwrap();
        assert_eq!(request.room_id, 7);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode::<RoomIdRequest>(&[0, 0]),
            Err(PacketError::Truncated { expected: 4, actual: 2 })
        ));

        assert!(matches!(
            decode::<RoomIdRequest>(&[0, 0, 0, 10, b'{']),
            Err(PacketError::Truncated { expected: 14, actual: 5 })
        ));
    }

    #[test]
    fn test_decode_bad_json() {
        let mut payload = vec![0, 0, 0, 3];
        payload.extend_from_slice(b"{{{");
        assert!(matches!(
            decode::<RoomIdRequest>(&payload),
            Err(PacketError::Json(_))
        ));
    }

    #[test]
    fn test_signup_email_optional() {
        let mut payload = vec![0, 0, 0];
        let json = br#"{"username":"a","password":"b"}"#;
        payload.push(json.len() as u8);
        payload.extend_from_slice(json);

        let request: SignupRequest = decode(&payload).unwrap();
        assert_eq!(request.email, "");
    }

    #[test]
    fn test_response_layout() {
        let reply = ok(MessageCode::Login);
        assert_eq!(reply[0], 1);

        let len = u32::from_be_bytes([reply[1], reply[2], reply[3], reply[4]]) as usize;
        assert_eq!(len, reply.len() - 5);
        assert_eq!(&reply[5..], br#"{"status":1}"#);
    }

    #[test]
    fn test_error_response() {
        let reply = error("nope");
        assert_eq!(reply[0], 99);

        let body: ErrorResponse = decode(&reply[1..]).unwrap();
        assert_eq!(body.message, "nope");
    }

    #[test]
    fn test_unencodable_body_becomes_error() {
        // JSON object keys must be strings
        let mut body = std::collections::BTreeMap::new();
        body.insert((1u8, 2u8), 3u8);

        assert!(matches!(encode_body(&body), Err(PacketError::Json(_))));

        let reply = response(MessageCode::GetRooms, &body);
        assert_eq!(reply[0], u8::from(MessageCode::Error));
        let decoded: ErrorResponse = decode(&reply[1..]).unwrap();
        assert_eq!(decoded.message, "internal error");
    }
}
