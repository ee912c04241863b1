//! Wire frame codec.
//!
//! A frame is whatever a single read returns, up to [`MAX_FRAME_SIZE`] bytes:
//!
//! ```text
//! +------+---------------------------+
//! | code | payload (0..=1023 bytes)  |
//! +------+---------------------------+
//! ```
//!
//! The codec only interprets the code byte. Payload structure is defined by
//! the pair (message code, current handler). Replies carry no envelope: the
//! bytes a handler returns are written to the socket verbatim.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum number of bytes consumed by one read.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Message type tag carried in the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCode {
    Login,
    Signup,
    Logout,
    GetRooms,
    GetPlayersInRoom,
    JoinRoom,
    CreateRoom,
    CloseRoom,
    LeaveRoom,
    GetRoomState,
    /// Reply-only code for failed requests.
    Error,
    /// Any tag this server does not know. Never relevant to a built-in handler.
    Unknown(u8),
}

impl From<u8> for MessageCode {
    fn from(byte: u8) -> Self {
        match byte {
            1 => MessageCode::Login,
            2 => MessageCode::Signup,
            3 => MessageCode::Logout,
            4 => MessageCode::GetRooms,
            5 => MessageCode::GetPlayersInRoom,
            6 => MessageCode::JoinRoom,
            7 => MessageCode::CreateRoom,
            8 => MessageCode::CloseRoom,
            9 => MessageCode::LeaveRoom,
            10 => MessageCode::GetRoomState,
            99 => MessageCode::Error,
            other => MessageCode::Unknown(other),
        }
    }
}

impl From<MessageCode> for u8 {
    fn from(code: MessageCode) -> Self {
        match code {
            MessageCode::Login => 1,
            MessageCode::Signup => 2,
            MessageCode::Logout => 3,
            MessageCode::GetRooms => 4,
            MessageCode::GetPlayersInRoom => 5,
            MessageCode::JoinRoom => 6,
            MessageCode::CreateRoom => 7,
            MessageCode::CloseRoom => 8,
            MessageCode::LeaveRoom => 9,
            MessageCode::GetRoomState => 10,
            MessageCode::Error => 99,
            MessageCode::Unknown(other) => other,
        }
    }
}

/// A parsed inbound frame. Consumed by exactly one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Tag from byte 0.
    pub code: MessageCode,
    /// Wall-clock time the frame was read.
    pub received_at: DateTime<Utc>,
    /// Bytes 1..n of the frame, exactly as received.
    pub payload: Bytes,
}

impl RequestInfo {
    /// Build a request from a non-empty frame.
    ///
    /// Returns `None` for an empty slice; bytes past [`MAX_FRAME_SIZE`] are
    /// ignored.
    pub fn parse(frame: &[u8], received_at: DateTime<Utc>) -> Option<Self> {
        let (&code, rest) = frame.split_first()?;
        let payload_len = rest.len().min(MAX_FRAME_SIZE - 1);

        Some(RequestInfo {
            code: MessageCode::from(code),
            received_at,
            payload: Bytes::copy_from_slice(&rest[..payload_len]),
        })
    }

    /// Convenience constructor stamped with the current time.
    pub fn new(code: MessageCode, payload: impl Into<Bytes>) -> Self {
        RequestInfo {
            code,
            received_at: Utc::now(),
            payload: payload.into(),
        }
    }
}

/// Read a single frame.
///
/// Performs exactly one read into `buf`. Returns `Ok(None)` when the peer
/// closed the stream; callers treat that the same as an error.
pub async fn read_frame<R>(
    reader: &mut R,
    buf: &mut [u8; MAX_FRAME_SIZE],
) -> io::Result<Option<RequestInfo>>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read(buf).await?;
    Ok(RequestInfo::parse(&buf[..n], Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_code_mapping() {
        for byte in 0..=u8::MAX {
            assert_eq!(u8::from(MessageCode::from(byte)), byte);
        }
        assert_eq!(MessageCode::from(1), MessageCode::Login);
        assert_eq!(MessageCode::from(10), MessageCode::GetRoomState);
        assert_eq!(MessageCode::from(42), MessageCode::Unknown(42));
    }

    #[test]
    fn test_parse_frame() {
        let now = Utc::now();
        let request = RequestInfo::parse(&[4, 0xAA, 0xBB], now).unwrap();
        assert_eq!(request.code, MessageCode::GetRooms);
        assert_eq!(request.received_at, now);
        assert_eq!(&request.payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_code_only_frame() {
        let request = RequestInfo::parse(&[3], Utc::now()).unwrap();
        assert_eq!(request.code, MessageCode::Logout);
        assert!(request.payload.is_empty());
    }

    #[test]
    fn test_parse_empty_frame() {
        assert!(RequestInfo::parse(&[], Utc::now()).is_none());
    }

    #[test]
    fn test_parse_caps_payload() {
        let frame = vec![1u8; MAX_FRAME_SIZE + 10];
        let request = RequestInfo::parse(&frame, Utc::now()).unwrap();
        assert_eq!(request.payload.len(), MAX_FRAME_SIZE - 1);
    }

    #[tokio::test]
    async fn test_read_frame_short_read() {
        let mut reader = tokio_test::io::Builder::new().read(&[6, 1, 2, 3]).build();
        let mut buf = [0u8; MAX_FRAME_SIZE];

        let request = read_frame(&mut reader, &mut buf).await.unwrap().unwrap();
        assert_eq!(request.code, MessageCode::JoinRoom);
        assert_eq!(&request.payload[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_frame_eof() {
        let mut reader = tokio_test::io::Builder::new().build();
        let mut buf = [0u8; MAX_FRAME_SIZE];

        assert!(read_frame(&mut reader, &mut buf).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_error() {
        let mut reader = tokio_test::io::Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut buf = [0u8; MAX_FRAME_SIZE];

        let err = read_frame(&mut reader, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
