use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use uuid::Uuid;

use crate::catalog::{Category, QuizType};
use crate::error::ErrorCode;
use crate::participant::ParticipantView;
use crate::room::{RoomId, RoomStatus, RoomView, UserId};

// -- Framing --

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed_transport(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024)
        .new_framed(stream)
}

// -- Client -> Server Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // Handshake
    Hello {
        user_id: UserId,
        username: String,
        display_name: String,
        version: String,
    },

    // Catalogue
    ListQuizTypes,
    ListCategories,

    // Lobby
    CreateRoom {
        quiz_type_id: Uuid,
        category_id: Uuid,
    },
    /// Raw user input; the server normalizes and validates it.
    JoinRoom {
        code: String,
    },
    GetRoom {
        room_id: RoomId,
    },
    ListParticipants {
        room_id: RoomId,
    },
    StartRoom {
        room_id: RoomId,
    },
    EndRoom {
        room_id: RoomId,
    },

    // Realtime
    Subscribe {
        room_id: RoomId,
    },
    Unsubscribe {
        room_id: RoomId,
    },

    // Connection
    Ping,
    Disconnect,
}

// -- Server -> Client Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // Handshake
    Welcome {
        user_id: UserId,
        server_version: String,
    },
    HandshakeError {
        reason: String,
    },

    // Catalogue
    QuizTypes {
        quiz_types: Vec<QuizType>,
    },
    Categories {
        categories: Vec<Category>,
    },

    // Lobby
    RoomCreated {
        room: RoomView,
    },
    RoomJoined {
        room: RoomView,
    },
    Room {
        room: RoomView,
    },
    Participants {
        room_id: RoomId,
        participants: Vec<ParticipantView>,
    },

    // Realtime
    Subscribed {
        room_id: RoomId,
    },
    Unsubscribed {
        room_id: RoomId,
    },
    /// Membership changed; re-fetch with `ListParticipants`.
    ParticipantsChanged {
        room_id: RoomId,
    },
    RoomStatusChanged {
        room_id: RoomId,
        status: RoomStatus,
    },

    // Errors
    Error {
        code: ErrorCode,
        message: String,
    },

    // Connection
    Pong,
}

// -- Serialization helpers --

pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    Ok(Bytes::from(json))
}

pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    data: &[u8],
) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

// -- Transport helpers --

pub async fn send_message<T: Serialize>(
    transport: &mut Transport,
    msg: &T,
) -> anyhow::Result<()> {
    let bytes = serialize_message(msg).map_err(|e| anyhow::anyhow!("serialize error: {}", e))?;
    transport
        .send(bytes)
        .await
        .map_err(|e| anyhow::anyhow!("send error: {}", e))
}

pub async fn recv_message<T: for<'de> Deserialize<'de>>(
    transport: &mut Transport,
) -> anyhow::Result<Option<T>> {
    match transport.next().await {
        Some(Ok(frame)) => {
            let msg = deserialize_message(&frame)
                .map_err(|e| anyhow::anyhow!("deserialize error: {}", e))?;
            Ok(Some(msg))
        }
        Some(Err(e)) => Err(anyhow::anyhow!("recv error: {}", e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_serialization() {
        let id = Uuid::new_v4();
        let msg = ClientMessage::Hello {
            user_id: id,
            username: "alice".into(),
            display_name: "Alice".into(),
            version: "0.1.0".into(),
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ClientMessage = deserialize_message(&bytes).unwrap();
        match deserialized {
            ClientMessage::Hello {
                user_id,
                username,
                display_name,
                version,
            } => {
                assert_eq!(user_id, id);
                assert_eq!(username, "alice");
                assert_eq!(display_name, "Alice");
                assert_eq!(version, "0.1.0");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_status_change_serialization() {
        let room_id = Uuid::new_v4();
        let msg = ServerMessage::RoomStatusChanged {
            room_id,
            status: RoomStatus::Active,
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ServerMessage = deserialize_message(&bytes).unwrap();
        match deserialized {
            ServerMessage::RoomStatusChanged { room_id: id, status } => {
                assert_eq!(id, room_id);
                assert_eq!(status, RoomStatus::Active);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let msg = ServerMessage::Error {
            code: ErrorCode::RoomFull,
            message: "Game room is full".into(),
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ServerMessage = deserialize_message(&bytes).unwrap();
        assert!(matches!(
            deserialized,
            ServerMessage::Error {
                code: ErrorCode::RoomFull,
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(deserialize_message::<ClientMessage>(b"{\"Nope\":1}").is_err());
        assert!(deserialize_message::<ClientMessage>(b"not json").is_err());
    }
}
