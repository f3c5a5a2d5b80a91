use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::room::RoomStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("Game room not found or already started")]
    RoomNotFound,
    #[error("Game room is full")]
    RoomFull,
    #[error("Already a member of this room")]
    DuplicateMembership,
    #[error("Only the host can do that")]
    NotHost,
    #[error("Cannot move room from {from} to {to}")]
    InvalidTransition { from: RoomStatus, to: RoomStatus },
    #[error("Need at least {required} players to start (have {current})")]
    NotEnoughParticipants { required: u16, current: u16 },
    #[error("Invalid room code: {0:?}")]
    InvalidJoinCode(String),
    #[error("Unknown quiz type")]
    UnknownQuizType,
    #[error("Unknown category")]
    UnknownCategory,
    #[error("Quiz type is single-player only")]
    NotMultiplayer,
    #[error("Storage failure, please try again: {0}")]
    Persistence(String),
}

/// Error kinds as they travel over the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    NotHost,
    InvalidTransition,
    NotEnoughParticipants,
    InvalidJoinCode,
    UnknownQuizType,
    UnknownCategory,
    NotMultiplayer,
    InvalidAction,
    InternalError,
}

impl LobbyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LobbyError::RoomNotFound => ErrorCode::RoomNotFound,
            LobbyError::RoomFull => ErrorCode::RoomFull,
            LobbyError::NotHost => ErrorCode::NotHost,
            LobbyError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            LobbyError::NotEnoughParticipants { .. } => ErrorCode::NotEnoughParticipants,
            LobbyError::InvalidJoinCode(_) => ErrorCode::InvalidJoinCode,
            LobbyError::UnknownQuizType => ErrorCode::UnknownQuizType,
            LobbyError::UnknownCategory => ErrorCode::UnknownCategory,
            LobbyError::NotMultiplayer => ErrorCode::NotMultiplayer,
            // DuplicateMembership is absorbed server-side and should never get here.
            LobbyError::DuplicateMembership | LobbyError::Persistence(_) => {
                ErrorCode::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LobbyError::RoomNotFound.code(), ErrorCode::RoomNotFound);
        assert_eq!(LobbyError::RoomFull.code(), ErrorCode::RoomFull);
        assert_eq!(LobbyError::NotHost.code(), ErrorCode::NotHost);
        assert_eq!(
            LobbyError::Persistence("disk".into()).code(),
            ErrorCode::InternalError
        );
        assert_eq!(
            LobbyError::InvalidTransition {
                from: RoomStatus::Active,
                to: RoomStatus::Active
            }
            .code(),
            ErrorCode::InvalidTransition
        );
    }

    #[test]
    fn test_messages() {
        let e = LobbyError::NotEnoughParticipants {
            required: 2,
            current: 1,
        };
        assert_eq!(e.to_string(), "Need at least 2 players to start (have 1)");
        let e = LobbyError::InvalidTransition {
            from: RoomStatus::Ended,
            to: RoomStatus::Active,
        };
        assert_eq!(e.to_string(), "Cannot move room from ended to active");
    }
}
