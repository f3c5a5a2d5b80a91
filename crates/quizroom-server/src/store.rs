use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use quizroom_common::catalog::{Category, QuizType};
use quizroom_common::error::LobbyError;
use quizroom_common::participant::{Participant, ParticipantView, Profile};
use quizroom_common::room::{JoinCode, Room, RoomId, RoomStatus, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique `(room_id, user_id)` violation.
    #[error("duplicate membership")]
    Duplicate,
    /// Another waiting room already holds this join code.
    #[error("join code already in use")]
    CodeInUse,
    /// A conditional write's guard did not hold.
    #[error(transparent)]
    Rejected(#[from] LobbyError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for LobbyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => LobbyError::DuplicateMembership,
            StoreError::Rejected(inner) => inner,
            StoreError::CodeInUse | StoreError::Unavailable(_) => {
                LobbyError::Persistence(e.to_string())
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Guard evaluated inside the same write that changes a room's status.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub requested_by: UserId,
    pub to: RoomStatus,
    pub min_participants: u16,
}

/// Persistent tables backing the lobby: `rooms`, `participants`, user
/// profiles and the read-only quiz catalogue.
pub trait RoomStore: Send + Sync + 'static {
    fn upsert_profile(&self, profile: Profile) -> impl Future<Output = StoreResult<()>> + Send;

    fn list_quiz_types(&self) -> impl Future<Output = StoreResult<Vec<QuizType>>> + Send;

    fn get_quiz_type(&self, id: Uuid)
        -> impl Future<Output = StoreResult<Option<QuizType>>> + Send;

    fn list_categories(&self) -> impl Future<Output = StoreResult<Vec<Category>>> + Send;

    fn get_category(&self, id: Uuid)
        -> impl Future<Output = StoreResult<Option<Category>>> + Send;

    fn get_profile(&self, user_id: UserId)
        -> impl Future<Output = StoreResult<Option<Profile>>> + Send;

    /// Inserts the room together with its host's membership row, as one
    /// write. Fails with `CodeInUse` if a waiting room already has
    /// `room.code`; on any failure neither row exists afterwards.
    fn insert_room_with_host(
        &self,
        room: Room,
        host: Participant,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_room(&self, id: RoomId) -> impl Future<Output = StoreResult<Option<Room>>> + Send;

    /// Only rooms still in `waiting` status are found by code.
    fn find_waiting_room(
        &self,
        code: &JoinCode,
    ) -> impl Future<Output = StoreResult<Option<Room>>> + Send;

    fn count_participants(&self, room_id: RoomId)
        -> impl Future<Output = StoreResult<u16>> + Send;

    /// Unconditional insert; `Duplicate` on an existing membership.
    fn insert_participant(
        &self,
        participant: Participant,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Inserts iff the room has fewer than `capacity` members, as one
    /// write. A duplicate is reported before fullness.
    fn insert_participant_within(
        &self,
        participant: Participant,
        capacity: u16,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Members joined with profile display data, oldest first.
    fn list_participants(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = StoreResult<Vec<ParticipantView>>> + Send;

    /// Checks host identity, current status and member count, then
    /// applies the transition, all under one write.
    fn update_status(
        &self,
        room_id: RoomId,
        change: StatusChange,
    ) -> impl Future<Output = StoreResult<Room>> + Send;
}
