use std::sync::Arc;

use quizroom_common::error::LobbyError;
use quizroom_common::participant::{Participant, ParticipantView};
use quizroom_common::room::{Room, RoomId, UserId};

use crate::notifier::{RoomEvent, SharedNotifier};
use crate::store::{RoomStore, StoreResult};

/// Records who is in which room. Owns all participant inserts.
pub struct ParticipantRegistry<S> {
    store: Arc<S>,
    notifier: SharedNotifier,
}

impl<S: RoomStore> ParticipantRegistry<S> {
    pub fn new(store: Arc<S>, notifier: SharedNotifier) -> Self {
        Self { store, notifier }
    }

    /// Persists a new room with its host as the only member. Store errors
    /// come back unconverted so a code collision can be retried.
    pub async fn open_room(&self, room: &Room) -> StoreResult<Participant> {
        let host = Participant::new(room.id, room.host_id);
        self.store
            .insert_room_with_host(room.clone(), host.clone())
            .await?;
        self.announce(room.id, room.host_id);
        Ok(host)
    }

    /// Adds the membership row. A repeat join surfaces as
    /// `DuplicateMembership` for the caller to absorb.
    pub async fn add_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Participant, LobbyError> {
        let participant = Participant::new(room_id, user_id);
        self.store.insert_participant(participant.clone()).await?;
        self.announce(room_id, user_id);
        Ok(participant)
    }

    /// Like `add_participant`, but refuses with `RoomFull` once the room
    /// holds `capacity` members. Check and insert are a single write.
    pub async fn add_participant_within(
        &self,
        room_id: RoomId,
        user_id: UserId,
        capacity: u16,
    ) -> Result<Participant, LobbyError> {
        let participant = Participant::new(room_id, user_id);
        self.store
            .insert_participant_within(participant.clone(), capacity)
            .await?;
        self.announce(room_id, user_id);
        Ok(participant)
    }

    pub async fn list_participants(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ParticipantView>, LobbyError> {
        Ok(self.store.list_participants(room_id).await?)
    }

    pub async fn count(&self, room_id: RoomId) -> Result<u16, LobbyError> {
        Ok(self.store.count_participants(room_id).await?)
    }

    fn announce(&self, room_id: RoomId, user_id: UserId) {
        tracing::info!("User {} joined room {}", user_id, room_id);
        self.notifier.publish(room_id, RoomEvent::ParticipantsChanged);
    }
}
