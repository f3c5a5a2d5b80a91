use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use uuid::Uuid;

use quizroom_common::catalog::{Category, QuizType};
use quizroom_common::error::LobbyError;
use quizroom_common::participant::{Participant, ParticipantView, Profile};
use quizroom_common::room::{JoinCode, Room, RoomId, RoomStatus, UserId};

use crate::store::{RoomStore, StatusChange, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    quiz_types: Vec<QuizType>,
    categories: Vec<Category>,
    rooms: HashMap<RoomId, Room>,
    /// Codes held by rooms in `waiting` status.
    waiting_codes: HashMap<JoinCode, RoomId>,
    /// Rows per room in insertion order.
    participants: HashMap<RoomId, Vec<Participant>>,
}

impl Tables {
    fn member_count(&self, room_id: RoomId) -> u16 {
        self.participants
            .get(&room_id)
            .map(|rows| u16::try_from(rows.len()).unwrap_or(u16::MAX))
            .unwrap_or(0)
    }

    fn is_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        self.participants
            .get(&room_id)
            .map(|rows| rows.iter().any(|p| p.user_id == user_id))
            .unwrap_or(false)
    }
}

/// Process-local store. Every write takes the table lock, which gives
/// each conditional write the serializability the lobby relies on.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
    reject_members: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            offline: AtomicBool::new(false),
            reject_members: AtomicBool::new(false),
        }
    }

    pub fn with_catalog(quiz_types: Vec<QuizType>, categories: Vec<Category>) -> Self {
        let mut store = Self::new();
        let tables = store.tables.get_mut();
        tables.quiz_types = quiz_types;
        tables.categories = categories;
        store
    }

    /// Makes every subsequent call fail as if the backend were down.
    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes membership inserts fail while other writes still succeed.
    #[cfg(test)]
    pub fn set_reject_members(&self, reject: bool) {
        self.reject_members.store(reject, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.tables.read().await.rooms.len()
    }

    fn check_member_writes(&self) -> StoreResult<()> {
        if self.reject_members.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("participants table locked".into()));
        }
        Ok(())
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl RoomStore for MemoryStore {
    async fn upsert_profile(&self, profile: Profile) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    async fn list_quiz_types(&self) -> StoreResult<Vec<QuizType>> {
        self.check_online()?;
        Ok(self.tables.read().await.quiz_types.clone())
    }

    async fn get_quiz_type(&self, id: Uuid) -> StoreResult<Option<QuizType>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.quiz_types.iter().find(|t| t.id == id).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.check_online()?;
        Ok(self.tables.read().await.categories.clone())
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_profile(&self, user_id: UserId) -> StoreResult<Option<Profile>> {
        self.check_online()?;
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn insert_room_with_host(&self, room: Room, host: Participant) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if tables.waiting_codes.contains_key(&room.code) {
            return Err(StoreError::CodeInUse);
        }
        // Everything that can fail happens before the first mutation.
        self.check_member_writes()?;
        if room.status == RoomStatus::Waiting {
            tables.waiting_codes.insert(room.code.clone(), room.id);
        }
        tables.participants.insert(room.id, vec![host]);
        tables.rooms.insert(room.id, room);
        Ok(())
    }

    async fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        self.check_online()?;
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn find_waiting_room(&self, code: &JoinCode) -> StoreResult<Option<Room>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .waiting_codes
            .get(code)
            .and_then(|id| tables.rooms.get(id))
            .filter(|room| room.status == RoomStatus::Waiting)
            .cloned())
    }

    async fn count_participants(&self, room_id: RoomId) -> StoreResult<u16> {
        self.check_online()?;
        Ok(self.tables.read().await.member_count(room_id))
    }

    async fn insert_participant(&self, participant: Participant) -> StoreResult<()> {
        self.insert_participant_within(participant, u16::MAX).await
    }

    async fn insert_participant_within(
        &self,
        participant: Participant,
        capacity: u16,
    ) -> StoreResult<()> {
        self.check_online()?;
        self.check_member_writes()?;
        let mut tables = self.tables.write().await;
        if !tables.rooms.contains_key(&participant.room_id) {
            return Err(StoreError::Rejected(LobbyError::RoomNotFound));
        }
        if tables.is_member(participant.room_id, participant.user_id) {
            return Err(StoreError::Duplicate);
        }
        if tables.member_count(participant.room_id) >= capacity {
            return Err(StoreError::Rejected(LobbyError::RoomFull));
        }
        tables
            .participants
            .entry(participant.room_id)
            .or_default()
            .push(participant);
        Ok(())
    }

    async fn list_participants(&self, room_id: RoomId) -> StoreResult<Vec<ParticipantView>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut views: Vec<ParticipantView> = tables
            .participants
            .get(&room_id)
            .map(|rows| {
                rows.iter()
                    .map(|p| {
                        let (username, display_name) = match tables.profiles.get(&p.user_id) {
                            Some(profile) => {
                                (profile.username.clone(), profile.display_name.clone())
                            }
                            None => (String::new(), "Unknown player".to_string()),
                        };
                        ParticipantView {
                            participant: p.clone(),
                            username,
                            display_name,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        // Stable, so equal timestamps keep insertion order.
        views.sort_by_key(|v| v.participant.joined_at);
        Ok(views)
    }

    async fn update_status(&self, room_id: RoomId, change: StatusChange) -> StoreResult<Room> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let current = tables.member_count(room_id);
        let room = tables
            .rooms
            .get_mut(&room_id)
            .ok_or(StoreError::Rejected(LobbyError::RoomNotFound))?;

        if !room.is_host(change.requested_by) {
            return Err(LobbyError::NotHost.into());
        }
        if !room.status.can_transition_to(change.to) {
            return Err(LobbyError::InvalidTransition {
                from: room.status,
                to: change.to,
            }
            .into());
        }
        if current < change.min_participants {
            return Err(LobbyError::NotEnoughParticipants {
                required: change.min_participants,
                current,
            }
            .into());
        }

        let was_waiting = room.status == RoomStatus::Waiting;
        room.transition(change.to)?;
        let updated = room.clone();
        if was_waiting {
            tables.waiting_codes.remove(&updated.code);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_for(host: UserId, code: &str) -> (Room, Participant) {
        let room = Room::new(
            JoinCode::parse(code).unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            host,
            3,
        );
        let seat = Participant::new(room.id, host);
        (room, seat)
    }

    async fn open(store: &MemoryStore, host: UserId, code: &str) -> RoomId {
        let (room, seat) = room_for(host, code);
        let room_id = room.id;
        store.insert_room_with_host(room, seat).await.unwrap();
        room_id
    }

    #[tokio::test]
    async fn test_room_starts_with_its_host() {
        let store = MemoryStore::new();
        let host = Uuid::new_v4();
        let room_id = open(&store, host, "HHHHHH").await;
        let members = store.list_participants(room_id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].participant.user_id, host);
    }

    #[tokio::test]
    async fn test_waiting_code_is_unique() {
        let store = MemoryStore::new();
        open(&store, Uuid::new_v4(), "AAAAAA").await;
        let (room, seat) = room_for(Uuid::new_v4(), "AAAAAA");
        let err = store.insert_room_with_host(room, seat).await.unwrap_err();
        assert!(matches!(err, StoreError::CodeInUse));
        assert_eq!(store.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_host_insert_leaves_nothing_behind() {
        let store = MemoryStore::new();
        store.set_reject_members(true);
        let (room, seat) = room_for(Uuid::new_v4(), "EEEEEE");
        let room_id = room.id;
        let err = store.insert_room_with_host(room, seat).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.room_count().await, 0);
        assert!(store.get_room(room_id).await.unwrap().is_none());

        // The code was never reserved.
        store.set_reject_members(false);
        let code = JoinCode::parse("EEEEEE").unwrap();
        assert!(store.find_waiting_room(&code).await.unwrap().is_none());
        open(&store, Uuid::new_v4(), "EEEEEE").await;
        assert!(store.find_waiting_room(&code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_code_is_released_once_room_starts() {
        let store = MemoryStore::new();
        let host = Uuid::new_v4();
        let room_id = open(&store, host, "BBBBBB").await;
        store
            .update_status(
                room_id,
                StatusChange {
                    requested_by: host,
                    to: RoomStatus::Active,
                    min_participants: 1,
                },
            )
            .await
            .unwrap();

        let code = JoinCode::parse("BBBBBB").unwrap();
        assert!(store.find_waiting_room(&code).await.unwrap().is_none());
        open(&store, Uuid::new_v4(), "BBBBBB").await;
        assert!(store.find_waiting_room(&code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_reported_before_full() {
        let store = MemoryStore::new();
        let host = Uuid::new_v4();
        let room_id = open(&store, host, "CCCCCC").await;

        let err = store
            .insert_participant_within(Participant::new(room_id, host), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        let err = store
            .insert_participant_within(Participant::new(room_id, Uuid::new_v4()), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(LobbyError::RoomFull)));
        assert_eq!(store.count_participants(room_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_participants_fall_back_without_profile() {
        let store = MemoryStore::new();
        let known = Uuid::new_v4();
        store
            .upsert_profile(Profile {
                user_id: known,
                username: "quizzer".into(),
                display_name: "Quiz Master".into(),
            })
            .await
            .unwrap();
        let room_id = open(&store, known, "DDDDDD").await;
        store
            .insert_participant(Participant::new(room_id, Uuid::new_v4()))
            .await
            .unwrap();

        let views = store.list_participants(room_id).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].display_name, "Quiz Master");
        assert_eq!(views[0].username, "quizzer");
        assert_eq!(views[1].display_name, "Unknown player");
    }

    #[test]
    fn test_member_count_saturates() {
        let mut tables = Tables::default();
        let room_id = Uuid::new_v4();
        let rows = (0..u16::MAX as usize + 5)
            .map(|_| Participant::new(room_id, Uuid::new_v4()))
            .collect();
        tables.participants.insert(room_id, rows);
        assert_eq!(tables.member_count(room_id), u16::MAX);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get_room(Uuid::new_v4()).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.get_room(Uuid::new_v4()).await.unwrap().is_none());
    }
}
