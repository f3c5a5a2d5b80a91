use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use quizroom_common::catalog::{Category, QuizType};
use quizroom_common::error::LobbyError;
use quizroom_common::participant::{ParticipantView, Profile};
use quizroom_common::room::{JoinCode, Room, RoomId, RoomStatus, RoomView, UserId};

use crate::config::LobbyConfig;
use crate::notifier::{RoomEvent, SharedNotifier};
use crate::participants::ParticipantRegistry;
use crate::store::{RoomStore, StatusChange, StoreError};

/// Room lifecycle: creation, join by code, host start/end.
pub struct LobbyManager<S> {
    store: Arc<S>,
    participants: ParticipantRegistry<S>,
    notifier: SharedNotifier,
    config: LobbyConfig,
    /// Held from a status write until its event is published, so
    /// subscribers see transitions in the order they were stored.
    status_gate: Mutex<()>,
}

fn draw_code() -> JoinCode {
    JoinCode::generate(&mut rand::thread_rng())
}

impl<S: RoomStore> LobbyManager<S> {
    pub fn new(store: Arc<S>, notifier: SharedNotifier, config: LobbyConfig) -> Self {
        Self {
            participants: ParticipantRegistry::new(store.clone(), notifier.clone()),
            store,
            notifier,
            config,
            status_gate: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &SharedNotifier {
        &self.notifier
    }

    pub async fn register_profile(&self, profile: Profile) -> Result<(), LobbyError> {
        Ok(self.store.upsert_profile(profile).await?)
    }

    pub async fn quiz_types(&self) -> Result<Vec<QuizType>, LobbyError> {
        Ok(self.store.list_quiz_types().await?)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, LobbyError> {
        Ok(self.store.list_categories().await?)
    }

    /// Opens a waiting room hosted by `host_id`, who is also its first
    /// participant.
    pub async fn create_room(
        &self,
        quiz_type_id: Uuid,
        category_id: Uuid,
        host_id: UserId,
    ) -> Result<RoomView, LobbyError> {
        let quiz_type = self
            .store
            .get_quiz_type(quiz_type_id)
            .await?
            .ok_or(LobbyError::UnknownQuizType)?;
        if !quiz_type.is_multiplayer {
            return Err(LobbyError::NotMultiplayer);
        }
        self.store
            .get_category(category_id)
            .await?
            .ok_or(LobbyError::UnknownCategory)?;

        let capacity = self.config.capacity_for(&quiz_type);
        let mut created = None;
        for attempt in 1..=self.config.code_attempts {
            let room = Room::new(draw_code(), quiz_type_id, category_id, host_id, capacity);
            match self.participants.open_room(&room).await {
                Ok(_) => {
                    created = Some(room);
                    break;
                }
                Err(StoreError::CodeInUse) => {
                    tracing::debug!("Join code {} taken (attempt {})", room.code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let room = created.ok_or_else(|| {
            LobbyError::Persistence("could not allocate a free join code".into())
        })?;

        tracing::info!(
            "Room {} created by {} with code {} (capacity {})",
            room.id,
            host_id,
            room.code,
            capacity
        );
        self.view(room).await
    }

    /// Joins a waiting room by code. Repeat joins are a no-op.
    pub async fn join_room(&self, code: &str, user_id: UserId) -> Result<RoomView, LobbyError> {
        let code = JoinCode::parse(code)?;
        let room = self
            .store
            .find_waiting_room(&code)
            .await?
            .ok_or(LobbyError::RoomNotFound)?;

        match self
            .participants
            .add_participant_within(room.id, user_id, room.capacity)
            .await
        {
            Ok(_) => {}
            Err(LobbyError::DuplicateMembership) => {
                tracing::debug!("User {} already in room {}", user_id, room.id);
            }
            Err(e) => {
                tracing::warn!("User {} could not join room {}: {}", user_id, room.id, e);
                return Err(e);
            }
        }

        self.view(room).await
    }

    pub async fn start_room(&self, room_id: RoomId, user_id: UserId) -> Result<RoomView, LobbyError> {
        let room = self
            .change_status(room_id, user_id, RoomStatus::Active, self.config.min_participants)
            .await?;
        tracing::info!("Room {} started by host {}", room_id, user_id);
        self.view(room).await
    }

    pub async fn end_room(&self, room_id: RoomId, user_id: UserId) -> Result<RoomView, LobbyError> {
        let room = self
            .change_status(room_id, user_id, RoomStatus::Ended, 0)
            .await?;
        tracing::info!("Room {} ended by host {}", room_id, user_id);
        self.view(room).await
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomView, LobbyError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or(LobbyError::RoomNotFound)?;
        self.view(room).await
    }

    pub async fn list_participants(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ParticipantView>, LobbyError> {
        self.participants.list_participants(room_id).await
    }

    async fn change_status(
        &self,
        room_id: RoomId,
        user_id: UserId,
        to: RoomStatus,
        min_participants: u16,
    ) -> Result<Room, LobbyError> {
        let change = StatusChange {
            requested_by: user_id,
            to,
            min_participants,
        };
        let _ordered = self.status_gate.lock().await;
        let room = self.store.update_status(room_id, change).await.map_err(|e| {
            let e = LobbyError::from(e);
            tracing::warn!("Room {} -> {} refused for {}: {}", room_id, to, user_id, e);
            e
        })?;
        self.notifier
            .publish(room_id, RoomEvent::StatusChanged(room.status));
        if room.status == RoomStatus::Ended {
            self.notifier.close_room(room_id);
        }
        Ok(room)
    }

    async fn view(&self, room: Room) -> Result<RoomView, LobbyError> {
        let quiz_type = self.store.get_quiz_type(room.quiz_type_id).await?;
        let category = self.store.get_category(room.category_id).await?;
        let host = self.store.get_profile(room.host_id).await?;
        let participant_count = self.participants.count(room.id).await?;

        Ok(RoomView {
            quiz_type_name: quiz_type.map(|t| t.name).unwrap_or_default(),
            category_name: category.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
            category_icon: category.and_then(|c| c.icon),
            host_display_name: host
                .map(|p| p.display_name)
                .unwrap_or_else(|| "Unknown host".to_string()),
            participant_count,
            room,
        })
    }
}
