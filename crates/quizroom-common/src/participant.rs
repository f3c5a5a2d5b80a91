use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::room::{RoomId, UserId};

/// Membership of one user in one room. `(room_id, user_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub score: u32,
}

impl Participant {
    pub fn new(room_id: RoomId, user_id: UserId) -> Self {
        Self {
            room_id,
            user_id,
            joined_at: Utc::now(),
            correct_answers: 0,
            wrong_answers: 0,
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
}

/// A participant joined with the owning user's display attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub participant: Participant,
    pub username: String,
    pub display_name: String,
}

impl ParticipantView {
    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}
