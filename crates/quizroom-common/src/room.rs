use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LobbyError;

pub type RoomId = Uuid;
pub type UserId = Uuid;

pub const JOIN_CODE_LEN: usize = 6;

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// -- Join Code --

/// Short human-enterable code for a waiting room. Always six uppercase
/// ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinCode(String);

impl JoinCode {
    pub fn generate(rng: &mut impl Rng) -> Self {
        let code = (0..JOIN_CODE_LEN)
            .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Trims and upper-cases user input, rejecting anything that isn't
    /// exactly six alphanumerics.
    pub fn parse(input: &str) -> Result<Self, LobbyError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() != JOIN_CODE_LEN
            || !normalized.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(LobbyError::InvalidJoinCode(input.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JoinCode {
    type Err = LobbyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JoinCode {
    type Error = LobbyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JoinCode> for String {
    fn from(code: JoinCode) -> Self {
        code.0
    }
}

impl fmt::Display for JoinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Room Status --

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    Waiting,
    Active,
    Ended,
}

impl RoomStatus {
    /// Status only moves forward: waiting -> active -> ended.
    pub fn can_transition_to(self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Waiting, RoomStatus::Active) | (RoomStatus::Active, RoomStatus::Ended)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Active => "active",
            RoomStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

// -- Room --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub code: JoinCode,
    pub quiz_type_id: Uuid,
    pub category_id: Uuid,
    pub status: RoomStatus,
    pub host_id: UserId,
    pub capacity: u16,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new(
        code: JoinCode,
        quiz_type_id: Uuid,
        category_id: Uuid,
        host_id: UserId,
        capacity: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            quiz_type_id,
            category_id,
            status: RoomStatus::Waiting,
            host_id,
            capacity,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host_id == user_id
    }

    /// Moves the room to `next`, stamping the matching timestamp.
    pub fn transition(&mut self, next: RoomStatus) -> Result<(), LobbyError> {
        if !self.status.can_transition_to(next) {
            return Err(LobbyError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            RoomStatus::Active => self.started_at = Some(now),
            RoomStatus::Ended => self.ended_at = Some(now),
            RoomStatus::Waiting => {}
        }
        self.status = next;
        Ok(())
    }
}

/// A room with the display attributes a lobby needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub room: Room,
    pub quiz_type_name: String,
    pub category_name: String,
    pub category_icon: Option<String>,
    pub host_display_name: String,
    pub participant_count: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_are_valid() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = JoinCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), JOIN_CODE_LEN);
            assert_eq!(JoinCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let code = JoinCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(JoinCode::parse("ABC12").is_err());
        assert!(JoinCode::parse("ABC1234").is_err());
        assert!(JoinCode::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_alphanumeric() {
        assert!(matches!(
            JoinCode::parse("AB-12C"),
            Err(LobbyError::InvalidJoinCode(_))
        ));
        assert!(JoinCode::parse("ÄB12CD").is_err());
    }

    #[test]
    fn test_code_deserialization_validates() {
        let ok: JoinCode = serde_json::from_str("\"xyz789\"").unwrap();
        assert_eq!(ok.as_str(), "XYZ789");
        assert!(serde_json::from_str::<JoinCode>("\"nope\"").is_err());
    }

    #[test]
    fn test_status_only_moves_forward() {
        use RoomStatus::*;
        assert!(Waiting.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(!Waiting.can_transition_to(Ended));
        assert!(!Active.can_transition_to(Waiting));
        assert!(!Ended.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_room_transition_stamps_times() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut room = Room::new(
            JoinCode::generate(&mut rng),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            4,
        );
        assert_eq!(room.status, RoomStatus::Waiting);
        room.transition(RoomStatus::Active).unwrap();
        assert!(room.started_at.is_some());
        assert!(room.ended_at.is_none());

        let err = room.transition(RoomStatus::Active).unwrap_err();
        assert!(matches!(
            err,
            LobbyError::InvalidTransition {
                from: RoomStatus::Active,
                to: RoomStatus::Active
            }
        ));

        room.transition(RoomStatus::Ended).unwrap();
        assert!(room.ended_at.is_some());
        assert_eq!(room.status, RoomStatus::Ended);
    }
}
