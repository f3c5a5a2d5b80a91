use std::fmt::Write;

use quizroom_common::catalog::{find_category, find_quiz_type, Category, QuizType};
use quizroom_common::error::ErrorCode;
use quizroom_common::participant::ParticipantView;
use quizroom_common::protocol::{ClientMessage, ServerMessage};
use quizroom_common::room::{JoinCode, RoomId, RoomStatus, RoomView, UserId};

/// What the user asked for at startup.
#[derive(Debug, Clone)]
pub enum Intent {
    Create { quiz_type: String, category: String },
    Join { code: String },
}

#[derive(Debug, Clone)]
pub enum Phase {
    Idle,
    /// Waiting for the catalogue to map names to ids.
    Resolving {
        quiz_type: String,
        category: String,
        quiz_types: Option<Vec<QuizType>>,
        categories: Option<Vec<Category>>,
    },
    /// Create (`code: None`) or join sent, no room yet. Only the reply
    /// to this request is adopted.
    Entering { code: Option<JoinCode> },
    InLobby {
        room: RoomView,
        participants: Vec<ParticipantView>,
    },
    InGame {
        room_id: RoomId,
    },
}

/// Client-side lobby state. Every server event is folded in here and
/// answered with the requests it implies.
#[derive(Debug)]
pub struct LobbyView {
    pub user_id: UserId,
    pub min_participants: u16,
    pub phase: Phase,
    notices: Vec<String>,
}

impl LobbyView {
    pub fn new(user_id: UserId, min_participants: u16) -> Self {
        Self {
            user_id,
            min_participants,
            phase: Phase::Idle,
            notices: Vec::new(),
        }
    }

    pub fn begin(&mut self, intent: Intent) -> Vec<ClientMessage> {
        match intent {
            Intent::Create {
                quiz_type,
                category,
            } => {
                self.phase = Phase::Resolving {
                    quiz_type,
                    category,
                    quiz_types: None,
                    categories: None,
                };
                vec![ClientMessage::ListQuizTypes, ClientMessage::ListCategories]
            }
            Intent::Join { code } => self.join(&code),
        }
    }

    /// Leaves whatever room is shown and joins another by code.
    pub fn join(&mut self, code: &str) -> Vec<ClientMessage> {
        let code = match JoinCode::parse(code) {
            Ok(code) => code,
            Err(e) => {
                self.notices.push(e.to_string());
                return Vec::new();
            }
        };
        let mut out = self.leave();
        out.push(ClientMessage::JoinRoom {
            code: code.to_string(),
        });
        self.phase = Phase::Entering { code: Some(code) };
        out
    }

    /// Drops back to idle, releasing the room subscription if any.
    pub fn leave(&mut self) -> Vec<ClientMessage> {
        let out = match self.current_room() {
            Some(room_id) => vec![ClientMessage::Unsubscribe { room_id }],
            None => Vec::new(),
        };
        self.phase = Phase::Idle;
        out
    }

    pub fn current_room(&self) -> Option<RoomId> {
        match &self.phase {
            Phase::InLobby { room, .. } => Some(room.room.id),
            _ => None,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(&self.phase, Phase::InLobby { room, .. } if room.room.host_id == self.user_id)
    }

    pub fn can_start(&self) -> bool {
        match &self.phase {
            Phase::InLobby { room, participants } => {
                room.room.host_id == self.user_id
                    && room.room.status == RoomStatus::Waiting
                    && participants.len() >= self.min_participants as usize
            }
            _ => false,
        }
    }

    pub fn start(&mut self) -> Option<ClientMessage> {
        if !self.can_start() {
            let reason = if self.is_host() {
                format!("Need at least {} players to start", self.min_participants)
            } else {
                "Waiting for host to start the game...".to_string()
            };
            self.notices.push(reason);
            return None;
        }
        self.current_room()
            .map(|room_id| ClientMessage::StartRoom { room_id })
    }

    pub fn refresh(&self) -> Option<ClientMessage> {
        self.current_room()
            .map(|room_id| ClientMessage::ListParticipants { room_id })
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn handle_server(&mut self, msg: ServerMessage) -> Vec<ClientMessage> {
        match msg {
            ServerMessage::QuizTypes { quiz_types } => {
                if let Phase::Resolving { quiz_types: slot, .. } = &mut self.phase {
                    *slot = Some(quiz_types);
                }
                self.try_create()
            }
            ServerMessage::Categories { categories } => {
                if let Phase::Resolving { categories: slot, .. } = &mut self.phase {
                    *slot = Some(categories);
                }
                self.try_create()
            }

            ServerMessage::RoomCreated { room } => self.enter(room, true),
            ServerMessage::RoomJoined { room } => self.enter(room, false),

            ServerMessage::Room { room: fresh } => {
                let room_id = fresh.room.id;
                let Phase::InLobby { room, .. } = &mut self.phase else {
                    return Vec::new();
                };
                if room.room.id != room_id {
                    return Vec::new();
                }
                // A snapshot can be the first to show a transition.
                let status = fresh.room.status;
                match status {
                    RoomStatus::Waiting => {
                        *room = fresh;
                        Vec::new()
                    }
                    status => self.handle_server(ServerMessage::RoomStatusChanged {
                        room_id,
                        status,
                    }),
                }
            }

            // Fetch after subscribing so no change can slip between the two.
            ServerMessage::Subscribed { room_id } => {
                if self.current_room() == Some(room_id) {
                    vec![
                        ClientMessage::ListParticipants { room_id },
                        ClientMessage::GetRoom { room_id },
                    ]
                } else {
                    Vec::new()
                }
            }

            ServerMessage::ParticipantsChanged { room_id } => {
                if self.current_room() == Some(room_id) {
                    vec![ClientMessage::ListParticipants { room_id }]
                } else {
                    Vec::new()
                }
            }

            ServerMessage::Participants {
                room_id,
                participants: fresh,
            } => {
                if let Phase::InLobby { room, participants } = &mut self.phase {
                    if room.room.id == room_id {
                        room.participant_count = fresh.len() as u16;
                        *participants = fresh;
                    }
                }
                Vec::new()
            }

            ServerMessage::RoomStatusChanged { room_id, status } => {
                if self.current_room() != Some(room_id) {
                    return Vec::new();
                }
                match status {
                    RoomStatus::Active => {
                        self.phase = Phase::InGame { room_id };
                        vec![ClientMessage::Unsubscribe { room_id }]
                    }
                    RoomStatus::Ended => {
                        self.notices.push("The room was closed".into());
                        self.leave()
                    }
                    RoomStatus::Waiting => Vec::new(),
                }
            }

            ServerMessage::Error { code, message } => {
                self.notices.push(message);
                if matches!(self.phase, Phase::Entering { .. }) && ends_entry(code) {
                    self.phase = Phase::Idle;
                }
                Vec::new()
            }

            ServerMessage::HandshakeError { reason } => {
                self.notices.push(reason);
                self.phase = Phase::Idle;
                Vec::new()
            }

            ServerMessage::Welcome { .. }
            | ServerMessage::Unsubscribed { .. }
            | ServerMessage::Pong => Vec::new(),
        }
    }

    fn enter(&mut self, room: RoomView, is_created: bool) -> Vec<ClientMessage> {
        // A late reply for a lobby we already walked away from.
        let expected = match &self.phase {
            Phase::Entering { code: None } => is_created,
            Phase::Entering { code: Some(code) } => {
                !is_created && *code == room.room.code
            }
            _ => false,
        };
        if !expected {
            tracing::debug!("Ignoring stale reply for room {}", room.room.code);
            return Vec::new();
        }
        let room_id = room.room.id;
        self.notices.push(format!(
            "Room {} ({} / {}), share this code to invite players",
            room.room.code, room.quiz_type_name, room.category_name
        ));
        self.phase = Phase::InLobby {
            room,
            participants: Vec::new(),
        };
        vec![ClientMessage::Subscribe { room_id }]
    }

    fn try_create(&mut self) -> Vec<ClientMessage> {
        let Phase::Resolving {
            quiz_type,
            category,
            quiz_types: Some(quiz_types),
            categories: Some(categories),
        } = &self.phase
        else {
            return Vec::new();
        };

        let resolved = (
            find_quiz_type(quiz_types, quiz_type),
            find_category(categories, category),
        );
        match resolved {
            (Some(t), Some(c)) => {
                let msg = ClientMessage::CreateRoom {
                    quiz_type_id: t.id,
                    category_id: c.id,
                };
                self.phase = Phase::Entering { code: None };
                vec![msg]
            }
            (None, _) => {
                let names: Vec<_> = quiz_types.iter().map(|t| t.name.as_str()).collect();
                let notice = format!("Unknown quiz type {:?} (have: {})", quiz_type, names.join(", "));
                self.notices.push(notice);
                self.phase = Phase::Idle;
                Vec::new()
            }
            (_, None) => {
                let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
                let notice = format!("Unknown category {:?} (have: {})", category, names.join(", "));
                self.notices.push(notice);
                self.phase = Phase::Idle;
                Vec::new()
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.phase {
            Phase::Idle => out.push_str("Not in a room. Use `join <CODE>` or `quit`.\n"),
            Phase::Resolving { .. } => out.push_str("Loading game modes...\n"),
            Phase::Entering { code: None } => out.push_str("Setting up game room...\n"),
            Phase::Entering { code: Some(code) } => {
                let _ = writeln!(out, "Joining room {}...", code);
            }
            Phase::InGame { room_id } => {
                let _ = writeln!(out, "Game {} started!", room_id);
            }
            Phase::InLobby { room, participants } => {
                let _ = writeln!(
                    out,
                    "== {} {} / {} ==",
                    room.category_icon.as_deref().unwrap_or(""),
                    room.quiz_type_name,
                    room.category_name
                );
                let _ = writeln!(out, "Room code: {}", room.room.code);
                let _ = writeln!(out, "Host: {}", room.host_display_name);
                let _ = writeln!(
                    out,
                    "Players ({}/{}):",
                    participants.len(),
                    room.room.capacity
                );
                for p in participants {
                    let crown = if p.participant.user_id == room.room.host_id {
                        " [host]"
                    } else {
                        ""
                    };
                    let _ = writeln!(
                        out,
                        "  ({}) {} @{}{}",
                        p.initial(),
                        p.display_name,
                        p.username,
                        crown
                    );
                }
                if participants.len() < room.room.capacity as usize {
                    out.push_str("  Waiting for players...\n");
                }
                if self.can_start() {
                    out.push_str("Type `start` to begin.\n");
                } else if self.is_host() {
                    let _ = writeln!(out, "Need at least {} players to start", self.min_participants);
                } else {
                    out.push_str("Waiting for host to start the game...\n");
                }
            }
        }
        out
    }
}

fn ends_entry(code: ErrorCode) -> bool {
    !matches!(code, ErrorCode::InvalidAction)
}
