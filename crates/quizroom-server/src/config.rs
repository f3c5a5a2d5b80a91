use quizroom_common::catalog::QuizType;

/// Room policy knobs, filled from the command line.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    pub default_capacity: u16,
    pub max_capacity: u16,
    pub min_participants: u16,
    /// How many join codes to draw before giving up on room creation.
    pub code_attempts: u32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_capacity: 8,
            max_capacity: 16,
            min_participants: 2,
            code_attempts: 16,
        }
    }
}

impl LobbyConfig {
    pub fn capacity_for(&self, quiz_type: &QuizType) -> u16 {
        let floor = self.min_participants.max(1);
        let ceiling = self.max_capacity.max(floor);
        quiz_type
            .max_players
            .unwrap_or(self.default_capacity)
            .clamp(floor, ceiling)
    }
}
