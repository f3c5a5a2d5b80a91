use uuid::Uuid;

use quizroom_common::catalog::{Category, QuizType};

fn quiz_type(
    n: u128,
    name: &str,
    description: &str,
    is_multiplayer: bool,
    max_players: Option<u16>,
    time_limit: u32,
) -> QuizType {
    QuizType {
        id: Uuid::from_u128(0x5155_0000_0000_0000_0000_0000_0000_0000 + n),
        name: name.into(),
        description: description.into(),
        is_multiplayer,
        max_players,
        time_limit,
    }
}

fn category(n: u128, name: &str, description: &str, icon: &str) -> Category {
    Category {
        id: Uuid::from_u128(0x4341_0000_0000_0000_0000_0000_0000_0000 + n),
        name: name.into(),
        description: description.into(),
        icon: Some(icon.into()),
    }
}

/// Quiz types seeded into a fresh store. Ids are stable across restarts.
pub fn default_quiz_types() -> Vec<QuizType> {
    vec![
        quiz_type(1, "Classic Trivia", "Answer at your own pace against friends", true, Some(8), 30),
        quiz_type(2, "Rapid Fire", "Short timer, fast answers", true, Some(6), 10),
        quiz_type(3, "Team Battle", "Big rooms, loud rounds", true, None, 20),
        quiz_type(4, "3D Card Flip", "Flip the card, beat the clock", true, Some(4), 15),
        quiz_type(5, "Solo Challenge", "Just you and the questions", false, Some(1), 30),
    ]
}

pub fn default_categories() -> Vec<Category> {
    vec![
        category(1, "General Knowledge", "A bit of everything", "🧠"),
        category(2, "Science", "Physics, chemistry and biology", "🔬"),
        category(3, "History", "From antiquity to yesterday", "🏛️"),
        category(4, "Geography", "Capitals, rivers, mountains", "🌍"),
        category(5, "Sports", "Scores, records and legends", "⚽"),
        category(6, "Movies", "Blockbusters and cult classics", "🎬"),
    ]
}
