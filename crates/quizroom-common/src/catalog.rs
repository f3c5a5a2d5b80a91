use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_multiplayer: bool,
    /// Per-type room capacity; the server default applies when unset.
    pub max_players: Option<u16>,
    /// Seconds allowed per question.
    pub time_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

/// Looks a quiz type up by id or case-insensitive name.
pub fn find_quiz_type<'a>(types: &'a [QuizType], key: &str) -> Option<&'a QuizType> {
    let key = key.trim();
    types
        .iter()
        .find(|t| t.id.to_string() == key || t.name.eq_ignore_ascii_case(key))
}

pub fn find_category<'a>(categories: &'a [Category], key: &str) -> Option<&'a Category> {
    let key = key.trim();
    categories
        .iter()
        .find(|c| c.id.to_string() == key || c.name.eq_ignore_ascii_case(key))
}
