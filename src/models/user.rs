use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub phone: String,
    pub role: Role,
    pub name: String,
    pub family: String,
    pub bio: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A user holds exactly one role for its whole lifetime. Schedulers publish
/// appointment slots, bookers claim them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Scheduler,
    Booker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Scheduler => "scheduler",
            Role::Booker => "booker",
        }
    }

    /// Strict by intent: an unrecognised role string must never fall back to
    /// some default role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduler" => Some(Role::Scheduler),
            "booker" => Some(Role::Booker),
            _ => None,
        }
    }
}

/// Accepts an optional leading `+` followed by 7 to 15 digits, no separators.
/// Returns the trimmed number or None when the format is off.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.len() < 7 || digits.len() > 15 {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.to_string())
}
