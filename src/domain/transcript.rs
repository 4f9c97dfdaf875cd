use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeRole {
    User,
    Assistant,
}

/// One entry in the append-only session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub role: ExchangeRole,
    pub content: String,
    /// The DAX that produced an assistant answer, when there was one.
    pub dax: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn user(content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ExchangeRole::User,
            content: content.to_string(),
            dax: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: &str, dax: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ExchangeRole::Assistant,
            content: content.to_string(),
            dax,
            created_at: Utc::now(),
        }
    }
}
