//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and clients independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Exercise, TopicProgress, UserId};
use crate::transport::{ChatEvent, OutboundMessage};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Start,
    Text { text: String },
    Choice { option: String },
}

impl ClientWsMessage {
    /// `None` for keep-alive traffic that never reaches the chat controller.
    pub fn into_event(self) -> Option<ChatEvent> {
        match self {
            Self::Ping => None,
            Self::Start => Some(ChatEvent::Start),
            Self::Text { text } => Some(ChatEvent::Text { text }),
            Self::Choice { option } => Some(ChatEvent::Choice { option }),
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Error { message: String },
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    pub username: Option<String>,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ChatEventIn {
    pub username: Option<String>,
    pub event: ChatEvent,
}

#[derive(Debug, Serialize)]
pub struct ChatEventOut {
    pub messages: Vec<OutboundMessage>,
}

#[derive(Debug, Serialize)]
pub struct LevelOut {
    pub label: String,
    pub level_number: i64,
}

#[derive(Debug, Serialize)]
pub struct LanguageOut {
    pub language: String,
    pub levels: Vec<LevelOut>,
}

#[derive(Debug, Serialize)]
pub struct CatalogOut {
    pub languages: Vec<LanguageOut>,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub user_id: UserId,
    pub topics: Vec<TopicProgress>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentOut {
    pub user_id: UserId,
    pub exercises: Vec<Exercise>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub backend_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub code: &'static str,
}

/// Transport-level username when the client did not send one.
pub fn default_username(chat_id: i64) -> String {
    format!("chat-{chat_id}")
}
