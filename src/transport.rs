//! Chat transport seam. The engine only ever sends text or a text with choices and
//! receives already-extracted events; delivery details live behind [`ChatTransport`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ChatId;

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("chat {0} is no longer reachable")]
  Closed(ChatId),
  #[error("delivery failed: {0}")]
  Delivery(String),
}

/// One button: what the learner sees and what comes back when it is picked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
  pub label: String,
  pub value: String,
}

impl ChoiceOption {
  pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
    Self { label: label.into(), value: value.into() }
  }
}

/// Inbound event, already stripped of transport specifics.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
  Start,
  Text { text: String },
  Choice { option: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
  async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError>;
  async fn send_choice(&self, chat_id: ChatId, text: &str, options: &[ChoiceOption]) -> Result<(), TransportError>;
}

/// Outbound message as delivered to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
  Text {
    #[serde(rename = "chatId")]
    chat_id: ChatId,
    text: String,
  },
  Choice {
    #[serde(rename = "chatId")]
    chat_id: ChatId,
    text: String,
    options: Vec<ChoiceOption>,
  },
}

/// Collects outbound messages so the caller can flush them after handling an event.
/// Backs the WebSocket and HTTP surfaces; also handy in tests.
#[derive(Default)]
pub struct BufferedTransport {
  outbox: Mutex<Vec<OutboundMessage>>,
}

impl BufferedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn drain(&self) -> Vec<OutboundMessage> {
    std::mem::take(&mut *self.outbox.lock())
  }
}

#[async_trait]
impl ChatTransport for BufferedTransport {
  async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
    self.outbox.lock().push(OutboundMessage::Text { chat_id, text: text.to_string() });
    Ok(())
  }

  async fn send_choice(&self, chat_id: ChatId, text: &str, options: &[ChoiceOption]) -> Result<(), TransportError> {
    self.outbox.lock().push(OutboundMessage::Choice {
      chat_id,
      text: text.to_string(),
      options: options.to_vec(),
    });
    Ok(())
  }
}
