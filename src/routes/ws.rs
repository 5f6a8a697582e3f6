//! WebSocket upgrade + message loop. One socket is one chat: each client message is
//! parsed as JSON, handed to the chat controller, and every reply it queued is sent
//! back as its own JSON message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::bot::ChatContext;
use crate::protocol::{default_username, ClientWsMessage, ServerWsMessage, WsQuery};
use crate::state::AppState;
use crate::transport::BufferedTransport;
use crate::util::trunc_for_log;

const LOG_PREVIEW_CHARS: usize = 20;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<WsQuery>,
) -> impl IntoResponse {
  info!(target: "lalang_backend", chat_id = q.chat_id, "WebSocket upgrade requested");
  let ctx = ChatContext {
    chat_id: q.chat_id,
    username: q.username.unwrap_or_else(|| default_username(q.chat_id)),
  };
  ws.on_upgrade(move |socket| handle_ws(socket, state, ctx))
}

fn to_json<T: serde::Serialize>(msg: &T) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

/// Message type plus a short preview of any learner text, for logging.
fn describe(msg: &ClientWsMessage) -> (&'static str, String) {
  match msg {
    ClientWsMessage::Ping => ("ping", String::new()),
    ClientWsMessage::Start => ("start", String::new()),
    ClientWsMessage::Text { text } => ("text", trunc_for_log(text, LOG_PREVIEW_CHARS)),
    ClientWsMessage::Choice { option } => ("choice", trunc_for_log(option, LOG_PREVIEW_CHARS)),
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, ctx: ChatContext) {
  info!(target: "lalang_backend", chat_id = ctx.chat_id, "WebSocket connected");
  let transport = BufferedTransport::new();

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, flush queued replies.
        let outgoing: Vec<String> = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            let (kind, preview) = describe(&incoming);
            debug!(target: "lalang_backend", kind, preview = %preview, "WS received");
            match incoming.into_event() {
              Some(event) => {
                if let Err(e) = state.bot.handle(&transport, &ctx, event).await {
                  error!(target: "lalang_backend", chat_id = ctx.chat_id, error = %e, "Chat handling failed");
                }
                transport.drain().iter().map(to_json).collect()
              }
              None => vec![to_json(&ServerWsMessage::Pong)],
            }
          }
          Err(e) => vec![to_json(&ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) })],
        };

        for out in outgoing {
          if let Err(e) = socket.send(Message::Text(out)).await {
            error!(target: "lalang_backend", error = %e, "WS send error");
            return;
          }
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "lalang_backend", chat_id = ctx.chat_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn learner_text_is_previewed_not_logged_whole() {
    let msg = ClientWsMessage::Text { text: "Ich bin heute nach der Arbeit sehr müde".into() };
    let (kind, preview) = describe(&msg);
    assert_eq!(kind, "text");
    assert_eq!(preview, "Ich bin heute nach d… (39 chars total)");
    assert_eq!(describe(&ClientWsMessage::Ping), ("ping", String::new()));
  }
}
