//! Per-chat session: a single slot holding the exercise awaiting a translation.
//!
//! `Idle <-> AwaitingTranslation(exercise_id)`. The slot is a durable row updated by
//! atomic upsert, so concurrent messages for one chat cannot lose a write and a
//! restart keeps the pending exercise.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::db::Store;
use crate::domain::{ChatId, Evaluation, Exercise, ExerciseId, ExerciseStatus, User};
use crate::engine::ExerciseEngine;
use crate::error::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  AwaitingTranslation(ExerciseId),
}

#[derive(Clone)]
pub struct ChatSessions {
  engine: Arc<ExerciseEngine>,
}

impl ChatSessions {
  pub fn new(engine: Arc<ExerciseEngine>) -> Self {
    Self { engine }
  }

  pub fn engine(&self) -> &ExerciseEngine {
    &self.engine
  }

  fn store(&self) -> &Store {
    self.engine.store()
  }

  pub async fn state(&self, chat_id: ChatId) -> Result<SessionState, EngineError> {
    let state = self.store().get_chat_state(chat_id).await?;
    Ok(match state.and_then(|s| s.exercise_id) {
      Some(id) => SessionState::AwaitingTranslation(id),
      None => SessionState::Idle,
    })
  }

  /// Create an exercise and make it the chat's pending one. A previously pending
  /// exercise is abandoned. On failure the session is left as it was.
  #[instrument(level = "info", skip(self, user), fields(user_id = user.id))]
  pub async fn request_exercise(&self, chat_id: ChatId, user: &User) -> Result<Exercise, EngineError> {
    let mut exercise = self.engine.create(user).await?;
    let abandoned = self.store().assign_pending_exercise(chat_id, exercise.id).await?;
    if let Some(prev) = abandoned {
      info!(target: "exercise", chat_id, abandoned_exercise_id = prev, exercise_id = exercise.id, "Pending exercise abandoned for a new one");
    }
    exercise.status = ExerciseStatus::AwaitingTranslation;
    Ok(exercise)
  }

  /// Evaluate `text` against the pending exercise. `Ok(None)` when the chat is idle.
  ///
  /// The pending pointer is cleared only after a successful evaluation, so a backend
  /// failure lets the learner retry the same exercise.
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn submit_translation(&self, chat_id: ChatId, text: &str) -> Result<Option<Evaluation>, EngineError> {
    let exercise_id = match self.state(chat_id).await? {
      SessionState::Idle => return Ok(None),
      SessionState::AwaitingTranslation(id) => id,
    };

    match self.engine.evaluate(exercise_id, text).await {
      Ok(evaluation) => {
        self.store().clear_pending_exercise(chat_id, exercise_id).await?;
        Ok(Some(evaluation))
      }
      Err(e @ (EngineError::ExerciseClosed { .. } | EngineError::ExerciseNotFound(_))) => {
        // Pointer is stale; free the slot so the chat is not stuck.
        warn!(target: "exercise", chat_id, exercise_id, error = %e, "Clearing stale pending exercise");
        self.store().clear_pending_exercise(chat_id, exercise_id).await?;
        Err(e)
      }
      Err(e) => Err(e),
    }
  }
}
