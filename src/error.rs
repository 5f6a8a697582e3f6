//! Engine error taxonomy.

use thiserror::Error;

use crate::backend::BackendError;
use crate::domain::{ExerciseId, ExerciseStatus, TopicType, UserId};

/// Coarse class of an [`EngineError`], used to decide how callers react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  /// Catalog not seeded for the requested language and level.
  Configuration,
  /// Language backend failed or answered garbage. Retryable.
  Backend,
  /// Caller asked for something that cannot happen (unknown or closed exercise).
  Integrity,
  Storage,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("no {topic_type} topics for {language} level {level_number}")]
  EmptyTopicPool { topic_type: TopicType, language: String, level_number: i64 },
  #[error("language backend failed: {0}")]
  Backend(#[from] BackendError),
  #[error("exercise {0} does not exist")]
  ExerciseNotFound(ExerciseId),
  #[error("exercise {id} is {status} and cannot be evaluated")]
  ExerciseClosed { id: ExerciseId, status: ExerciseStatus },
  #[error("user {0} does not exist")]
  UserNotFound(UserId),
  #[error("translation is empty")]
  EmptyTranslation,
  #[error("storage error: {0}")]
  Storage(#[from] sqlx::Error),
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::EmptyTopicPool { .. } => ErrorKind::Configuration,
      Self::Backend(_) => ErrorKind::Backend,
      Self::ExerciseNotFound(_) | Self::ExerciseClosed { .. } | Self::UserNotFound(_) | Self::EmptyTranslation => {
        ErrorKind::Integrity
      }
      Self::Storage(_) => ErrorKind::Storage,
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self.kind(), ErrorKind::Backend)
  }
}
