//! Language backend seam: sentence generation and translation review.
//!
//! Whatever the backend sends back is untrusted. [`parse_review`] turns the raw JSON
//! into a [`TranslationReview`] and checks it against the exercise it belongs to:
//! every topic must be graded exactly once, within 1..=5, and nothing else.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{Exercise, Grade, Topic, TopicId};

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("language backend not configured: {0}")]
  NotConfigured(&'static str),
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("HTTP {status}: {body}")]
  HttpStatus { status: reqwest::StatusCode, body: String },
  #[error("malformed backend response: {0}")]
  InvalidResponse(String),
}

#[async_trait]
pub trait LanguageBackend: Send + Sync {
  /// A sentence in `native_language` exercising both topics, for the learner to
  /// translate into `studied_language`.
  async fn generate_sentence(
    &self,
    native_language: &str,
    studied_language: &str,
    grammar_topic: &Topic,
    vocabulary_topic: &Topic,
  ) -> Result<String, BackendError>;

  /// Grade `translation` of `exercise`. Implementations return an already validated review.
  async fn evaluate_translation(
    &self,
    exercise: &Exercise,
    translation: &str,
  ) -> Result<TranslationReview, BackendError>;
}

/// Validated backend verdict on one translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationReview {
  pub correct_translation: String,
  pub grammar_grades: BTreeMap<TopicId, Grade>,
  pub vocabulary_grades: BTreeMap<TopicId, Grade>,
  pub explanation: String,
}

impl TranslationReview {
  pub fn grade_for(&self, topic_id: TopicId) -> Option<Grade> {
    self.grammar_grades.get(&topic_id).or_else(|| self.vocabulary_grades.get(&topic_id)).copied()
  }

  /// Check the review covers exactly the exercise's topics.
  pub fn validate_for(&self, exercise: &Exercise) -> Result<(), BackendError> {
    check_grades("grammar", &self.grammar_grades, exercise.grammar_topics.iter().map(|t| t.topic.id))?;
    check_grades("vocabulary", &self.vocabulary_grades, exercise.vocabulary_topics.iter().map(|t| t.topic.id))?;
    if self.correct_translation.trim().is_empty() {
      return Err(BackendError::InvalidResponse("correct_translation is empty".into()));
    }
    Ok(())
  }
}

fn check_grades(
  kind: &str,
  grades: &BTreeMap<TopicId, Grade>,
  expected: impl Iterator<Item = TopicId>,
) -> Result<(), BackendError> {
  let expected: Vec<TopicId> = expected.collect();
  for id in &expected {
    if !grades.contains_key(id) {
      return Err(BackendError::InvalidResponse(format!("missing {kind} grade for topic {id}")));
    }
  }
  if let Some(extra) = grades.keys().find(|id| !expected.contains(id)) {
    return Err(BackendError::InvalidResponse(format!("{kind} grade for unknown topic {extra}")));
  }
  Ok(())
}

/// Wire shape requested from the model. Topic ids arrive as JSON object keys.
#[derive(Deserialize)]
struct RawReview {
  correct_translation: String,
  grammar_grades: BTreeMap<String, i64>,
  vocabulary_grades: BTreeMap<String, i64>,
  explanation: String,
}

fn convert_grades(kind: &str, raw: BTreeMap<String, i64>) -> Result<BTreeMap<TopicId, Grade>, BackendError> {
  raw
    .into_iter()
    .map(|(key, value)| -> Result<(TopicId, Grade), BackendError> {
      let id: TopicId = key
        .trim()
        .parse()
        .map_err(|_| BackendError::InvalidResponse(format!("{kind} grade key {key:?} is not a topic id")))?;
      let grade = Grade::new(value)
        .ok_or_else(|| BackendError::InvalidResponse(format!("{kind} grade {value} for topic {id} is outside 1..=5")))?;
      Ok((id, grade))
    })
    .collect()
}

/// Parse and validate a raw JSON review for `exercise`.
pub fn parse_review(raw: &str, exercise: &Exercise) -> Result<TranslationReview, BackendError> {
  let parsed: RawReview = serde_json::from_str(raw.trim())
    .map_err(|e| BackendError::InvalidResponse(format!("JSON parse error: {e}")))?;
  let review = TranslationReview {
    correct_translation: parsed.correct_translation.trim().to_string(),
    grammar_grades: convert_grades("grammar", parsed.grammar_grades)?,
    vocabulary_grades: convert_grades("vocabulary", parsed.vocabulary_grades)?,
    explanation: parsed.explanation.trim().to_string(),
  };
  review.validate_for(exercise)?;
  Ok(review)
}
