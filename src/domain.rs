//! Domain models: topics, exercises, grades, users and per-chat session rows.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type TopicId = i64;
pub type ExerciseId = i64;
pub type ChatId = i64;

/// Which pool a topic belongs to. Every exercise draws one topic from each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicType {
  Grammar,
  Vocabulary,
}

impl TopicType {
  pub const ALL: [TopicType; 2] = [TopicType::Grammar, TopicType::Vocabulary];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Grammar => "grammar",
      Self::Vocabulary => "vocabulary",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "grammar" => Some(Self::Grammar),
      "vocabulary" => Some(Self::Vocabulary),
      _ => None,
    }
  }
}

impl fmt::Display for TopicType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Catalog entry. Immutable once seeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub id: TopicId,
  #[serde(rename = "type")]
  pub topic_type: TopicType,
  pub language: String,
  pub name: String,
  /// Human label, e.g. "A1".
  pub level: String,
  pub level_number: i64,
}

/// A topic as it is about to be seeded (no id yet).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
  #[serde(rename = "type")]
  pub topic_type: TopicType,
  pub language: String,
  pub name: String,
  pub level: String,
  pub level_number: i64,
}

/// Score in 1..=5 assigned by the language backend for one topic of one exercise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Grade(u8);

impl Grade {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn new(value: i64) -> Option<Self> {
    if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
      Some(Self(value as u8))
    } else {
      None
    }
  }

  pub fn value(self) -> u8 {
    self.0
  }

  /// Grades of 4 and 5 count as mastery when weighting topic selection.
  pub fn is_strong(self) -> bool {
    self.0 >= 4
  }
}

impl<'de> Deserialize<'de> for Grade {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Grade::new(raw).ok_or_else(|| serde::de::Error::custom(format!("grade {raw} is outside 1..=5")))
  }
}

impl fmt::Display for Grade {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedTopic {
  pub topic: Topic,
  #[serde(default)]
  pub grade: Option<Grade>,
}

/// A topic plus every grade the learner ever got on it, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopicWithGrades {
  pub topic: Topic,
  pub grades: Vec<Grade>,
}

/// Lifecycle of a single exercise.
///
/// `Created` and `AwaitingTranslation` are open; `Evaluated` and `Abandoned` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStatus {
  Created,
  AwaitingTranslation,
  Evaluated,
  /// Superseded by a newer exercise in the same chat before it was answered.
  Abandoned,
}

impl ExerciseStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::AwaitingTranslation => "awaiting_translation",
      Self::Evaluated => "evaluated",
      Self::Abandoned => "abandoned",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "created" => Some(Self::Created),
      "awaiting_translation" => Some(Self::AwaitingTranslation),
      "evaluated" => Some(Self::Evaluated),
      "abandoned" => Some(Self::Abandoned),
      _ => None,
    }
  }

  pub fn is_open(&self) -> bool {
    matches!(self, Self::Created | Self::AwaitingTranslation)
  }
}

impl fmt::Display for ExerciseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Exercise {
  pub id: ExerciseId,
  pub user_id: UserId,
  pub native_language: String,
  pub studied_language: String,
  pub sentence: String,
  pub status: ExerciseStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub translation: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub correct_translation: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  pub grammar_topics: Vec<GradedTopic>,
  pub vocabulary_topics: Vec<GradedTopic>,
}

impl Exercise {
  pub fn topics(&self) -> impl Iterator<Item = &GradedTopic> {
    self.grammar_topics.iter().chain(self.vocabulary_topics.iter())
  }

  pub fn is_graded(&self) -> bool {
    self.topics().any(|t| t.grade.is_some())
  }
}

/// Insert payload for a freshly generated exercise.
#[derive(Clone, Debug)]
pub struct NewExercise {
  pub user_id: UserId,
  pub native_language: String,
  pub studied_language: String,
  pub sentence: String,
  pub grammar_topic: Topic,
  pub vocabulary_topic: Topic,
}

/// Outcome of grading one translation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Evaluation {
  pub exercise_id: ExerciseId,
  pub translation: String,
  pub correct_translation: String,
  pub explanation: String,
  pub graded_grammar_topics: Vec<GradedTopic>,
  pub graded_vocabulary_topics: Vec<GradedTopic>,
}

impl Evaluation {
  /// Rebuild from a stored, already evaluated exercise.
  pub fn from_exercise(exercise: &Exercise) -> Option<Self> {
    if exercise.status != ExerciseStatus::Evaluated {
      return None;
    }
    Some(Self {
      exercise_id: exercise.id,
      translation: exercise.translation.clone().unwrap_or_default(),
      correct_translation: exercise.correct_translation.clone().unwrap_or_default(),
      explanation: exercise.explanation.clone().unwrap_or_default(),
      graded_grammar_topics: exercise.grammar_topics.clone(),
      graded_vocabulary_topics: exercise.vocabulary_topics.clone(),
    })
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: UserId,
  pub username: String,
  #[serde(default)]
  pub native_language: Option<String>,
  #[serde(default)]
  pub studied_language: Option<String>,
  #[serde(default)]
  pub level_number: Option<i64>,
}

/// Upsert payload for users. `None` fields keep whatever is stored.
#[derive(Clone, Debug, Default)]
pub struct UserProfile {
  pub username: String,
  pub native_language: Option<String>,
  pub studied_language: Option<String>,
  pub level_number: Option<i64>,
}

impl UserProfile {
  pub fn named(username: impl Into<String>) -> Self {
    Self { username: username.into(), ..Default::default() }
  }
}

/// One row per chat; `exercise_id` is the exercise waiting for a translation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
  pub chat_id: ChatId,
  pub exercise_id: Option<ExerciseId>,
}

/// Per-topic aggregate for progress reports.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopicProgress {
  pub topic: Topic,
  pub attempts: i64,
  pub strong_count: i64,
  pub mean_grade: f64,
}
