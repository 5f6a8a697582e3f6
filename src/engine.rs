//! Exercise lifecycle: create (select topics, generate sentence, persist) and
//! evaluate (grade via the backend, persist once).
//!
//! Lifecycle: `created -> awaiting_translation -> evaluated`. The middle step is
//! owned by chat sessions (see `session.rs`); evaluation accepts either open state.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument, warn};

use crate::backend::LanguageBackend;
use crate::config::LearnerDefaults;
use crate::db::exercises::EvaluationWrite;
use crate::db::Store;
use crate::domain::{
  Evaluation, Exercise, ExerciseId, GradedTopic, NewExercise, Topic, TopicType, User, UserId,
};
use crate::error::EngineError;
use crate::selector::choose_topic;
use crate::util::trunc_for_log;

/// Languages and level an exercise is built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LearnerProfile {
  pub native_language: String,
  pub studied_language: String,
  pub level_number: i64,
}

pub struct ExerciseEngine {
  store: Store,
  backend: Arc<dyn LanguageBackend>,
  defaults: LearnerDefaults,
  rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ExerciseEngine {
  pub fn new(store: Store, backend: Arc<dyn LanguageBackend>, defaults: LearnerDefaults) -> Self {
    Self::with_rng(store, backend, defaults, ChaCha8Rng::from_entropy())
  }

  /// Same as [`ExerciseEngine::new`] with an explicit random source (seeded in tests).
  pub fn with_rng(
    store: Store,
    backend: Arc<dyn LanguageBackend>,
    defaults: LearnerDefaults,
    rng: impl RngCore + Send + 'static,
  ) -> Self {
    Self { store, backend, defaults, rng: Mutex::new(Box::new(rng)) }
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  /// Fill whatever the user has not chosen yet from the configured defaults.
  pub fn resolve_profile(&self, user: &User) -> LearnerProfile {
    LearnerProfile {
      native_language: user.native_language.clone().unwrap_or_else(|| self.defaults.native_language.clone()),
      studied_language: user.studied_language.clone().unwrap_or_else(|| self.defaults.studied_language.clone()),
      level_number: user.level_number.unwrap_or(self.defaults.level_number),
    }
  }

  pub async fn create_for_user_id(&self, user_id: UserId) -> Result<Exercise, EngineError> {
    let user = self.store.get_user(user_id).await?.ok_or(EngineError::UserNotFound(user_id))?;
    self.create(&user).await
  }

  /// Build a new exercise for `user`: one grammar and one vocabulary topic chosen
  /// from the user's graded history, a generated sentence, persisted as `created`.
  #[instrument(level = "info", skip(self, user), fields(user_id = user.id))]
  pub async fn create(&self, user: &User) -> Result<Exercise, EngineError> {
    let profile = self.resolve_profile(user);
    let grammar_topic = self.select_topic(user.id, TopicType::Grammar, &profile).await?;
    let vocabulary_topic = self.select_topic(user.id, TopicType::Vocabulary, &profile).await?;

    let sentence = self
      .backend
      .generate_sentence(&profile.native_language, &profile.studied_language, &grammar_topic, &vocabulary_topic)
      .await
      .map_err(|e| {
        warn!(target: "exercise", user_id = user.id, error = %e, "Sentence generation failed");
        EngineError::Backend(e)
      })?;

    let exercise = self
      .store
      .insert_exercise(&NewExercise {
        user_id: user.id,
        native_language: profile.native_language,
        studied_language: profile.studied_language,
        sentence,
        grammar_topic,
        vocabulary_topic,
      })
      .await?;

    info!(
      target: "exercise",
      exercise_id = exercise.id,
      user_id = user.id,
      grammar = %exercise.grammar_topics[0].topic.name,
      vocabulary = %exercise.vocabulary_topics[0].topic.name,
      sentence_preview = %trunc_for_log(&exercise.sentence, 40),
      "Exercise created"
    );
    Ok(exercise)
  }

  async fn select_topic(
    &self,
    user_id: UserId,
    topic_type: TopicType,
    profile: &LearnerProfile,
  ) -> Result<Topic, EngineError> {
    let pool = self
      .store
      .get_graded_topics(user_id, topic_type, &profile.studied_language, profile.level_number)
      .await?;

    // Guard must not live across an await.
    let chosen = {
      let mut rng = self.rng.lock();
      choose_topic(&pool, &mut **rng).map(|t| t.topic.clone())
    };

    chosen.ok_or_else(|| EngineError::EmptyTopicPool {
      topic_type,
      language: profile.studied_language.clone(),
      level_number: profile.level_number,
    })
  }

  /// Grade `translation` for an open exercise and persist the result exactly once.
  ///
  /// Backend failures leave the exercise untouched so the learner can retry.
  #[instrument(level = "info", skip(self, translation), fields(translation_len = translation.len()))]
  pub async fn evaluate(&self, exercise_id: ExerciseId, translation: &str) -> Result<Evaluation, EngineError> {
    let translation = translation.trim();
    if translation.is_empty() {
      return Err(EngineError::EmptyTranslation);
    }

    let exercise = self.store.get_exercise(exercise_id).await?.ok_or(EngineError::ExerciseNotFound(exercise_id))?;
    if !exercise.status.is_open() {
      return Err(EngineError::ExerciseClosed { id: exercise_id, status: exercise.status });
    }

    let review = self.backend.evaluate_translation(&exercise, translation).await.map_err(|e| {
      warn!(target: "exercise", exercise_id, error = %e, "Translation evaluation failed");
      EngineError::Backend(e)
    })?;
    review.validate_for(&exercise)?;

    let grades: Vec<_> = exercise
      .topics()
      .filter_map(|t| review.grade_for(t.topic.id).map(|g| (t.topic.id, g)))
      .collect();

    let write = self
      .store
      .record_evaluation(exercise_id, translation, &review.correct_translation, &review.explanation, &grades)
      .await?;

    if write == EvaluationWrite::AlreadyClosed {
      // Another evaluation won the race; its record stands.
      let stored = self.store.get_exercise(exercise_id).await?.ok_or(EngineError::ExerciseNotFound(exercise_id))?;
      info!(target: "exercise", exercise_id, status = %stored.status, "Evaluation already recorded; keeping stored result");
      return Evaluation::from_exercise(&stored)
        .ok_or(EngineError::ExerciseClosed { id: exercise_id, status: stored.status });
    }

    let graded = |topics: &[GradedTopic]| -> Vec<GradedTopic> {
      topics
        .iter()
        .map(|t| GradedTopic { topic: t.topic.clone(), grade: review.grade_for(t.topic.id) })
        .collect()
    };
    let evaluation = Evaluation {
      exercise_id,
      translation: translation.to_string(),
      correct_translation: review.correct_translation.clone(),
      explanation: review.explanation.clone(),
      graded_grammar_topics: graded(&exercise.grammar_topics),
      graded_vocabulary_topics: graded(&exercise.vocabulary_topics),
    };

    info!(
      target: "exercise",
      exercise_id,
      grades = ?grades.iter().map(|(id, g)| (*id, g.value())).collect::<Vec<_>>(),
      "Exercise evaluated"
    );
    Ok(evaluation)
  }
}
