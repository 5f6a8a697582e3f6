//! Shared fixtures: a scripted language backend, a seeded in-memory store and a
//! deterministic engine.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use lalang_backend::backend::{BackendError, LanguageBackend, TranslationReview};
use lalang_backend::config::LearnerDefaults;
use lalang_backend::db::Store;
use lalang_backend::domain::{Exercise, Grade, NewTopic, Topic, TopicType, User, UserProfile};
use lalang_backend::engine::ExerciseEngine;

/// Backend with canned answers. Grades apply to every topic of the given type.
pub struct ScriptedBackend {
    pub sentence: Mutex<String>,
    pub correct_translation: Mutex<String>,
    pub grammar_grade: Mutex<Grade>,
    pub vocabulary_grade: Mutex<Grade>,
    pub fail_generation: AtomicBool,
    pub fail_evaluation: AtomicBool,
    pub generations: AtomicUsize,
    pub evaluations: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            sentence: Mutex::new("Я устал".into()),
            correct_translation: Mutex::new("Ich bin müde".into()),
            grammar_grade: Mutex::new(grade(4)),
            vocabulary_grade: Mutex::new(grade(2)),
            fail_generation: AtomicBool::new(false),
            fail_evaluation: AtomicBool::new(false),
            generations: AtomicUsize::new(0),
            evaluations: AtomicUsize::new(0),
        }
    }
}

impl ScriptedBackend {
    pub fn set_grades(&self, grammar: i64, vocabulary: i64) {
        *self.grammar_grade.lock() = grade(grammar);
        *self.vocabulary_grade.lock() = grade(vocabulary);
    }
}

#[async_trait]
impl LanguageBackend for ScriptedBackend {
    async fn generate_sentence(
        &self,
        _native_language: &str,
        _studied_language: &str,
        _grammar_topic: &Topic,
        _vocabulary_topic: &Topic,
    ) -> Result<String, BackendError> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(BackendError::InvalidResponse("scripted generation failure".into()));
        }
        Ok(self.sentence.lock().clone())
    }

    async fn evaluate_translation(
        &self,
        exercise: &Exercise,
        _translation: &str,
    ) -> Result<TranslationReview, BackendError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.fail_evaluation.load(Ordering::SeqCst) {
            return Err(BackendError::InvalidResponse("scripted evaluation failure".into()));
        }
        let grammar = *self.grammar_grade.lock();
        let vocabulary = *self.vocabulary_grade.lock();
        Ok(TranslationReview {
            correct_translation: self.correct_translation.lock().clone(),
            grammar_grades: exercise.grammar_topics.iter().map(|t| (t.topic.id, grammar)).collect::<BTreeMap<_, _>>(),
            vocabulary_grades: exercise.vocabulary_topics.iter().map(|t| (t.topic.id, vocabulary)).collect(),
            explanation: "Good attempt.".into(),
        })
    }
}

pub fn grade(value: i64) -> Grade {
    Grade::new(value).expect("grade in range")
}

pub fn defaults() -> LearnerDefaults {
    LearnerDefaults { native_language: "Russian".into(), studied_language: "German".into(), level_number: 3 }
}

/// One grammar and one vocabulary topic for German level 3 (B1).
pub fn b1_topics() -> Vec<NewTopic> {
    vec![
        NewTopic {
            topic_type: TopicType::Grammar,
            language: "German".into(),
            name: "Perfekt".into(),
            level: "B1".into(),
            level_number: 3,
        },
        NewTopic {
            topic_type: TopicType::Vocabulary,
            language: "German".into(),
            name: "Feelings".into(),
            level: "B1".into(),
            level_number: 3,
        },
    ]
}

pub async fn seeded_store() -> Store {
    let store = Store::in_memory().await.expect("in-memory store");
    store.save_topics(&b1_topics()).await.expect("seed topics");
    store
}

pub fn engine(store: Store, backend: Arc<ScriptedBackend>) -> Arc<ExerciseEngine> {
    Arc::new(ExerciseEngine::with_rng(store, backend, defaults(), ChaCha8Rng::seed_from_u64(42)))
}

pub async fn learner(store: &Store, username: &str) -> User {
    store
        .upsert_user(&UserProfile {
            username: username.into(),
            native_language: Some("Russian".into()),
            studied_language: Some("German".into()),
            level_number: Some(3),
        })
        .await
        .expect("user")
}
