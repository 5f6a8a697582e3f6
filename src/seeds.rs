//! Topic catalog seed data: a built-in German starter set plus optional JSON files.
//!
//! JSON files hold an array of `{language, name | topic, level, level_number}`; the
//! topic type comes from which file it is (grammar or vocabulary).

use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::CatalogCfg;
use crate::db::Store;
use crate::domain::{NewTopic, TopicType};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
  #[error("cannot read {path}: {source}")]
  Io { path: String, source: std::io::Error },
  #[error("cannot parse {path}: {source}")]
  Parse { path: String, source: serde_json::Error },
  #[error("storage error: {0}")]
  Storage(#[from] sqlx::Error),
}

#[derive(Deserialize)]
struct TopicRecord {
  language: String,
  #[serde(alias = "topic")]
  name: String,
  level: String,
  level_number: i64,
}

const BUILTIN_GRAMMAR: &[(&str, &str, i64)] = &[
  ("Present tense of regular verbs", "A1", 1),
  ("Personal pronouns in the nominative", "A1", 1),
  ("Definite and indefinite articles", "A1", 1),
  ("Modal verbs", "A2", 2),
  ("Perfect tense with haben and sein", "A2", 2),
  ("Dative case", "A2", 2),
  ("Subordinate clauses with weil and dass", "B1", 3),
  ("Passive voice in the present", "B1", 3),
  ("Relative clauses", "B1", 3),
];

const BUILTIN_VOCABULARY: &[(&str, &str, i64)] = &[
  ("Family", "A1", 1),
  ("Food and drink", "A1", 1),
  ("Numbers and time", "A1", 1),
  ("Travel and transport", "A2", 2),
  ("Health and the body", "A2", 2),
  ("Shopping", "A2", 2),
  ("Work and career", "B1", 3),
  ("Environment", "B1", 3),
  ("Media and news", "B1", 3),
];

/// Minimal catalog so the app can serve the default learner profile out of the box.
pub fn builtin_topics() -> Vec<NewTopic> {
  let build = |topic_type: TopicType, rows: &[(&str, &str, i64)]| -> Vec<NewTopic> {
    rows
      .iter()
      .map(|(name, level, level_number)| NewTopic {
        topic_type,
        language: "German".into(),
        name: (*name).into(),
        level: (*level).into(),
        level_number: *level_number,
      })
      .collect()
  };
  let mut out = build(TopicType::Grammar, BUILTIN_GRAMMAR);
  out.extend(build(TopicType::Vocabulary, BUILTIN_VOCABULARY));
  out
}

/// Parse a JSON topic list and tag every entry with `topic_type`.
pub fn parse_topics(json: &str, topic_type: TopicType) -> Result<Vec<NewTopic>, serde_json::Error> {
  let records: Vec<TopicRecord> = serde_json::from_str(json)?;
  Ok(records
    .into_iter()
    .map(|r| NewTopic {
      topic_type,
      language: r.language,
      name: r.name,
      level: r.level,
      level_number: r.level_number,
    })
    .collect())
}

pub fn load_topics_file(path: &Path, topic_type: TopicType) -> Result<Vec<NewTopic>, SeedError> {
  let display = path.display().to_string();
  let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io { path: display.clone(), source })?;
  parse_topics(&raw, topic_type).map_err(|source| SeedError::Parse { path: display, source })
}

/// Seed built-ins and configured files. Idempotent; returns newly inserted rows.
#[instrument(level = "info", skip_all)]
pub async fn seed_catalog(store: &Store, cfg: &CatalogCfg) -> Result<u64, SeedError> {
  let mut topics = if cfg.skip_builtin { Vec::new() } else { builtin_topics() };
  if let Some(path) = &cfg.grammar_path {
    topics.extend(load_topics_file(path, TopicType::Grammar)?);
  }
  if let Some(path) = &cfg.vocabulary_path {
    topics.extend(load_topics_file(path, TopicType::Vocabulary)?);
  }

  let inserted = store.save_topics(&topics).await?;
  let total = store.count_topics().await?;
  info!(target: "catalog", offered = topics.len(), inserted, total, "Topic catalog seeded");
  Ok(inserted)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_covers_both_types_per_level() {
    let topics = builtin_topics();
    for level in 1..=3 {
      for t in TopicType::ALL {
        assert!(topics.iter().any(|x| x.topic_type == t && x.level_number == level));
      }
    }
  }

  #[test]
  fn parses_name_or_topic_field() {
    let json = r#"[
      {"language":"German","name":"Konjunktiv II","level":"B2","level_number":4},
      {"language":"German","topic":"Genitive","level":"B2","level_number":4}
    ]"#;
    let topics = parse_topics(json, TopicType::Grammar).unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[1].name, "Genitive");
    assert!(topics.iter().all(|t| t.topic_type == TopicType::Grammar));
  }

  #[tokio::test]
  async fn seeding_is_idempotent() {
    let store = Store::in_memory().await.unwrap();
    let cfg = CatalogCfg::default();
    let first = seed_catalog(&store, &cfg).await.unwrap();
    assert_eq!(first as usize, builtin_topics().len());
    assert_eq!(seed_catalog(&store, &cfg).await.unwrap(), 0);
    assert_eq!(store.count_topics().await.unwrap() as usize, builtin_topics().len());
  }

  #[tokio::test]
  async fn missing_file_is_reported() {
    let store = Store::in_memory().await.unwrap();
    let cfg = CatalogCfg { grammar_path: Some("/nonexistent/grammar.json".into()), ..Default::default() };
    assert!(matches!(seed_catalog(&store, &cfg).await, Err(SeedError::Io { .. })));
  }

  #[tokio::test]
  async fn shipped_data_files_seed_upper_levels() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let store = Store::in_memory().await.unwrap();
    let cfg = CatalogCfg {
      grammar_path: Some(root.join("data/grammar.json")),
      vocabulary_path: Some(root.join("data/vocabulary.json")),
      skip_builtin: true,
    };
    assert_eq!(seed_catalog(&store, &cfg).await.unwrap(), 10);
    let levels = store.catalog_levels("German").await.unwrap();
    assert_eq!(levels, vec![("B2".to_string(), 4), ("C1".to_string(), 5)]);
  }
}
