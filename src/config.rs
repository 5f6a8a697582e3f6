//! Runtime configuration: environment variables plus an optional TOML agent config
//! (prompts, learner defaults, catalog data files).
//!
//! See `AgentConfig` and `Prompts` for the expected TOML schema.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite:lalang.db?mode=rwc";

/// Everything `main` needs to boot.
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub database_url: String,
  pub agent: AgentConfig,
}

impl AppConfig {
  pub fn from_env() -> Self {
    let port = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(DEFAULT_PORT);
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
    let agent = load_agent_config_from_env().unwrap_or_default();
    Self { port, database_url, agent }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub defaults: LearnerDefaults,
  #[serde(default)]
  pub catalog: CatalogCfg,
}

/// Used when a user has not picked languages or a level yet.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LearnerDefaults {
  pub native_language: String,
  pub studied_language: String,
  pub level_number: i64,
}

impl Default for LearnerDefaults {
  fn default() -> Self {
    Self { native_language: "Russian".into(), studied_language: "German".into(), level_number: 1 }
  }
}

/// Optional JSON files with extra topics, seeded on top of the built-in catalog.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct CatalogCfg {
  #[serde(default)] pub grammar_path: Option<PathBuf>,
  #[serde(default)] pub vocabulary_path: Option<PathBuf>,
  /// Skip the built-in seed topics.
  #[serde(default)] pub skip_builtin: bool,
}

/// Prompts used by the OpenAI backend. Placeholders are `{name}` (see `util::fill_template`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Sentence generation
  pub sentence_system: String,
  pub sentence_user_template: String,
  // Translation review
  pub evaluation_system: String,
  pub evaluation_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      sentence_system: "You write short practice sentences for language learners. Output ONLY the sentence, no quotes, no translation.".into(),
      sentence_user_template: "Write one natural sentence in {native_language} for a learner of {studied_language} to translate. The translation must exercise the grammar topic '{grammar_topic}' and the vocabulary topic '{vocabulary_topic}' at level {level}. Keep it under 20 words.".into(),
      evaluation_system: "You are a strict but friendly {studied_language} teacher. Respond ONLY with strict JSON.".into(),
      evaluation_user_template: "Sentence ({native_language}): {sentence}\nLearner translation ({studied_language}): {translation}\nGrammar topics (id: name): {grammar_topics}\nVocabulary topics (id: name): {vocabulary_topics}\n\nReturn JSON {\"correct_translation\": string, \"grammar_grades\": {\"<topic id>\": 1-5}, \"vocabulary_grades\": {\"<topic id>\": 1-5}, \"explanation\": string}.\nGrade every listed topic exactly once: 5 = flawless use, 1 = wrong or missing. Write the explanation in {native_language}, at most 3 sentences.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "lalang_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lalang_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lalang_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg = parse_agent_config("").unwrap();
    assert_eq!(cfg.defaults, LearnerDefaults::default());
    assert!(cfg.catalog.grammar_path.is_none());
    assert!(cfg.prompts.evaluation_user_template.contains("{translation}"));
  }

  #[test]
  fn partial_sections_keep_remaining_defaults() {
    let cfg = parse_agent_config(
      r#"
        [defaults]
        studied_language = "French"

        [prompts]
        sentence_system = "custom"

        [catalog]
        grammar_path = "data/grammar.json"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.defaults.studied_language, "French");
    assert_eq!(cfg.defaults.native_language, "Russian");
    assert_eq!(cfg.prompts.sentence_system, "custom");
    assert!(!cfg.prompts.sentence_user_template.is_empty());
    assert_eq!(cfg.catalog.grammar_path, Some(PathBuf::from("data/grammar.json")));
  }

  #[test]
  fn sample_config_parses() {
    let raw = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/lalang.toml")).unwrap();
    let cfg = parse_agent_config(&raw).unwrap();
    assert_eq!(cfg.defaults, LearnerDefaults::default());
    assert_eq!(cfg.catalog.vocabulary_path, Some(PathBuf::from("data/vocabulary.json")));
  }
}
