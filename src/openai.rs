//! Minimal OpenAI client implementing [`LanguageBackend`].
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::backend::{parse_review, BackendError, LanguageBackend, TranslationReview};
use crate::config::Prompts;
use crate::domain::{Exercise, GradedTopic, Topic};
use crate::util::{fill_template, trunc_for_log};

const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  api_key: Option<String>,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Build from env. Without OPENAI_API_KEY the client still exists but every call
  /// fails with `BackendError::NotConfigured`.
  pub fn from_env(prompts: Prompts) -> Self {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout))
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());

    Self { client, api_key, base_url, fast_model, strong_model, prompts }
  }

  pub fn is_available(&self) -> bool {
    self.api_key.is_some()
  }

  /// Shared request path. `json` asks the model for a JSON object.
  async fn chat(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    json: bool,
  ) -> Result<String, BackendError> {
    let api_key = self.api_key.as_deref().ok_or(BackendError::NotConfigured("OPENAI_API_KEY"))?;
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "lalang-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(BackendError::HttpStatus { status, body: msg });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .ok_or_else(|| BackendError::InvalidResponse("empty completion".into()))
  }
}

fn topic_list(topics: &[GradedTopic]) -> String {
  topics.iter().map(|t| format!("{}: {}", t.topic.id, t.topic.name)).collect::<Vec<_>>().join("; ")
}

/// Models like to wrap single sentences in quotes; strip one matching pair.
fn strip_quotes(s: &str) -> String {
  let t = s.trim();
  for (open, close) in [('"', '"'), ('“', '”'), ('«', '»'), ('„', '“')] {
    if t.starts_with(open) && t.ends_with(close) && t.chars().count() >= 2 {
      let inner: String = t.chars().skip(1).take(t.chars().count() - 2).collect();
      return inner.trim().to_string();
    }
  }
  t.to_string()
}

#[async_trait]
impl LanguageBackend for OpenAI {
  #[instrument(
    level = "info",
    skip(self, grammar_topic, vocabulary_topic),
    fields(model = %self.fast_model, grammar_topic_id = grammar_topic.id, vocabulary_topic_id = vocabulary_topic.id)
  )]
  async fn generate_sentence(
    &self,
    native_language: &str,
    studied_language: &str,
    grammar_topic: &Topic,
    vocabulary_topic: &Topic,
  ) -> Result<String, BackendError> {
    let pairs = [
      ("native_language", native_language),
      ("studied_language", studied_language),
      ("grammar_topic", grammar_topic.name.as_str()),
      ("vocabulary_topic", vocabulary_topic.name.as_str()),
      ("level", grammar_topic.level.as_str()),
    ];
    let system = fill_template(&self.prompts.sentence_system, &pairs);
    let user = fill_template(&self.prompts.sentence_user_template, &pairs);

    let start = Instant::now();
    let result = self.chat(&self.fast_model, &system, &user, 0.9, false).await;
    let elapsed = start.elapsed();

    let sentence = match result {
      Ok(text) => strip_quotes(&text),
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during sentence generation");
        return Err(e);
      }
    };
    if sentence.is_empty() {
      return Err(BackendError::InvalidResponse("generated sentence is empty".into()));
    }
    info!(?elapsed, preview = %trunc_for_log(&sentence, 40), "Sentence generated");
    Ok(sentence)
  }

  #[instrument(
    level = "info",
    skip(self, exercise, translation),
    fields(model = %self.strong_model, exercise_id = exercise.id, translation_len = translation.len())
  )]
  async fn evaluate_translation(
    &self,
    exercise: &Exercise,
    translation: &str,
  ) -> Result<TranslationReview, BackendError> {
    let grammar = topic_list(&exercise.grammar_topics);
    let vocabulary = topic_list(&exercise.vocabulary_topics);
    let pairs = [
      ("native_language", exercise.native_language.as_str()),
      ("studied_language", exercise.studied_language.as_str()),
      ("sentence", exercise.sentence.as_str()),
      ("translation", translation),
      ("grammar_topics", grammar.as_str()),
      ("vocabulary_topics", vocabulary.as_str()),
    ];
    let system = fill_template(&self.prompts.evaluation_system, &pairs);
    let user = fill_template(&self.prompts.evaluation_user_template, &pairs);

    let start = Instant::now();
    let raw = self.chat(&self.strong_model, &system, &user, 0.2, true).await?;
    let review = parse_review(&raw, exercise);
    match &review {
      Ok(_) => info!(elapsed = ?start.elapsed(), response_len = raw.len(), "Translation review received"),
      Err(e) => error!(elapsed = ?start.elapsed(), error = %e, raw = %trunc_for_log(&raw, 200), "Rejected translation review"),
    }
    review
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::TopicType;

  #[test]
  fn strips_one_pair_of_quotes() {
    assert_eq!(strip_quotes("\"Я устал.\""), "Я устал.");
    assert_eq!(strip_quotes("«Я устал.»"), "Я устал.");
    assert_eq!(strip_quotes("Он сказал \"да\""), "Он сказал \"да\"");
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[tokio::test]
  async fn missing_key_is_reported_not_faked() {
    let oa = OpenAI {
      client: reqwest::Client::new(),
      api_key: None,
      base_url: "http://127.0.0.1:9".into(),
      fast_model: "m".into(),
      strong_model: "m".into(),
      prompts: Prompts::default(),
    };
    let topic = Topic {
      id: 1,
      topic_type: TopicType::Grammar,
      language: "German".into(),
      name: "Dativ".into(),
      level: "A2".into(),
      level_number: 2,
    };
    let err = oa.generate_sentence("Russian", "German", &topic, &topic).await.unwrap_err();
    assert!(matches!(err, BackendError::NotConfigured(_)));
    assert!(!oa.is_available());
  }
}
