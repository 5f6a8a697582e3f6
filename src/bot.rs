//! Chat controller: turns inbound chat events into session operations and replies
//! through a [`ChatTransport`]. Failures never leak details to the learner; they get
//! a plain retry message and the details go to the log.

use tracing::{error, info, instrument};

use crate::db::Store;
use crate::domain::{ChatId, Evaluation, Exercise, GradedTopic, User, UserProfile};
use crate::error::EngineError;
use crate::session::ChatSessions;
use crate::transport::{ChatEvent, ChatTransport, ChoiceOption, TransportError};

pub const GIVE_TASK: &str = "give_task";
pub const PROGRESS: &str = "progress";
pub const CHOOSE_LANGUAGE: &str = "choose_language";
pub const CHOOSE_LEVEL: &str = "choose_level";
const LANGUAGE_PREFIX: &str = "language:";
const LEVEL_PREFIX: &str = "level:";

const WELCOME: &str = "Welcome to Lalang, a chatbot for learning a foreign language.\n\n\
  You will be given sentences to translate and afterwards you will get a breakdown of your answer.\n\nHave fun!";
const MENU_PROMPT: &str = "What would you like to do?";
const RETRY: &str = "Something went wrong. Please try again.";
const EMPTY_TRANSLATION: &str = "Please send your translation.";
const EXERCISE_CLOSED: &str = "That exercise is already closed. Ask for a new one.";

/// Who is talking: the chat and the transport-level username of its learner.
#[derive(Clone, Debug)]
pub struct ChatContext {
  pub chat_id: ChatId,
  pub username: String,
}

#[derive(Clone)]
pub struct ChatBot {
  sessions: ChatSessions,
}

impl ChatBot {
  pub fn new(sessions: ChatSessions) -> Self {
    Self { sessions }
  }

  fn store(&self) -> &Store {
    self.sessions.engine().store()
  }

  #[instrument(level = "info", skip(self, transport, event), fields(chat_id = ctx.chat_id))]
  pub async fn handle(
    &self,
    transport: &dyn ChatTransport,
    ctx: &ChatContext,
    event: ChatEvent,
  ) -> Result<(), TransportError> {
    match event {
      ChatEvent::Start => self.start(transport, ctx).await,
      ChatEvent::Choice { option } => self.handle_choice(transport, ctx, &option).await,
      ChatEvent::Text { text } => self.handle_text(transport, ctx, &text).await,
    }
  }

  async fn start(&self, transport: &dyn ChatTransport, ctx: &ChatContext) -> Result<(), TransportError> {
    if let Err(e) = self.user(ctx).await {
      return self.report(transport, ctx, &e).await;
    }
    transport.send_text(ctx.chat_id, WELCOME).await?;
    self.send_menu(transport, ctx.chat_id).await
  }

  async fn handle_choice(
    &self,
    transport: &dyn ChatTransport,
    ctx: &ChatContext,
    option: &str,
  ) -> Result<(), TransportError> {
    let user = match self.user(ctx).await {
      Ok(user) => user,
      Err(e) => return self.report(transport, ctx, &e).await,
    };

    if option == GIVE_TASK {
      return self.give_task(transport, ctx, &user).await;
    }
    if option == PROGRESS {
      return self.send_progress(transport, ctx, &user).await;
    }
    if option == CHOOSE_LANGUAGE {
      return self.offer_languages(transport, ctx).await;
    }
    if option == CHOOSE_LEVEL {
      return self.offer_levels(transport, ctx, &user).await;
    }
    if let Some(language) = option.strip_prefix(LANGUAGE_PREFIX) {
      let profile = UserProfile { studied_language: Some(language.to_string()), ..UserProfile::named(&user.username) };
      return match self.store().upsert_user(&profile).await {
        Ok(user) => {
          transport.send_text(ctx.chat_id, &format!("You are now studying {language}.")).await?;
          self.offer_levels(transport, ctx, &user).await
        }
        Err(e) => self.report(transport, ctx, &e.into()).await,
      };
    }
    if let Some(level) = option.strip_prefix(LEVEL_PREFIX).and_then(|s| s.parse::<i64>().ok()) {
      let profile = UserProfile { level_number: Some(level), ..UserProfile::named(&user.username) };
      return match self.store().upsert_user(&profile).await {
        Ok(_) => {
          transport.send_text(ctx.chat_id, &format!("Level set to {level}.")).await?;
          self.send_menu(transport, ctx.chat_id).await
        }
        Err(e) => self.report(transport, ctx, &e.into()).await,
      };
    }

    info!(target: "lalang_backend", chat_id = ctx.chat_id, option, "Unknown choice");
    self.send_menu(transport, ctx.chat_id).await
  }

  async fn handle_text(
    &self,
    transport: &dyn ChatTransport,
    ctx: &ChatContext,
    text: &str,
  ) -> Result<(), TransportError> {
    match self.sessions.submit_translation(ctx.chat_id, text).await {
      Ok(Some(evaluation)) => {
        transport.send_text(ctx.chat_id, &format_evaluation(&evaluation)).await?;
        self.send_menu(transport, ctx.chat_id).await
      }
      // Nothing pending: the learner is just chatting.
      Ok(None) => self.send_menu(transport, ctx.chat_id).await,
      Err(e) => self.report(transport, ctx, &e).await,
    }
  }

  async fn give_task(&self, transport: &dyn ChatTransport, ctx: &ChatContext, user: &User) -> Result<(), TransportError> {
    match self.sessions.request_exercise(ctx.chat_id, user).await {
      Ok(exercise) => transport.send_text(ctx.chat_id, &format_task(&exercise)).await,
      Err(e) => self.report(transport, ctx, &e).await,
    }
  }

  async fn send_progress(&self, transport: &dyn ChatTransport, ctx: &ChatContext, user: &User) -> Result<(), TransportError> {
    let summary = match self.store().progress_summary(user.id).await {
      Ok(summary) => summary,
      Err(e) => return self.report(transport, ctx, &e.into()).await,
    };
    let text = if summary.is_empty() {
      "No graded exercises yet.".to_string()
    } else {
      let lines: Vec<String> = summary
        .iter()
        .map(|p| {
          format!(
            "{} ({}, {}): {} attempts, average {:.1}, {} strong",
            p.topic.name, p.topic.topic_type, p.topic.level, p.attempts, p.mean_grade, p.strong_count
          )
        })
        .collect();
      format!("Your progress:\n{}", lines.join("\n"))
    };
    transport.send_text(ctx.chat_id, &text).await?;
    self.send_menu(transport, ctx.chat_id).await
  }

  async fn offer_languages(&self, transport: &dyn ChatTransport, ctx: &ChatContext) -> Result<(), TransportError> {
    let languages = match self.store().catalog_languages().await {
      Ok(languages) => languages,
      Err(e) => return self.report(transport, ctx, &e.into()).await,
    };
    let options: Vec<ChoiceOption> = languages
      .iter()
      .map(|l| ChoiceOption::new(l.as_str(), format!("{LANGUAGE_PREFIX}{l}")))
      .collect();
    transport.send_choice(ctx.chat_id, "Which language do you want to study?", &options).await
  }

  async fn offer_levels(&self, transport: &dyn ChatTransport, ctx: &ChatContext, user: &User) -> Result<(), TransportError> {
    let language = self.sessions.engine().resolve_profile(user).studied_language;
    let levels = match self.store().catalog_levels(&language).await {
      Ok(levels) => levels,
      Err(e) => return self.report(transport, ctx, &e.into()).await,
    };
    if levels.is_empty() {
      transport.send_text(ctx.chat_id, &format!("There are no topics for {language} yet.")).await?;
      return self.send_menu(transport, ctx.chat_id).await;
    }
    let options: Vec<ChoiceOption> = levels
      .iter()
      .map(|(label, number)| ChoiceOption::new(label.as_str(), format!("{LEVEL_PREFIX}{number}")))
      .collect();
    transport.send_choice(ctx.chat_id, &format!("Choose your {language} level:"), &options).await
  }

  async fn send_menu(&self, transport: &dyn ChatTransport, chat_id: ChatId) -> Result<(), TransportError> {
    transport.send_choice(chat_id, MENU_PROMPT, &menu_options()).await
  }

  /// Log the failure and tell the learner what they can do about it.
  async fn report(&self, transport: &dyn ChatTransport, ctx: &ChatContext, e: &EngineError) -> Result<(), TransportError> {
    error!(target: "lalang_backend", chat_id = ctx.chat_id, error = %e, kind = ?e.kind(), "Chat request failed");
    let text = match e {
      EngineError::EmptyTopicPool { language, level_number, .. } => {
        format!("There are no exercises for {language} level {level_number} yet. Please choose another language or level.")
      }
      EngineError::EmptyTranslation => EMPTY_TRANSLATION.to_string(),
      EngineError::ExerciseClosed { .. } | EngineError::ExerciseNotFound(_) => EXERCISE_CLOSED.to_string(),
      _ => RETRY.to_string(),
    };
    transport.send_text(ctx.chat_id, &text).await?;
    self.send_menu(transport, ctx.chat_id).await
  }

  /// Registered user behind this chat, created on first contact.
  async fn user(&self, ctx: &ChatContext) -> Result<User, EngineError> {
    if let Some(user) = self.store().get_user_by_username(&ctx.username).await? {
      return Ok(user);
    }
    Ok(self.store().upsert_user(&UserProfile::named(&ctx.username)).await?)
  }
}

pub fn menu_options() -> Vec<ChoiceOption> {
  vec![
    ChoiceOption::new("New exercise", GIVE_TASK),
    ChoiceOption::new("Choose language", CHOOSE_LANGUAGE),
    ChoiceOption::new("Choose level", CHOOSE_LEVEL),
    ChoiceOption::new("My progress", PROGRESS),
  ]
}

pub fn format_task(exercise: &Exercise) -> String {
  format!("Translate to {}: {}", exercise.studied_language, exercise.sentence)
}

fn grade_lines(kind: &str, topics: &[GradedTopic]) -> Vec<String> {
  topics
    .iter()
    .map(|t| match t.grade {
      Some(g) => format!("{kind} ({}): {g}/5", t.topic.name),
      None => format!("{kind} ({}): not graded", t.topic.name),
    })
    .collect()
}

pub fn format_evaluation(evaluation: &Evaluation) -> String {
  let mut lines = vec![
    format!("Correct translation: {}", evaluation.correct_translation),
    format!("Explanation: {}", evaluation.explanation),
    String::new(),
  ];
  lines.extend(grade_lines("Grammar", &evaluation.graded_grammar_topics));
  lines.extend(grade_lines("Vocabulary", &evaluation.graded_vocabulary_topics));
  lines.join("\n")
}
