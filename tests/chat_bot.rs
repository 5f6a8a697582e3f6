mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use lalang_backend::bot::{format_task, menu_options, ChatBot, ChatContext, CHOOSE_LANGUAGE, GIVE_TASK, PROGRESS};
use lalang_backend::db::Store;
use lalang_backend::session::{ChatSessions, SessionState};
use lalang_backend::transport::{BufferedTransport, ChatEvent, OutboundMessage};

use common::{engine, learner, seeded_store, ScriptedBackend};

fn ctx() -> ChatContext {
    ChatContext { chat_id: 9, username: "anna".into() }
}

fn choice(option: &str) -> ChatEvent {
    ChatEvent::Choice { option: option.into() }
}

fn texts(messages: &[OutboundMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| match m {
            OutboundMessage::Text { text, .. } | OutboundMessage::Choice { text, .. } => text.clone(),
        })
        .collect()
}

fn bot(store: Store, backend: Arc<ScriptedBackend>) -> (ChatBot, ChatSessions) {
    let sessions = ChatSessions::new(engine(store, backend));
    (ChatBot::new(sessions.clone()), sessions)
}

#[tokio::test]
async fn start_registers_user_and_shows_menu() {
    let store = seeded_store().await;
    let (bot, _) = bot(store.clone(), Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), ChatEvent::Start).await.unwrap();

    let out = transport.drain();
    assert_eq!(out.len(), 2);
    assert!(texts(&out)[0].starts_with("Welcome to Lalang"));
    match &out[1] {
        OutboundMessage::Choice { chat_id, options, .. } => {
            assert_eq!(*chat_id, 9);
            assert_eq!(options, &menu_options());
        }
        other => panic!("expected menu, got {other:?}"),
    }
    assert!(store.get_user_by_username("anna").await.unwrap().is_some());
}

#[tokio::test]
async fn task_then_translation_sends_breakdown() {
    let store = seeded_store().await;
    learner(&store, "anna").await;
    let (bot, sessions) = bot(store.clone(), Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();
    let out = transport.drain();
    assert_eq!(texts(&out), vec!["Translate to German: Я устал".to_string()]);
    let SessionState::AwaitingTranslation(id) = sessions.state(9).await.unwrap() else {
        panic!("no pending exercise");
    };
    let exercise = store.get_exercise(id).await.unwrap().unwrap();
    assert_eq!(format_task(&exercise), "Translate to German: Я устал");

    bot.handle(&transport, &ctx(), ChatEvent::Text { text: "Ich bin müde".into() }).await.unwrap();
    let out = texts(&transport.drain());
    assert!(out[0].contains("Correct translation: Ich bin müde"));
    assert!(out[0].contains("Grammar (Perfekt): 4/5"));
    assert!(out[0].contains("Vocabulary (Feelings): 2/5"));
    assert_eq!(sessions.state(9).await.unwrap(), SessionState::Idle);
}

#[tokio::test]
async fn backend_failure_asks_learner_to_retry() {
    let store = seeded_store().await;
    learner(&store, "anna").await;
    let backend = Arc::new(ScriptedBackend::default());
    let (bot, _) = bot(store, backend.clone());
    let transport = BufferedTransport::new();

    backend.fail_generation.store(true, Ordering::SeqCst);
    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();

    let out = texts(&transport.drain());
    assert_eq!(out[0], "Something went wrong. Please try again.");
}

#[tokio::test]
async fn missing_catalog_names_language_and_level() {
    let store = Store::in_memory().await.unwrap();
    learner(&store, "anna").await;
    let (bot, _) = bot(store, Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();

    let out = texts(&transport.drain());
    assert!(out[0].contains("German level 3"), "{}", out[0]);
}

#[tokio::test]
async fn onboarding_updates_profile() {
    let store = seeded_store().await;
    let (bot, _) = bot(store.clone(), Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(CHOOSE_LANGUAGE)).await.unwrap();
    match &transport.drain()[0] {
        OutboundMessage::Choice { options, .. } => {
            assert_eq!(options.len(), 1);
            assert_eq!(options[0].value, "language:German");
        }
        other => panic!("expected language choice, got {other:?}"),
    }

    bot.handle(&transport, &ctx(), choice("language:German")).await.unwrap();
    let out = transport.drain();
    match &out[1] {
        OutboundMessage::Choice { options, .. } => assert_eq!(options[0].value, "level:3"),
        other => panic!("expected level choice, got {other:?}"),
    }

    bot.handle(&transport, &ctx(), choice("level:3")).await.unwrap();
    let user = store.get_user_by_username("anna").await.unwrap().unwrap();
    assert_eq!(user.studied_language.as_deref(), Some("German"));
    assert_eq!(user.level_number, Some(3));
}

#[tokio::test]
async fn progress_reports_graded_topics() {
    let store = seeded_store().await;
    learner(&store, "anna").await;
    let (bot, _) = bot(store, Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(PROGRESS)).await.unwrap();
    assert_eq!(texts(&transport.drain())[0], "No graded exercises yet.");

    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();
    bot.handle(&transport, &ctx(), ChatEvent::Text { text: "Ich bin müde".into() }).await.unwrap();
    transport.drain();

    bot.handle(&transport, &ctx(), choice(PROGRESS)).await.unwrap();
    let report = &texts(&transport.drain())[0];
    assert!(report.contains("Perfekt (grammar, B1): 1 attempts, average 4.0, 1 strong"), "{report}");
    assert!(report.contains("Feelings (vocabulary, B1): 1 attempts, average 2.0, 0 strong"), "{report}");
}

#[tokio::test]
async fn blank_translation_keeps_exercise_pending() {
    let store = seeded_store().await;
    learner(&store, "anna").await;
    let backend = Arc::new(ScriptedBackend::default());
    let (bot, sessions) = bot(store, backend.clone());
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();
    transport.drain();
    let pending = sessions.state(9).await.unwrap();

    bot.handle(&transport, &ctx(), ChatEvent::Text { text: "   ".into() }).await.unwrap();

    assert_eq!(texts(&transport.drain())[0], "Please send your translation.");
    assert_eq!(sessions.state(9).await.unwrap(), pending);
    assert!(matches!(pending, SessionState::AwaitingTranslation(_)));
    assert_eq!(backend.evaluations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn closed_exercise_is_reported_as_closed() {
    let store = seeded_store().await;
    learner(&store, "anna").await;
    let (bot, sessions) = bot(store.clone(), Arc::new(ScriptedBackend::default()));
    let transport = BufferedTransport::new();

    bot.handle(&transport, &ctx(), choice(GIVE_TASK)).await.unwrap();
    let SessionState::AwaitingTranslation(id) = sessions.state(9).await.unwrap() else {
        panic!("no pending exercise");
    };
    sessions.engine().evaluate(id, "Ich bin müde").await.unwrap();
    transport.drain();

    bot.handle(&transport, &ctx(), ChatEvent::Text { text: "Ich bin müde".into() }).await.unwrap();

    assert_eq!(texts(&transport.drain())[0], "That exercise is already closed. Ask for a new one.");
    assert_eq!(sessions.state(9).await.unwrap(), SessionState::Idle);
}
