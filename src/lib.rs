//! Lalang · adaptive translation exercises for language learners.
//!
//! Topic catalog, weighted topic selection, exercise lifecycle, progress ledger and
//! per-chat sessions, served over HTTP and WebSocket.

pub mod backend;
pub mod bot;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod openai;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod selector;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod transport;
pub mod util;
