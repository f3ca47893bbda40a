//! InterviewBot core.
//!
//! The embeddable engine behind an interview practice app: it generates
//! interview questions and answer feedback through the Groq chat-completion
//! API, keeps the running transcript observable for a UI shell, records
//! finished sessions in a local SQLite store, and turns a platform speech
//! recognizer's callbacks into observable voice state.
//!
//! Screens, navigation, and rendering live in the shell that embeds this
//! crate; everything here is plain async Rust with no UI dependencies.

pub mod config;
pub mod database;
pub mod groq;
pub mod interview;
pub mod summary;
pub mod voice;

pub use config::AppConfig;
pub use database::{ChatMessage, InterviewSession, Sender, SessionStore};
pub use groq::{ChatBackend, GroqClient};
pub use interview::{InterviewEngine, InterviewSetup};
pub use summary::InterviewSummary;
pub use voice::{SpeechRecognizer, VoiceCapture, VoiceState};
