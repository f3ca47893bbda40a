use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a chat turn. Serialized as `"USER"` / `"BOT"`, which is also
/// the storage encoding inside persisted sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "USER"),
            Sender::Bot => write!(f, "BOT"),
        }
    }
}

/// One immutable turn of the interview transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
        }
    }
}

/// A completed interview, immutable once stored. `id` is assigned by the
/// store on insert and never reused after deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: i64,
    pub role: String,
    pub mode: String,
    /// Epoch milliseconds at the moment the interview ended.
    pub date: i64,
    pub chat_history: Vec<ChatMessage>,
}

impl InterviewSession {
    /// Flattens the transcript into one `SENDER: text` line per turn, the
    /// form the summary prompt feeds to the model.
    pub fn transcript_text(&self) -> String {
        self.chat_history
            .iter()
            .map(|message| format!("{}: {}", message.sender, message.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
