use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use tokio::sync::watch;

use crate::database::{ChatMessage, InterviewSession, Sender, SessionStore};
use crate::groq::{ChatBackend, GatewayError, GroqMessage};
use crate::summary::{parse_summary, InterviewSummary};

const PLACEHOLDER_TEXT: &str = "...";

const NO_OPENING_FALLBACK: &str = "Sorry, I couldn't think of a question.";
const NO_REPLACEMENT_FALLBACK: &str = "Sorry, I couldn't think of another question.";
const NO_FEEDBACK_FALLBACK: &str = "I'm not sure how to respond to that.";

/// Role and mode chosen on the setup screen, with the optional refinements.
#[derive(Debug, Clone)]
pub struct InterviewSetup {
    pub role: String,
    pub mode: String,
    pub domain: Option<String>,
    pub style: Option<String>,
}

impl Default for InterviewSetup {
    fn default() -> Self {
        Self {
            role: "Software Engineer".to_string(),
            mode: "Behavioral".to_string(),
            domain: None,
            style: None,
        }
    }
}

/// Drives one interview session: question generation, answer feedback,
/// persistence at the end, and AI scoring of stored sessions.
///
/// Transcript, composing flag, and summary are published on watch channels
/// for the screens to observe. The network-backed operations serialize with
/// each other through an internal lock, so no two completion calls for the
/// session are ever in flight at once; every failure is converted into
/// user-visible text at this boundary instead of propagating.
pub struct InterviewEngine {
    backend: Arc<dyn ChatBackend>,
    store: Arc<SessionStore>,
    model: String,
    setup: parking_lot::Mutex<InterviewSetup>,
    last_question: parking_lot::Mutex<String>,
    transcript_tx: watch::Sender<Vec<ChatMessage>>,
    typing_tx: watch::Sender<bool>,
    summary_tx: watch::Sender<Option<InterviewSummary>>,
    op_lock: tokio::sync::Mutex<()>,
}

impl InterviewEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<SessionStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            model: model.into(),
            setup: parking_lot::Mutex::new(InterviewSetup::default()),
            last_question: parking_lot::Mutex::new(String::new()),
            transcript_tx: watch::channel(Vec::new()).0,
            typing_tx: watch::channel(false).0,
            summary_tx: watch::channel(None).0,
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn configure(&self, setup: InterviewSetup) {
        *self.setup.lock() = setup;
    }

    pub fn setup(&self) -> InterviewSetup {
        self.setup.lock().clone()
    }

    pub fn transcript(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.transcript_tx.subscribe()
    }

    pub fn transcript_snapshot(&self) -> Vec<ChatMessage> {
        self.transcript_tx.borrow().clone()
    }

    pub fn is_bot_typing(&self) -> watch::Receiver<bool> {
        self.typing_tx.subscribe()
    }

    pub fn summary(&self) -> watch::Receiver<Option<InterviewSummary>> {
        self.summary_tx.subscribe()
    }

    /// Clears the transcript and asks the model for the opening question.
    pub async fn start_interview(&self) {
        let _op = self.op_lock.lock().await;
        self.transcript_tx.send_replace(Vec::new());
        let _typing = TypingGuard::engage(&self.typing_tx);

        let prompt = self.opening_prompt();
        match self
            .backend
            .complete(vec![GroqMessage::system(prompt)], &self.model, false)
            .await
        {
            Ok(question) => self.accept_question(question),
            Err(GatewayError::NoChoices) => self.accept_question(NO_OPENING_FALLBACK.to_string()),
            Err(e) => {
                error!("Failed to start interview: {}", e);
                self.push_message(ChatMessage::bot(format!("Error: {}", e)));
            }
        }
    }

    /// Swaps the current question for a different one. A transient `...`
    /// bubble marks the wait and is removed once the call settles, success
    /// or failure.
    pub async fn request_new_question(&self) {
        let _op = self.op_lock.lock().await;
        self.push_message(ChatMessage::bot(PLACEHOLDER_TEXT));
        let _typing = TypingGuard::engage(&self.typing_tx);
        let placeholder = PlaceholderGuard::new(&self.transcript_tx);

        let prompt = self.replacement_prompt();
        let result = self
            .backend
            .complete(vec![GroqMessage::system(prompt)], &self.model, false)
            .await;
        drop(placeholder);

        match result {
            Ok(question) => self.accept_question(question),
            Err(GatewayError::NoChoices) => {
                self.accept_question(NO_REPLACEMENT_FALLBACK.to_string())
            }
            Err(e) => {
                error!("Failed to fetch a new question: {}", e);
                self.push_message(ChatMessage::bot(format!("Error: {}", e)));
            }
        }
    }

    /// Appends the user's answer to the transcript, then asks the model to
    /// evaluate it against the question that was on the table. The user
    /// message lands before any network effect, so it survives a failed
    /// request.
    pub async fn submit_answer(&self, user_text: impl Into<String>) {
        let user_text = user_text.into();
        let _op = self.op_lock.lock().await;
        self.push_message(ChatMessage::user(user_text.clone()));
        let _typing = TypingGuard::engage(&self.typing_tx);

        let last_question = self.last_question.lock().clone();
        let system = format!(
            "You are an interview evaluator. The candidate was asked: '{}'. \
             Your task is to provide a short, constructive paragraph of feedback on their answer.",
            last_question
        );
        let messages = vec![GroqMessage::system(system), GroqMessage::user(user_text)];

        match self.backend.complete(messages, &self.model, false).await {
            Ok(feedback) => self.push_message(ChatMessage::bot(feedback)),
            Err(GatewayError::NoChoices) => {
                self.push_message(ChatMessage::bot(NO_FEEDBACK_FALLBACK))
            }
            Err(e) => {
                error!("Failed to get feedback: {}", e);
                self.push_message(ChatMessage::bot(format!("Error getting feedback: {}", e)));
            }
        }
    }

    /// Persists the session if the candidate actually answered something.
    /// A transcript holding only the opening question is not worth saving.
    ///
    /// Waits for any completion call still in flight, so the stored snapshot
    /// is never missing a reply that was already being generated.
    pub async fn end_interview(&self) -> Option<i64> {
        let _op = self.op_lock.lock().await;
        let transcript = self.transcript_tx.borrow().clone();
        if transcript.len() <= 1 {
            info!("Skipping save: transcript has {} message(s)", transcript.len());
            return None;
        }

        let (role, mode) = {
            let setup = self.setup.lock();
            (setup.role.clone(), setup.mode.clone())
        };
        let date = Utc::now().timestamp_millis();

        match self.store.insert(&role, &mode, date, &transcript) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to store interview session: {}", e);
                None
            }
        }
    }

    pub fn delete_session(&self, id: i64) {
        if let Err(e) = self.store.delete(id) {
            error!("Failed to delete session {}: {}", id, e);
        }
    }

    /// Scores a stored session. The result is always published: request or
    /// parse failures become a zero-score summary carrying the error text.
    pub async fn generate_summary(&self, session: &InterviewSession) {
        let _op = self.op_lock.lock().await;
        self.summary_tx.send_replace(None);

        let system = format!(
            "You are an expert interview coach. Analyze the following interview transcript \
             for a '{}' in '{}' mode.\n\
             Based on the transcript, provide a final summary in a JSON format. The JSON object \
             must have these exact keys: \"finalScore\", \"areasOfStrength\", \"areasToImprove\", \
             and \"suggestedResources\".\n\
             Your response must be ONLY the raw JSON object, with no other text or markdown.",
            session.role, session.mode
        );
        let messages = vec![
            GroqMessage::system(system),
            GroqMessage::user(session.transcript_text()),
        ];

        let summary = match self.backend.complete(messages, &self.model, true).await {
            Ok(raw) => parse_summary(&raw).unwrap_or_else(|e| {
                error!("Summary response did not parse: {}", e);
                InterviewSummary::failure(format!("Error generating summary: {}", e))
            }),
            Err(e) => {
                error!("Summary request failed: {}", e);
                InterviewSummary::failure(format!("Error generating summary: {}", e))
            }
        };
        self.summary_tx.send_replace(Some(summary));
    }

    fn accept_question(&self, question: String) {
        *self.last_question.lock() = question.clone();
        self.push_message(ChatMessage::bot(question));
    }

    fn push_message(&self, message: ChatMessage) {
        self.transcript_tx.send_modify(|messages| messages.push(message));
    }

    fn opening_prompt(&self) -> String {
        let setup = self.setup.lock();
        let mut prompt = format!(
            "You are an expert interviewer for a '{}' position. \
             Your task is to generate exactly one opening question for a '{}' style interview. ",
            setup.role, setup.mode
        );
        if let Some(domain) = &setup.domain {
            prompt.push_str(&format!("The interview is focused on the '{}' domain. ", domain));
        }
        if let Some(style) = &setup.style {
            prompt.push_str(&format!(
                "The question should be in the style of a '{}' interview. ",
                style
            ));
        }
        prompt.push_str(
            "Your entire response must contain ONLY the question text. \
             Do NOT add any greetings, context, or explanations.",
        );
        prompt
    }

    fn replacement_prompt(&self) -> String {
        let setup = self.setup.lock();
        let mut prompt = format!(
            "You are an expert interviewer for a '{}' position. \
             Your task is to generate a new and different question for a '{}' style interview. ",
            setup.role, setup.mode
        );
        if let Some(domain) = &setup.domain {
            prompt.push_str(&format!("The focus is '{}'. ", domain));
        }
        if let Some(style) = &setup.style {
            prompt.push_str(&format!("The style is '{}'. ", style));
        }
        prompt.push_str("Your entire response must contain ONLY the question text.");
        prompt
    }
}

/// Raises the composing flag and guarantees it drops on every exit path,
/// including cancellation of the surrounding future.
struct TypingGuard<'a> {
    tx: &'a watch::Sender<bool>,
}

impl<'a> TypingGuard<'a> {
    fn engage(tx: &'a watch::Sender<bool>) -> Self {
        tx.send_replace(true);
        Self { tx }
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_replace(false);
    }
}

/// Strips a trailing placeholder bubble when dropped, so the transcript can
/// never retain it past the operation, whatever path the operation takes.
struct PlaceholderGuard<'a> {
    tx: &'a watch::Sender<Vec<ChatMessage>>,
}

impl<'a> PlaceholderGuard<'a> {
    fn new(tx: &'a watch::Sender<Vec<ChatMessage>>) -> Self {
        Self { tx }
    }
}

impl Drop for PlaceholderGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_modify(|messages| {
            if messages
                .last()
                .is_some_and(|m| m.sender == Sender::Bot && m.text == PLACEHOLDER_TEXT)
            {
                messages.pop();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Replays queued replies and records every request it served.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: parking_lot::Mutex<VecDeque<Result<String, GatewayError>>>,
        requests: parking_lot::Mutex<Vec<(Vec<GroqMessage>, bool)>>,
    }

    impl ScriptedBackend {
        fn replying(replies: Vec<Result<String, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: parking_lot::Mutex::new(replies.into()),
                requests: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn http_error() -> GatewayError {
            GatewayError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            messages: Vec<GroqMessage>,
            _model: &str,
            force_json: bool,
        ) -> Result<String, GatewayError> {
            self.requests.lock().push((messages, force_json));
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Err(GatewayError::NoChoices))
        }
    }

    fn engine_with(backend: Arc<ScriptedBackend>) -> (InterviewEngine, Arc<SessionStore>) {
        init_logging();
        let store = Arc::new(SessionStore::open_in_memory().unwrap());
        let engine = InterviewEngine::new(backend, store.clone(), "gemma2-9b-it");
        (engine, store)
    }

    #[tokio::test]
    async fn start_interview_records_the_question() {
        let backend = ScriptedBackend::replying(vec![Ok("Why Rust?".to_string())]);
        let (engine, _) = engine_with(backend.clone());

        engine.start_interview().await;

        let transcript = engine.transcript_snapshot();
        assert_eq!(transcript, vec![ChatMessage::bot("Why Rust?")]);
        assert!(!*engine.is_bot_typing().borrow());

        // The recorded question feeds the evaluator prompt.
        engine.submit_answer("Because of ownership.").await;
        let requests = backend.requests.lock();
        let (messages, force_json) = &requests[1];
        assert!(messages[0].content.contains("'Why Rust?'"));
        assert_eq!(messages[1].content, "Because of ownership.");
        assert!(!*force_json);
    }

    #[tokio::test]
    async fn start_interview_failure_yields_one_error_bubble() {
        let backend = ScriptedBackend::replying(vec![Err(ScriptedBackend::http_error())]);
        let (engine, _) = engine_with(backend);

        engine.start_interview().await;

        let transcript = engine.transcript_snapshot();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].sender, Sender::Bot);
        assert!(transcript[0].text.contains("Error"));
        assert!(!*engine.is_bot_typing().borrow());
    }

    #[tokio::test]
    async fn empty_choices_fall_back_to_the_apology_line() {
        let backend = ScriptedBackend::replying(vec![Err(GatewayError::NoChoices)]);
        let (engine, _) = engine_with(backend);

        engine.start_interview().await;

        assert_eq!(
            engine.transcript_snapshot(),
            vec![ChatMessage::bot(NO_OPENING_FALLBACK)]
        );
    }

    #[tokio::test]
    async fn opening_prompt_mentions_domain_and_style_only_when_set() {
        let backend = ScriptedBackend::replying(vec![
            Ok("Q1".to_string()),
            Ok("Q2".to_string()),
        ]);
        let (engine, _) = engine_with(backend.clone());

        engine.start_interview().await;
        engine.configure(InterviewSetup {
            role: "Data Analyst".to_string(),
            mode: "Technical".to_string(),
            domain: Some("Machine Learning".to_string()),
            style: Some("STAR-based".to_string()),
        });
        engine.start_interview().await;

        let requests = backend.requests.lock();
        let plain = &requests[0].0[0].content;
        assert!(plain.contains("'Software Engineer'"));
        assert!(!plain.contains("domain"));

        let refined = &requests[1].0[0].content;
        assert!(refined.contains("'Data Analyst'"));
        assert!(refined.contains("'Machine Learning' domain"));
        assert!(refined.contains("'STAR-based' interview"));
    }

    #[tokio::test]
    async fn submit_answer_keeps_the_user_message_when_the_call_fails() {
        let backend = ScriptedBackend::replying(vec![
            Ok("Q".to_string()),
            Err(ScriptedBackend::http_error()),
        ]);
        let (engine, _) = engine_with(backend);

        engine.start_interview().await;
        engine.submit_answer("my answer").await;

        let transcript = engine.transcript_snapshot();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1], ChatMessage::user("my answer"));
        assert_eq!(transcript[2].sender, Sender::Bot);
        assert!(transcript[2].text.contains("Error getting feedback"));
    }

    #[tokio::test]
    async fn new_question_leaves_no_placeholder_behind() {
        let backend = ScriptedBackend::replying(vec![
            Ok("Q1".to_string()),
            Ok("Q2".to_string()),
            Err(ScriptedBackend::http_error()),
        ]);
        let (engine, _) = engine_with(backend);

        engine.start_interview().await;
        engine.request_new_question().await;
        engine.request_new_question().await;

        let transcript = engine.transcript_snapshot();
        assert!(transcript.iter().all(|m| m.text != PLACEHOLDER_TEXT));
        assert_eq!(transcript[1], ChatMessage::bot("Q2"));
        assert!(transcript[2].text.contains("Error"));
        assert!(!*engine.is_bot_typing().borrow());
    }

    #[tokio::test]
    async fn short_transcripts_are_not_saved() {
        let backend = ScriptedBackend::replying(vec![Ok("Q".to_string())]);
        let (engine, store) = engine_with(backend);

        assert_eq!(engine.end_interview().await, None);
        engine.start_interview().await;
        assert_eq!(engine.end_interview().await, None);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answered_interviews_are_saved_exactly_once() {
        let backend = ScriptedBackend::replying(vec![
            Ok("Q".to_string()),
            Ok("Good answer.".to_string()),
        ]);
        let (engine, store) = engine_with(backend);

        engine.start_interview().await;
        engine.submit_answer("A").await;
        let id = engine.end_interview().await.unwrap();

        let sessions = store.list_all().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].role, "Software Engineer");
        assert_eq!(sessions[0].chat_history.len(), 3);
    }

    #[tokio::test]
    async fn generate_summary_parses_a_well_formed_reply() {
        let backend = ScriptedBackend::replying(vec![Ok(
            r#"{"finalScore":80,"areasOfStrength":["A","B"],"areasToImprove":"ok","suggestedResources":"x"}"#
                .to_string(),
        )]);
        let (engine, _) = engine_with(backend.clone());

        let session = InterviewSession {
            id: 1,
            role: "Product Manager".to_string(),
            mode: "Behavioral".to_string(),
            date: 0,
            chat_history: vec![ChatMessage::bot("Q"), ChatMessage::user("A")],
        };
        engine.generate_summary(&session).await;

        let summary = engine.summary().borrow().clone().unwrap();
        assert_eq!(summary.final_score, 80);
        assert_eq!(summary.strengths, "- A\n- B");

        let requests = backend.requests.lock();
        let (messages, force_json) = &requests[0];
        assert!(*force_json);
        assert!(messages[0].content.contains("'Product Manager'"));
        assert_eq!(messages[1].content, "BOT: Q\nUSER: A");
    }

    #[tokio::test]
    async fn summary_failures_still_publish_a_result() {
        let backend = ScriptedBackend::replying(vec![
            Ok("not json at all".to_string()),
            Err(ScriptedBackend::http_error()),
        ]);
        let (engine, _) = engine_with(backend);

        let session = InterviewSession {
            id: 1,
            role: "R".to_string(),
            mode: "M".to_string(),
            date: 0,
            chat_history: vec![ChatMessage::bot("Q"), ChatMessage::user("A")],
        };

        engine.generate_summary(&session).await;
        let parse_fallback = engine.summary().borrow().clone().unwrap();
        assert_eq!(parse_fallback.final_score, 0);
        assert!(parse_fallback.improvements.starts_with("Error generating summary"));

        engine.generate_summary(&session).await;
        let request_fallback = engine.summary().borrow().clone().unwrap();
        assert_eq!(request_fallback.final_score, 0);
        assert!(!request_fallback.improvements.is_empty());
    }
}
