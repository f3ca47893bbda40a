//! End-to-end flow over the public API with a scripted completion backend:
//! setup, a short interview, saving, history, and AI scoring.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use interviewbot::groq::{ChatBackend, GatewayError, GroqMessage};
use interviewbot::{InterviewEngine, InterviewSetup, Sender, SessionStore};

struct ScriptedBackend {
    replies: parking_lot::Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: parking_lot::Mutex::new(
                replies.iter().map(|r| r.to_string()).collect(),
            ),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        _messages: Vec<GroqMessage>,
        _model: &str,
        _force_json: bool,
    ) -> Result<String, GatewayError> {
        self.replies.lock().pop_front().ok_or(GatewayError::NoChoices)
    }
}

#[tokio::test]
async fn full_session_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = ScriptedBackend::new(&[
        "Walk me through a dashboard you shipped.",
        "Solid answer; quantify the impact next time.",
        r#"{"finalScore":72,"areasOfStrength":["Clear narrative"],"areasToImprove":"Add metrics","suggestedResources":"Storytelling with Data"}"#,
    ]);
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let engine = InterviewEngine::new(backend, store.clone(), "gemma2-9b-it");

    engine.configure(InterviewSetup {
        role: "Data Analyst".to_string(),
        mode: "Behavioral".to_string(),
        domain: None,
        style: Some("STAR-based".to_string()),
    });

    let history = store.watch_all();

    engine.start_interview().await;
    engine
        .submit_answer("I built a churn dashboard for support.")
        .await;
    let id = engine.end_interview().await.expect("session should be saved");

    // The history view saw the insert without being polled.
    assert_eq!(history.borrow().len(), 1);
    let session = store.get(id).unwrap().unwrap();
    assert_eq!(session.role, "Data Analyst");
    assert_eq!(session.chat_history.len(), 3);
    assert_eq!(session.chat_history[1].sender, Sender::User);

    engine.generate_summary(&session).await;
    let summary = engine.summary().borrow().clone().unwrap();
    assert_eq!(summary.final_score, 72);
    assert_eq!(summary.strengths, "- Clear narrative");
    assert_eq!(summary.resources, "Storytelling with Data");

    engine.delete_session(id);
    assert!(history.borrow().is_empty());
    assert!(store.get(id).unwrap().is_none());
}
