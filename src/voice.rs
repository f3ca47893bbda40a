use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Observable state of one voice capture attempt. Reset whenever listening
/// starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub transcript_text: String,
    pub is_listening: bool,
    pub error: Option<String>,
}

/// Recognition failure reported by the platform recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerError {
    /// Client-side hiccup the platform raises spuriously; treated as noise.
    Client,
    Audio,
    Network,
    NetworkTimeout,
    NoMatch,
    Busy,
    Server,
    SpeechTimeout,
    PermissionDenied,
}

impl RecognizerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerError::Client => "client",
            RecognizerError::Audio => "audio",
            RecognizerError::Network => "network",
            RecognizerError::NetworkTimeout => "network timeout",
            RecognizerError::NoMatch => "no match",
            RecognizerError::Busy => "recognizer busy",
            RecognizerError::Server => "server",
            RecognizerError::SpeechTimeout => "speech timeout",
            RecognizerError::PermissionDenied => "insufficient permissions",
        }
    }
}

/// Callback delivered by the platform recognizer. Candidate lists are ordered
/// best-first; only the first candidate is used.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    ReadyForSpeech,
    EndOfSpeech,
    PartialResults(Vec<String>),
    Results(Vec<String>),
    Error(RecognizerError),
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub language: String,
    pub partial_results: bool,
}

/// The externally-owned, callback-driven platform recognizer. Implementations
/// route their callbacks into [`VoiceCapture::handle_event`].
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;
    fn start_listening(&self, request: RecognitionRequest);
    fn stop_listening(&self);
    /// Releases the underlying platform resources.
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Listening,
    Stopped,
    Failed,
}

/// Wraps one recognizer instance as observable [`VoiceState`].
///
/// Each partial or final transcription overwrites the current text
/// (last-write-wins); merging with previously typed text is the caller's
/// job. The adapter owns the recognizer for its own lifetime and cancels it
/// on drop, so a screen that goes away cannot leak the platform handle.
pub struct VoiceCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    state_tx: watch::Sender<VoiceState>,
    phase: Mutex<Phase>,
}

impl VoiceCapture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            state_tx: watch::channel(VoiceState::default()).0,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn state(&self) -> watch::Receiver<VoiceState> {
        self.state_tx.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.state_tx.borrow().is_listening
    }

    pub fn start_listening(&self, language_code: &str) {
        self.state_tx.send_replace(VoiceState::default());

        if !self.recognizer.is_available() {
            warn!("Speech recognition not available on this device");
            *self.phase.lock() = Phase::Failed;
            self.state_tx.send_modify(|state| {
                state.error = Some("Speech recognition not available".to_string());
            });
            return;
        }

        info!("Starting voice capture ({})", language_code);
        *self.phase.lock() = Phase::Listening;
        self.recognizer.start_listening(RecognitionRequest {
            language: language_code.to_string(),
            partial_results: true,
        });
        self.state_tx.send_modify(|state| state.is_listening = true);
    }

    pub fn stop_listening(&self) {
        let mut phase = self.phase.lock();
        if *phase != Phase::Listening {
            return;
        }
        *phase = Phase::Stopped;
        drop(phase);

        self.state_tx.send_modify(|state| state.is_listening = false);
        self.recognizer.stop_listening();
    }

    /// Entry point for recognizer callbacks.
    pub fn handle_event(&self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::ReadyForSpeech => {
                self.state_tx.send_modify(|state| state.error = None);
            }
            RecognizerEvent::EndOfSpeech => {
                let mut phase = self.phase.lock();
                if *phase == Phase::Listening {
                    *phase = Phase::Stopped;
                }
                drop(phase);
                self.state_tx.send_modify(|state| state.is_listening = false);
            }
            RecognizerEvent::PartialResults(candidates)
            | RecognizerEvent::Results(candidates) => {
                if let Some(best) = candidates.into_iter().next() {
                    self.state_tx
                        .send_modify(|state| state.transcript_text = best);
                }
            }
            // The platform fires this one spuriously on cancellation.
            RecognizerEvent::Error(RecognizerError::Client) => {}
            RecognizerEvent::Error(code) => {
                warn!("Speech recognition error: {}", code.as_str());
                *self.phase.lock() = Phase::Failed;
                self.state_tx.send_modify(|state| {
                    state.is_listening = false;
                    state.error = Some(format!("Error: {}", code.as_str()));
                });
            }
        }
    }
}

impl Drop for VoiceCapture {
    fn drop(&mut self) {
        self.recognizer.cancel();
    }
}
