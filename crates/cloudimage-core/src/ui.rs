//! User-facing output sink

use std::sync::Mutex;

/// Where steps report progress
///
/// `say` announces what a step is about to do, `message` adds detail
/// underneath it, and `error` reports a failure.
pub trait Ui: Send + Sync {
    fn say(&self, message: &str);

    fn message(&self, message: &str);

    fn error(&self, message: &str);
}

/// Routes UI output to `tracing`, for runs without a console.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn message(&self, message: &str) {
        tracing::info!("    {}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Say(String),
    Message(String),
    Error(String),
}

impl UiEvent {
    pub fn text(&self) -> &str {
        match self {
            UiEvent::Say(s) | UiEvent::Message(s) | UiEvent::Error(s) => s,
        }
    }
}

/// Keeps every message in order; used to assert on step output.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Error(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Does any message contain `needle`?
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.text().contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UiEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.lock().push(UiEvent::Say(message.to_string()));
    }

    fn message(&self, message: &str) {
        self.lock().push(UiEvent::Message(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lock().push(UiEvent::Error(message.to_string()));
    }
}
