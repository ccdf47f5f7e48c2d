//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::listener::{ProgressIndicator, ResultListener};
use crate::types::FetchResult;

/// One scripted transport answer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Answer {
    Body(&'static str),
    Status(u16),
    IoError,
}

/// Plays back answers in order, then keeps repeating the last one.
pub(crate) struct Scripted {
    answers: Mutex<VecDeque<Answer>>,
    last: Answer,
    calls: AtomicUsize,
}

impl Scripted {
    pub(crate) fn new(answers: &[Answer]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            last: *answers.last().expect("at least one answer"),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Scripted {
    fn get(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.lock().unwrap().pop_front().unwrap_or(self.last);
        match answer {
            Answer::Body(body) => Ok(HttpResponse::ok(body)),
            Answer::Status(status) => Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: String::new(),
            }),
            Answer::IoError => Err(TransportError::Io("connection refused".into())),
        }
    }
}

/// Everything observable from outside a task, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Show,
    Dismiss,
    Fetched(FetchResult),
    Failed,
}

/// Shared log written by both [`RecordingListener`] and
/// [`RecordingIndicator`] so their relative order can be asserted.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn listener(&self) -> Arc<RecordingListener> {
        Arc::new(RecordingListener(self.clone()))
    }

    pub(crate) fn indicator(&self) -> RecordingIndicator {
        RecordingIndicator(self.clone())
    }

    /// Number of terminal callbacks seen so far.
    pub(crate) fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Fetched(_) | Event::Failed))
            .count()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

pub(crate) struct RecordingListener(Recorder);

impl ResultListener for RecordingListener {
    fn on_response_fetched(&self, result: FetchResult) {
        self.0.push(Event::Fetched(result));
    }

    fn on_request_failed(&self) {
        self.0.push(Event::Failed);
    }
}

pub(crate) struct RecordingIndicator(Recorder);

impl ProgressIndicator for RecordingIndicator {
    fn show(&mut self) {
        self.0.push(Event::Show);
    }

    fn dismiss(&mut self) {
        self.0.push(Event::Dismiss);
    }
}
