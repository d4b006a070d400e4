//! Status events reported to whoever presents the transmission log

use std::sync::{Arc, Mutex};

/// Semantic tag a presentation layer may render differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Warning,
    Error,
    /// Emphasised text such as the message being sent or session banners
    Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub kind: LogKind,
    pub message: String,
}

impl LogEvent {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn highlight(message: impl Into<String>) -> Self {
        Self::new(LogKind::Highlight, message)
    }
}

/// Receiver of status events.
///
/// Called from the caller's thread during encoding and from the playback
/// monitor thread afterwards, so implementations must be thread safe.
pub trait EventSink: Send + Sync {
    fn report(&self, event: LogEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn report(&self, event: LogEvent) {
        match event.kind {
            LogKind::Info | LogKind::Highlight => log::info!("{}", event.message),
            LogKind::Warning => log::warn!("{}", event.message),
            LogKind::Error => log::error!("{}", event.message),
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl EventSink for MemorySink {
    fn report(&self, event: LogEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn report(&self, event: LogEvent) {
        (**self).report(event)
    }
}
