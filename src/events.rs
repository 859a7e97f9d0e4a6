use serde::Serialize;

/// Structured notifications raised by a session. The backend that stores
/// them is pluggable through [`EventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "eventid")]
pub enum Event {
    #[serde(rename = "honeyshell.command.input")]
    CommandInput { input: String },
    #[serde(rename = "honeyshell.command.success")]
    CommandSuccess { input: String },
    #[serde(rename = "honeyshell.command.failed")]
    CommandFailed { input: String },
    #[serde(rename = "honeyshell.log.open")]
    LogOpened { ttylog: String },
    #[serde(rename = "honeyshell.log.closed")]
    LogClosed { ttylog: String, size: u64, duration: f64 },
    #[serde(rename = "honeyshell.session.file_download")]
    FileCaptured { url: String, outfile: String, shasum: String },
}

impl Event {
    pub fn id(&self) -> &'static str {
        match self {
            Event::CommandInput { .. } => "honeyshell.command.input",
            Event::CommandSuccess { .. } => "honeyshell.command.success",
            Event::CommandFailed { .. } => "honeyshell.command.failed",
            Event::LogOpened { .. } => "honeyshell.log.open",
            Event::LogClosed { .. } => "honeyshell.log.closed",
            Event::FileCaptured { .. } => "honeyshell.session.file_download",
        }
    }

    /// One-line human readable form.
    pub fn message(&self) -> String {
        match self {
            Event::CommandInput { input } => format!("CMD: {}", input),
            Event::CommandSuccess { input } => format!("Command found: {}", input),
            Event::CommandFailed { input } => format!("Command not found: {}", input),
            Event::LogOpened { ttylog } => format!("Opening TTY Log: {}", ttylog),
            Event::LogClosed { ttylog, duration, .. } => {
                format!("Closing TTY Log: {} after {} seconds", ttylog, duration.round() as u64)
            }
            Event::FileCaptured { outfile, .. } => format!("Saved stdin contents to {}", outfile),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, session: &str, event: Event);
}

/// Keeps every event in memory; used by the batch runner summary and tests.
#[derive(Default)]
pub struct EventCollector {
    events: std::sync::Mutex<Vec<(String, Event)>>,
}

impl EventCollector {
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|v| v.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    pub fn for_session(&self, session: &str) -> Vec<Event> {
        self.events
            .lock()
            .map(|v| v.iter().filter(|(s, _)| s == session).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, session: &str, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push((session.to_string(), event));
        }
    }
}

/// Fan an event out to several sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&self, session: &str, event: Event) {
        self.0.emit(session, event.clone());
        self.1.emit(session, event);
    }
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, session: &str, event: Event) {
        (**self).emit(session, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_id() {
        let value = serde_json::to_value(Event::CommandFailed { input: "foo -x".into() }).unwrap();
        assert_eq!(value["eventid"], "honeyshell.command.failed");
        assert_eq!(value["input"], "foo -x");
    }

    #[test]
    fn test_collector_filters_by_session() {
        let sink = EventCollector::default();
        sink.emit("a", Event::CommandInput { input: "ls".into() });
        sink.emit("b", Event::CommandInput { input: "id".into() });
        assert_eq!(sink.for_session("b"), vec![Event::CommandInput { input: "id".into() }]);
        assert_eq!(sink.events().len(), 2);
    }
}
