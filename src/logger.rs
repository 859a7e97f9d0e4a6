use crate::events::{Event, EventSink};
use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use regex::Regex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{LazyLock, Mutex};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|[\x00-\x08\x0b-\x1f\x7f]").unwrap());

/// Remove terminal escapes and control bytes so attacker input can't mess
/// with whoever tails the log.
pub fn strip_ansi(content: &str) -> String {
    ANSI_ESCAPE.replace_all(content, "").to_string()
}

/// Production event sink: every event goes through `log`, and optionally
/// to a JSON-lines file.
pub struct EventLogger {
    file: Option<Mutex<File>>,
}

impl EventLogger {
    pub fn new(json_path: Option<&Path>) -> Result<Self> {
        let file = match json_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).context("Failed to create event log directory")?;
                }
                let f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open event log: {}", path.display()))?;
                Some(Mutex::new(f))
            }
            None => None,
        };
        Ok(Self { file })
    }

    fn json_line(session: &str, event: &Event) -> Option<String> {
        let mut value = serde_json::to_value(event).ok()?;
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".into(), Value::String(Local::now().to_rfc3339()));
            map.insert("session".into(), Value::String(session.to_string()));
        }
        serde_json::to_string(&value).ok()
    }
}

impl EventSink for EventLogger {
    fn emit(&self, session: &str, event: Event) {
        info!(target: "honeyshell::event", "[{}] {}", session, strip_ansi(&event.message()));

        let Some(file) = &self.file else {
            return;
        };
        let Some(line) = Self::json_line(session, &event) else {
            return;
        };
        match file.lock() {
            Ok(mut f) => {
                if let Err(e) = writeln!(f, "{}", line) {
                    warn!("Failed to write event {}: {}", event.id(), e);
                }
            }
            Err(_) => warn!("Event log lock poisoned, dropping {}", event.id()),
        }
    }
}
