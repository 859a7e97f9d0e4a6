pub mod batch;
pub mod exec;
pub mod replay;
pub mod shell;

use crate::config::HoneyshellConfig;
use crate::events::EventSink;
use crate::logger::EventLogger;
use crate::session::{Session, SessionKind, SessionSettings};
use crate::shell::Interpreter;
use crate::shell::commands::builtins::default_table;
use crate::shell::context::{ShellContext, User};
use crate::terminal::{SessionId, Terminal};
use crate::vfs::MemoryFs;
use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

/// This process's own stdout as the remote end.
pub struct StdioTerminal {
    id: SessionId,
    pub ended: bool,
    pub lost: bool,
}

impl StdioTerminal {
    pub fn new(id: SessionId) -> Self {
        Self { id, ended: false, lost: false }
    }

    pub fn finished(&self) -> bool {
        self.ended || self.lost
    }
}

impl Terminal for StdioTerminal {
    fn write(&mut self, data: &[u8]) {
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(data).and_then(|_| out.flush()) {
            warn!("stdout write failed: {}", e);
        }
    }

    fn session_id(&self) -> SessionId {
        self.id.clone()
    }

    fn process_ended(&mut self) {
        self.ended = true;
    }

    fn lose_connection(&mut self) {
        self.lost = true;
    }
}

pub fn open_events(config: &HoneyshellConfig) -> Result<EventLogger> {
    EventLogger::new(config.event_log_path().as_deref())
}

/// Wire a fresh shell, filesystem and recorder to `transport`.
pub fn build_session<T: Terminal>(
    config: &HoneyshellConfig,
    transport: T,
    kind: SessionKind,
    events: Arc<dyn EventSink>,
) -> Result<Session<T>> {
    let honeypot = &config.honeypot;
    fs::create_dir_all(&honeypot.download_path)
        .with_context(|| format!("Failed to create download directory {}", honeypot.download_path.display()))?;

    let user = User {
        name: config.shell.user.clone(),
        uid: config.shell.uid,
        gid: config.shell.gid,
        home: config.shell.home(),
    };
    let mut vfs = MemoryFs::skeleton(&honeypot.hostname);
    vfs.add_dir(&user.home);

    let ctx = ShellContext::new(user, &honeypot.hostname, config.env.clone(), Arc::new(default_table()));
    let shell = Interpreter::new(
        ctx,
        Box::new(vfs),
        honeypot.download_path.clone(),
        events.clone(),
        kind == SessionKind::Interactive,
    );
    let settings = SessionSettings {
        log_path: honeypot.log_path.clone(),
        download_path: honeypot.download_path.clone(),
        download_limit: honeypot.download_limit_size,
    };
    Ok(Session::new(transport, shell, kind, settings, events))
}
