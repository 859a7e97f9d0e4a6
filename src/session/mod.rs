pub mod keys;
pub mod recorder;
pub mod stdin;

use crate::events::{Event, EventSink};
use crate::shell::Interpreter;
use crate::terminal::{SessionId, Terminal, WindowSize};
use crate::utils::file_timestamp;
use chrono::Local;
use keys::KeyDecoder;
use log::{info, warn};
use recorder::{Direction, SessionLog};
use std::path::PathBuf;
use std::sync::Arc;
use stdin::StdinCapture;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Interactive,
    Exec,
}

impl SessionKind {
    // Suffix of the tty log name
    fn tag(self) -> char {
        match self {
            SessionKind::Interactive => 'i',
            SessionKind::Exec => 'e',
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub log_path: PathBuf,
    pub download_path: PathBuf,
    /// Inbound byte ceiling, 0 for none.
    pub download_limit: u64,
}

/// The transport as the shell sees it: every write is recorded first.
pub struct Port<T> {
    inner: T,
    log: Option<SessionLog>,
}

impl<T: Terminal> Terminal for Port<T> {
    fn write(&mut self, data: &[u8]) {
        if let Some(log) = self.log.as_mut() {
            log.write(Direction::Output, data);
        }
        self.inner.write(data);
    }

    fn session_id(&self) -> SessionId {
        self.inner.session_id()
    }

    fn window_size(&self) -> WindowSize {
        self.inner.window_size()
    }

    fn process_ended(&mut self) {
        self.inner.process_ended();
    }

    fn lose_connection(&mut self) {
        self.inner.lose_connection();
    }
}

/// One channel of one connection: recorder, stdin capture and shell glued
/// to a transport.
pub struct Session<T: Terminal> {
    port: Port<T>,
    shell: Interpreter,
    keys: KeyDecoder,
    // Exec input not yet ended by a newline
    carry: Vec<u8>,
    kind: SessionKind,
    settings: SessionSettings,
    stdin: Option<StdinCapture>,
    events: Arc<dyn EventSink>,
    received: u64,
    closed: bool,
}

impl<T: Terminal> Session<T> {
    pub fn new(
        transport: T,
        shell: Interpreter,
        kind: SessionKind,
        settings: SessionSettings,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            port: Port { inner: transport, log: None },
            shell,
            keys: KeyDecoder::new(),
            carry: Vec::new(),
            kind,
            settings,
            stdin: None,
            events,
            received: 0,
            closed: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.port.inner
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.port.inner
    }

    pub fn shell(&self) -> &Interpreter {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut Interpreter {
        &mut self.shell
    }

    fn session_key(&self) -> String {
        self.port.session_id().to_string()
    }

    /// Open the tty log and, for exec sessions, the stdin capture. An
    /// interactive session then shows its first prompt.
    pub fn connection_made(&mut self) {
        let id = self.port.session_id();
        let name = format!("{}-{}-{}{}.log", file_timestamp(Local::now()), id.transport, id.channel, self.kind.tag());
        let path = self.settings.log_path.join("tty").join(name);

        match SessionLog::open(&path) {
            Ok(log) => {
                self.port.log = Some(log);
                self.events.emit(&id.to_string(), Event::LogOpened { ttylog: path.display().to_string() });
            }
            Err(e) => warn!("{:#}", e),
        }

        if self.kind == SessionKind::Exec {
            self.stdin = Some(StdinCapture::new(&self.settings.download_path, &id));
        }

        if self.kind == SessionKind::Interactive {
            self.shell.show_prompt(&mut self.port);
        }
    }

    /// Run the command line an exec request carried.
    pub fn exec(&mut self, command: &str) {
        self.shell.exec(command, &mut self.port);
    }

    /// Bytes from the remote end.
    pub fn data_received(&mut self, data: &[u8]) {
        if self.closed {
            return;
        }
        self.received += data.len() as u64;
        if self.settings.download_limit > 0 && self.received > self.settings.download_limit {
            warn!("Data upload limit reached for {}", self.session_key());
            self.eof_received();
            return;
        }

        match self.stdin.as_mut() {
            Some(capture) => capture.append(data),
            None => {
                if let Some(log) = self.port.log.as_mut() {
                    log.write(Direction::Input, data);
                }
            }
        }

        match self.kind {
            SessionKind::Interactive => {
                for key in self.keys.feed(data) {
                    self.shell.key(key, &mut self.port);
                }
            }
            SessionKind::Exec => self.feed_lines(data),
        }
    }

    // Exec input has no terminal in front of it: bytes are passed on as
    // lines, control characters included.
    fn feed_lines(&mut self, data: &[u8]) {
        self.carry.extend_from_slice(data);
        while let Some(end) = self.carry.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]).into_owned();
            self.shell.line_received(&text, &mut self.port);
        }
    }

    /// The remote end will send nothing more.
    pub fn eof_received(&mut self) {
        if self.closed {
            return;
        }
        if !self.carry.is_empty() {
            let rest = std::mem::take(&mut self.carry);
            self.shell.line_received(&String::from_utf8_lossy(&rest), &mut self.port);
        }
        self.shell.eof_received(&mut self.port);
    }

    /// Finish the stdin capture and the tty log. Safe to call more than
    /// once.
    pub fn connection_lost(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let key = self.session_key();

        if let Some(capture) = self.stdin.take() {
            if let Some(captured) = capture.finalize() {
                self.events.emit(
                    &key,
                    Event::FileCaptured {
                        url: "stdin".to_string(),
                        outfile: captured.outfile.display().to_string(),
                        shasum: captured.shasum,
                    },
                );
            }
        }

        if let Some(log) = self.port.log.take() {
            let summary = log.close();
            self.events.emit(
                &key,
                Event::LogClosed {
                    ttylog: summary.path.display().to_string(),
                    size: summary.size,
                    duration: summary.duration,
                },
            );
        }
        info!("Session {} closed", key);
    }
}
