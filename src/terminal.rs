use std::fmt;

/// Identity of one channel on one transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    pub transport: String,
    pub channel: String,
}

impl SessionId {
    pub fn new(transport: impl Into<String>, channel: impl Into<String>) -> Self {
        Self { transport: transport.into(), channel: channel.into() }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.transport, self.channel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// What the shell needs from the remote end.
pub trait Terminal {
    fn write(&mut self, data: &[u8]);

    fn session_id(&self) -> SessionId;

    fn window_size(&self) -> WindowSize {
        WindowSize::default()
    }

    fn cursor_backward(&mut self) {
        self.write(b"\x1b[D");
    }

    fn delete_character(&mut self) {
        self.write(b"\x1b[P");
    }

    /// A non-interactive session ran out of statements.
    fn process_ended(&mut self) {}

    /// The emulated user logged out.
    fn lose_connection(&mut self) {}
}

/// Terminal that keeps everything in memory.
#[derive(Debug, Clone)]
pub struct BufferTerminal {
    pub id: SessionId,
    pub output: Vec<u8>,
    pub size: WindowSize,
    pub ended: bool,
    pub lost: bool,
}

impl BufferTerminal {
    pub fn new(id: SessionId) -> Self {
        Self { id, output: Vec::new(), size: WindowSize::default(), ended: false, lost: false }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear(&mut self) {
        self.output.clear();
    }
}

impl Terminal for BufferTerminal {
    fn write(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data);
    }

    fn session_id(&self) -> SessionId {
        self.id.clone()
    }

    fn window_size(&self) -> WindowSize {
        self.size
    }

    fn process_ended(&mut self) {
        self.ended = true;
    }

    fn lose_connection(&mut self) {
        self.lost = true;
    }
}
