pub mod builtins;

use crate::shell::context::{Environment, ShellContext};
use crate::vfs::{VirtualFs, normalize};
use log::info;
use std::collections::HashMap;

/// Whether a command is done after a callback or keeps the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Exit,
    Running,
}

/// An emulated command. Every callback runs to completion; a command that
/// wants more input returns [`Flow::Running`] and gets later lines through
/// [`Command::line_received`].
pub trait Command: Send {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow;

    fn line_received(&mut self, line: &str, io: &mut CommandIo<'_>) -> Flow {
        info!("QUEUED INPUT: {}", line);
        io.queue_input(line);
        Flow::Running
    }

    fn handle_ctrl_c(&mut self, io: &mut CommandIo<'_>) -> Flow {
        info!("Received CTRL-C, exiting..");
        io.write("^C\n");
        Flow::Exit
    }

    fn handle_ctrl_d(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Running
    }

    fn handle_tab(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Running
    }

    fn resume(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Running
    }
}

/// Constructor stored in the command table.
pub type CommandHandle = fn() -> Box<dyn Command>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Everything a command can see and touch during one callback. Writes are
/// collected in order and routed by the owning instance afterwards.
pub struct CommandIo<'a> {
    pub args: &'a [String],
    pub env: &'a Environment,
    pub ctx: &'a mut ShellContext,
    pub fs: &'a mut dyn VirtualFs,
    pub input: Option<&'a [u8]>,
    pending: &'a mut Vec<String>,
    outputs: Vec<Output>,
    disconnect: bool,
}

impl<'a> CommandIo<'a> {
    pub fn new(
        args: &'a [String],
        env: &'a Environment,
        ctx: &'a mut ShellContext,
        fs: &'a mut dyn VirtualFs,
        input: Option<&'a [u8]>,
        pending: &'a mut Vec<String>,
    ) -> Self {
        Self { args, env, ctx, fs, input, pending, outputs: Vec::new(), disconnect: false }
    }

    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        if !data.is_empty() {
            self.outputs.push(Output::Stdout(data.to_vec()));
        }
    }

    pub fn write_err(&mut self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        if !data.is_empty() {
            self.outputs.push(Output::Stderr(data.to_vec()));
        }
    }

    /// Keep a raw line for later; unread lines become statements once the
    /// command exits.
    pub fn queue_input(&mut self, line: &str) {
        self.pending.push(line.to_string());
    }

    /// Ask the transport to drop the connection once this callback returns.
    pub fn disconnect(&mut self) {
        self.disconnect = true;
    }

    pub fn resolve(&self, path: &str) -> String {
        self.fs.resolve_path(path, &self.ctx.cwd)
    }

    pub fn finish(self) -> (Vec<Output>, bool) {
        (self.outputs, self.disconnect)
    }
}

/// Registered commands keyed by full path (`/bin/echo`) or, for shell
/// builtins, by bare name (`cd`).
#[derive(Default)]
pub struct CommandTable {
    commands: HashMap<String, CommandHandle>,
}

impl CommandTable {
    pub fn register(&mut self, name: &str, handle: CommandHandle) {
        self.commands.insert(name.to_string(), handle);
    }

    /// Resolve a command name the way bash would: builtins first, then a
    /// path if the name has a slash, then each search path entry in order.
    pub fn get(&self, name: &str, search_path: &str, cwd: &str) -> Option<CommandHandle> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            return self.commands.get(&normalize(name, cwd)).copied();
        }
        if let Some(handle) = self.commands.get(name) {
            return Some(*handle);
        }
        search_path
            .split(':')
            .filter(|dir| !dir.is_empty())
            .find_map(|dir| self.commands.get(&format!("{}/{}", dir.trim_end_matches('/'), name)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}
