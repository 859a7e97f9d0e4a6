use crate::shell::capture::CaptureFile;
use crate::shell::commands::{Command, CommandHandle, CommandIo, Flow, Output};
use crate::shell::context::{Environment, ShellContext};
use crate::shell::pipeline::{CommandSpec, Pipeline, RelayId};
use crate::terminal::Terminal;
use crate::vfs::{MODE_FILE, VirtualFs};
use log::{debug, warn};
use std::path::PathBuf;

/// State the running commands share with the interpreter. Kept apart from
/// the execution stack so both can be borrowed at once.
pub struct Workspace {
    pub ctx: ShellContext,
    pub fs: Box<dyn VirtualFs>,
    pub pipeline: Pipeline,
    pub capture_dir: PathBuf,
}

/// Where a command's stdout goes.
pub enum Sink {
    Terminal,
    Relay(RelayId),
    Capture(CaptureFile),
    // Redirect target could not be created
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    Call,
    Line(String),
    CtrlC,
    CtrlD,
    Tab,
    Resume,
}

/// One live command: the behaviour object plus everything bound to it at
/// construction.
pub struct CommandInstance {
    pub name: String,
    args: Vec<String>,
    env: Environment,
    command: Box<dyn Command>,
    stdout: Sink,
    relay: Option<RelayId>,
    input: Option<Vec<u8>>,
    pending: Vec<String>,
    disconnect: bool,
}

impl CommandInstance {
    /// Bind a stage to its relay, creating the redirect target first if
    /// there is one.
    pub fn construct(spec: &CommandSpec, relay: RelayId, ws: &mut Workspace, term: &mut dyn Terminal) -> Self {
        let stdout = match &spec.redirect {
            None => Sink::Relay(relay),
            Some(target) => {
                let path = ws.fs.resolve_path(target, &ws.ctx.cwd);
                match ws.fs.mkfile(&path, 0, 0, MODE_FILE) {
                    Ok(()) => {
                        let capture = CaptureFile::create(&path, &ws.capture_dir, &term.session_id());
                        if capture.is_open() {
                            if let Err(e) = ws.fs.update_realfile(&path, capture.staging()) {
                                warn!("Cannot link {} to {}: {}", path, capture.staging().display(), e);
                            }
                        }
                        Sink::Capture(capture)
                    }
                    Err(e) => {
                        debug!("Redirect to {} failed: {}", path, e);
                        ws.pipeline.out_received(relay, format!("-bash: {}\n", e).as_bytes(), term);
                        Sink::Discard
                    }
                }
            }
        };

        Self {
            name: spec.name.clone(),
            args: spec.args.clone(),
            env: ws.pipeline.env.clone(),
            command: (spec.handle)(),
            stdout,
            relay: Some(relay),
            input: ws.pipeline.take_input(relay),
            pending: Vec::new(),
            disconnect: false,
        }
    }

    /// An instance outside any pipeline, writing straight to the terminal.
    pub fn detached(name: &str, handle: CommandHandle, ws: &Workspace) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            env: ws.ctx.env.clone(),
            command: handle(),
            stdout: Sink::Terminal,
            relay: None,
            input: None,
            pending: Vec::new(),
            disconnect: false,
        }
    }

    pub fn relay(&self) -> Option<RelayId> {
        self.relay
    }

    /// A command whose redirect failed never runs.
    pub fn start(&mut self, ws: &mut Workspace, term: &mut dyn Terminal) -> Flow {
        if matches!(self.stdout, Sink::Discard) {
            return Flow::Exit;
        }
        self.invoke(Hook::Call, ws, term)
    }

    /// Run one callback and route whatever it wrote.
    pub fn invoke(&mut self, hook: Hook, ws: &mut Workspace, term: &mut dyn Terminal) -> Flow {
        let mut io = CommandIo::new(
            &self.args,
            &self.env,
            &mut ws.ctx,
            &mut *ws.fs,
            self.input.as_deref(),
            &mut self.pending,
        );
        let flow = match hook {
            Hook::Call => self.command.call(&mut io),
            Hook::Line(line) => self.command.line_received(&line, &mut io),
            Hook::CtrlC => self.command.handle_ctrl_c(&mut io),
            Hook::CtrlD => self.command.handle_ctrl_d(&mut io),
            Hook::Tab => self.command.handle_tab(&mut io),
            Hook::Resume => self.command.resume(&mut io),
        };
        let (outputs, disconnect) = io.finish();
        self.disconnect |= disconnect;

        for output in outputs {
            match output {
                Output::Stdout(data) => match &mut self.stdout {
                    Sink::Terminal => term.write(&data),
                    Sink::Relay(id) => ws.pipeline.out_received(*id, &data, term),
                    Sink::Capture(capture) => capture.write(&data, &mut *ws.fs),
                    Sink::Discard => {}
                },
                // Errors skip the pipe and the redirect
                Output::Stderr(data) => term.write(&data),
            }
        }
        flow
    }

    pub fn take_disconnect(&mut self) -> bool {
        std::mem::take(&mut self.disconnect)
    }

    /// Lines typed ahead that the command never consumed.
    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}

/// Commands holding the foreground, innermost last.
#[derive(Default)]
pub struct ExecutionStack {
    frames: Vec<CommandInstance>,
}

impl ExecutionStack {
    pub fn push(&mut self, instance: CommandInstance) {
        self.frames.push(instance);
    }

    /// Popping an empty stack does nothing.
    pub fn pop(&mut self) -> Option<CommandInstance> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> Option<&mut CommandInstance> {
        self.frames.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}
