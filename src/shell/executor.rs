use crate::events::{Event, EventSink};
use crate::session::keys::Key;
use crate::shell::ast::{Statement, Token};
use crate::shell::commands::Flow;
use crate::shell::completion::{Completion, columns, complete};
use crate::shell::context::{Environment, ShellContext};
use crate::shell::instance::{CommandInstance, ExecutionStack, Hook, Workspace};
use crate::shell::parser::{SyntaxError, parse_line};
use crate::shell::pipeline::{Pipeline, RelayId, split_stages};
use crate::terminal::Terminal;
use crate::utils::split_assignment;
use crate::vfs::VirtualFs;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Deferred work. Commands finish by scheduling the next step instead of
/// calling back into the interpreter, so long scripts never grow the call
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    RunNext,
    Start(RelayId),
    Exit,
    Resume,
}

/// Parse a line and check every statement's pipe and redirect layout, so
/// a bad stage rejects the whole line before anything runs.
fn parse_commands(line: &str, env: &Environment) -> Result<Vec<Statement>, SyntaxError> {
    let statements = parse_line(line, env)?;
    for statement in &statements {
        let rest: Vec<Token> = statement
            .tokens
            .iter()
            .skip_while(|t| matches!(t, Token::Word(w) if split_assignment(w).is_some()))
            .cloned()
            .collect();
        if !rest.is_empty() {
            split_stages(rest)?;
        }
    }
    Ok(statements)
}

/// The emulated shell of one session.
pub struct Interpreter {
    ws: Workspace,
    stack: ExecutionStack,
    queue: VecDeque<Statement>,
    steps: VecDeque<Step>,
    interactive: bool,
    echo: bool,
    line: String,
    disconnecting: bool,
    events: Arc<dyn EventSink>,
}

impl Interpreter {
    pub fn new(
        ctx: ShellContext,
        fs: Box<dyn VirtualFs>,
        capture_dir: PathBuf,
        events: Arc<dyn EventSink>,
        interactive: bool,
    ) -> Self {
        Self {
            ws: Workspace { ctx, fs, pipeline: Pipeline::default(), capture_dir },
            stack: ExecutionStack::default(),
            queue: VecDeque::new(),
            steps: VecDeque::new(),
            interactive,
            echo: interactive,
            line: String::new(),
            disconnecting: false,
            events,
        }
    }

    /// Whether typed characters are written back to the terminal.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn context(&self) -> &ShellContext {
        &self.ws.ctx
    }

    pub fn fs(&self) -> &dyn VirtualFs {
        &*self.ws.fs
    }

    /// Nothing running and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty() && self.queue.is_empty() && self.steps.is_empty()
    }

    pub fn show_prompt(&self, term: &mut dyn Terminal) {
        if self.interactive && !self.disconnecting {
            term.write(self.ws.ctx.prompt().as_bytes());
        }
    }

    pub fn key(&mut self, key: Key, term: &mut dyn Terminal) {
        if self.disconnecting {
            return;
        }
        match key {
            Key::Char(c) => {
                self.line.push(c);
                if self.echo {
                    let mut buf = [0u8; 4];
                    term.write(c.encode_utf8(&mut buf).as_bytes());
                }
            }
            Key::Backspace => {
                if self.line.pop().is_some() && self.echo {
                    term.cursor_backward();
                    term.delete_character();
                }
            }
            Key::Enter => {
                if self.echo {
                    term.write(b"\n");
                }
                let line = std::mem::take(&mut self.line);
                self.line_received(&line, term);
            }
            Key::Tab => self.tab(term),
            Key::CtrlC => self.ctrl_c(term),
            Key::CtrlD => self.ctrl_d(term),
        }
    }

    /// A complete line from the remote end. The foreground command gets it
    /// if there is one, otherwise it is parsed as shell input.
    pub fn line_received(&mut self, line: &str, term: &mut dyn Terminal) {
        if self.disconnecting {
            return;
        }
        if let Some(top) = self.stack.top_mut() {
            let flow = top.invoke(Hook::Line(line.to_string()), &mut self.ws, term);
            self.settle(flow, term);
            self.pump(term);
            return;
        }
        if !self.interactive {
            debug!("No command to receive input, dropping line: {}", line);
            return;
        }
        self.submit(line, term);
    }

    /// Run a command line without a prompt; the transport is told when the
    /// last statement has finished.
    pub fn exec(&mut self, command: &str, term: &mut dyn Terminal) {
        self.submit(command, term);
    }

    /// End of input from the remote end.
    pub fn eof_received(&mut self, term: &mut dyn Terminal) {
        info!("received eof, sending ctrl-d to command");
        self.ctrl_d(term);
    }

    fn submit(&mut self, line: &str, term: &mut dyn Terminal) {
        self.emit(term, Event::CommandInput { input: line.to_string() });
        match parse_commands(line, &self.ws.ctx.env) {
            Ok(statements) => {
                self.queue.extend(statements);
                // A foreground command picks the queue up when it exits
                if self.stack.is_empty() {
                    self.steps.push_back(Step::RunNext);
                }
            }
            Err(e) => {
                term.write(format!("{}\n", e).as_bytes());
                self.queue.clear();
                if self.interactive {
                    self.show_prompt(term);
                } else {
                    self.steps.push_back(Step::RunNext);
                }
            }
        }
        self.pump(term);
    }

    fn ctrl_c(&mut self, term: &mut dyn Terminal) {
        self.line.clear();
        if let Some(top) = self.stack.top_mut() {
            let flow = top.invoke(Hook::CtrlC, &mut self.ws, term);
            self.settle(flow, term);
            self.pump(term);
            return;
        }
        term.write(b"\n");
        self.show_prompt(term);
    }

    fn ctrl_d(&mut self, term: &mut dyn Terminal) {
        if self.disconnecting {
            return;
        }
        if let Some(top) = self.stack.top_mut() {
            let flow = top.invoke(Hook::CtrlD, &mut self.ws, term);
            self.settle(flow, term);
            self.pump(term);
            return;
        }

        info!("Received CTRL-D, exiting..");
        let cwd = self.ws.ctx.cwd.clone();
        let Some(handle) = self.ws.ctx.registry.get("exit", "", &cwd) else {
            warn!("No exit command registered");
            return;
        };
        self.stack.push(CommandInstance::detached("exit", handle, &self.ws));
        let flow = match self.stack.top_mut() {
            Some(top) => top.start(&mut self.ws, term),
            None => Flow::Exit,
        };
        self.settle(flow, term);
        self.pump(term);
    }

    fn tab(&mut self, term: &mut dyn Terminal) {
        if let Some(top) = self.stack.top_mut() {
            let flow = top.invoke(Hook::Tab, &mut self.ws, term);
            self.settle(flow, term);
            self.pump(term);
            return;
        }

        match complete(&self.line, &self.ws.ctx.cwd, &*self.ws.fs) {
            Completion::None => {}
            Completion::Replace(line) => {
                self.erase_line(term);
                self.line = line;
                term.write(self.line.as_bytes());
            }
            Completion::List { entries, line } => {
                self.erase_line(term);
                let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                term.write(columns(&names, term.window_size().cols as usize).as_bytes());
                self.show_prompt(term);
                self.line = line;
                term.write(self.line.as_bytes());
            }
        }
    }

    fn erase_line(&self, term: &mut dyn Terminal) {
        for _ in self.line.chars() {
            term.cursor_backward();
            term.delete_character();
        }
    }

    fn pump(&mut self, term: &mut dyn Terminal) {
        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::RunNext => self.run_command(term),
                Step::Start(id) => self.start_stage(id, term),
                Step::Exit => self.exit_top(term),
                Step::Resume => self.resume(term),
            }
        }
    }

    /// Pick up what the foreground callback left behind.
    fn settle(&mut self, flow: Flow, term: &mut dyn Terminal) {
        let disconnect = self.stack.top_mut().map(CommandInstance::take_disconnect).unwrap_or(false);
        if disconnect && !self.disconnecting {
            self.disconnecting = true;
            self.queue.clear();
            term.lose_connection();
        }
        if flow == Flow::Exit {
            self.steps.push_back(Step::Exit);
        }
    }

    fn run_command(&mut self, term: &mut dyn Terminal) {
        if self.disconnecting {
            self.queue.clear();
            return;
        }
        let Some(statement) = self.queue.pop_front() else {
            if self.interactive {
                self.show_prompt(term);
            } else {
                term.process_ended();
            }
            return;
        };
        let text = statement.to_string();

        // Leading NAME=value words only apply to this statement
        let mut env = self.ws.ctx.env.clone();
        let mut tokens = statement.tokens.into_iter().peekable();
        while let Some(Token::Word(word)) = tokens.peek() {
            let Some((key, value)) = split_assignment(word) else {
                break;
            };
            env.insert(key, value);
            tokens.next();
        }
        let rest: Vec<Token> = tokens.collect();
        if rest.is_empty() {
            self.steps.push_back(Step::RunNext);
            return;
        }

        let stages = match split_stages(rest) {
            Ok(stages) => stages,
            Err(e) => {
                term.write(format!("{}\n", e).as_bytes());
                self.queue.clear();
                self.steps.push_back(Step::RunNext);
                return;
            }
        };

        let registry = Arc::clone(&self.ws.ctx.registry);
        match Pipeline::build(stages, env, &registry, &*self.ws.fs, &self.ws.ctx.cwd) {
            Ok(pipeline) => {
                for spec in pipeline.stages() {
                    self.emit(term, Event::CommandSuccess { input: spec.display() });
                }
                let head = pipeline.head();
                self.ws.pipeline = pipeline;
                match head {
                    Some(id) => self.steps.push_back(Step::Start(id)),
                    None => self.steps.push_back(Step::RunNext),
                }
            }
            Err(name) => {
                self.emit(term, Event::CommandFailed { input: text });
                term.write(format!("bash: {}: command not found\n", name).as_bytes());
                self.steps.push_back(Step::RunNext);
            }
        }
    }

    fn start_stage(&mut self, id: RelayId, term: &mut dyn Terminal) {
        let Some(spec) = self.ws.pipeline.get(id).map(|relay| relay.spec.clone()) else {
            self.steps.push_back(Step::Resume);
            return;
        };
        debug!("Starting {}", spec.display());
        let instance = CommandInstance::construct(&spec, id, &mut self.ws, term);
        self.stack.push(instance);
        let flow = match self.stack.top_mut() {
            Some(top) => top.start(&mut self.ws, term),
            None => Flow::Exit,
        };
        self.settle(flow, term);
    }

    /// Pop the foreground command, feed its output to the next stage if
    /// there is one, otherwise hand control back.
    fn exit_top(&mut self, term: &mut dyn Terminal) {
        let Some(mut instance) = self.stack.pop() else {
            return;
        };
        debug!("{} exited", instance.name);

        if !self.disconnecting {
            for line in instance.take_pending() {
                match parse_commands(&line, &self.ws.ctx.env) {
                    Ok(statements) => self.queue.extend(statements),
                    Err(e) => term.write(format!("{}\n", e).as_bytes()),
                }
            }
        }

        match instance.relay().and_then(|id| self.ws.pipeline.out_connection_lost(id)) {
            Some(next) if !self.disconnecting => self.steps.push_back(Step::Start(next)),
            _ => self.steps.push_back(Step::Resume),
        }
    }

    fn resume(&mut self, term: &mut dyn Terminal) {
        match self.stack.top_mut() {
            Some(top) => {
                let flow = top.invoke(Hook::Resume, &mut self.ws, term);
                self.settle(flow, term);
            }
            None => self.steps.push_back(Step::RunNext),
        }
    }

    fn emit(&self, term: &dyn Terminal, event: Event) {
        self.events.emit(&term.session_id().to_string(), event);
    }
}
