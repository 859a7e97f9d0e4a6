use crate::events::{Event, EventCollector};
use crate::session::keys::Key;
use crate::shell::Interpreter;
use crate::shell::commands::builtins::default_table;
use crate::shell::commands::{Command, CommandIo, CommandTable, Flow};
use crate::shell::context::{Environment, ShellContext, User};
use crate::terminal::{BufferTerminal, SessionId, Terminal};
use crate::vfs::MemoryFs;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    shell: Interpreter,
    term: BufferTerminal,
    events: Arc<EventCollector>,
    _dir: TempDir,
}

impl Harness {
    fn with_table(table: CommandTable, interactive: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(EventCollector::default());
        let ctx = ShellContext::new(User::root(), "svr04", Environment::new(), Arc::new(table));
        let shell = Interpreter::new(
            ctx,
            Box::new(MemoryFs::skeleton("svr04")),
            dir.path().to_path_buf(),
            events.clone(),
            interactive,
        );
        let term = BufferTerminal::new(SessionId::new("T1", "C1"));
        Self { shell, term, events, _dir: dir }
    }

    fn new() -> Self {
        Self::with_table(default_table(), true)
    }

    fn run(&mut self, line: &str) -> String {
        self.term.clear();
        self.shell.line_received(line, &mut self.term);
        self.term.text()
    }

    fn keys(&mut self, keys: &[Key]) -> String {
        self.term.clear();
        for key in keys {
            self.shell.key(*key, &mut self.term);
        }
        self.term.text()
    }

    fn events(&self) -> Vec<Event> {
        self.events.for_session("T1-C1")
    }
}

fn typed(s: &str) -> Vec<Key> {
    s.chars().map(Key::Char).collect()
}

const PROMPT: &str = "root@svr04:~# ";

#[test]
fn test_echo_and_prompt() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo hello   world"), format!("hello world\n{}", PROMPT));
    assert_eq!(h.run("echo 'a  b' \"c\""), format!("a  b c\n{}", PROMPT));
}

#[test]
fn test_unbound_variable_is_omitted() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo a $NOPE b ${NOPE}"), format!("a b\n{}", PROMPT));
    assert_eq!(h.run("echo $HOME ${USER} $?"), format!("/root root 0\n{}", PROMPT));
}

#[test]
fn test_statements_run_in_order() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo one; echo two && echo three || echo four"), format!("one\ntwo\nthree\nfour\n{}", PROMPT));
}

#[test]
fn test_syntax_errors() {
    let mut h = Harness::new();
    assert_eq!(h.run("; echo x"), format!("-bash: syntax error near unexpected token `;'\n{}", PROMPT));
    assert_eq!(h.run("echo 'open"), format!("bash: syntax error: unexpected end of file\n{}", PROMPT));
    // The whole line is discarded, even the part before the error
    assert_eq!(h.run("echo a; ; echo b"), format!("-bash: syntax error near unexpected token `;'\n{}", PROMPT));
}

#[test]
fn test_bad_stage_rejects_whole_line() {
    let mut h = Harness::new();
    assert_eq!(
        h.run("echo a | ; echo after"),
        format!("-bash: syntax error near unexpected token `|'\n{}", PROMPT)
    );
    assert_eq!(
        h.run("echo first; echo a > ; echo after"),
        format!("-bash: syntax error near unexpected token `newline'\n{}", PROMPT)
    );
    assert!(!h.events().iter().any(|e| matches!(e, Event::CommandSuccess { .. })));
}

#[test]
fn test_command_not_found() {
    let mut h = Harness::new();
    assert_eq!(h.run("nmap -sS 10.0.0.1"), format!("bash: nmap: command not found\n{}", PROMPT));
    assert!(h.events().contains(&Event::CommandFailed { input: "nmap -sS 10.0.0.1".into() }));
}

#[test]
fn test_unresolved_stage_abandons_pipeline() {
    let mut h = Harness::new();
    let out = h.run("echo leak | cat | nosuchcmd");
    assert_eq!(out, format!("bash: nosuchcmd: command not found\n{}", PROMPT));

    let events = h.events();
    assert!(events.contains(&Event::CommandFailed { input: "echo leak | cat | nosuchcmd".into() }));
    assert!(!events.iter().any(|e| matches!(e, Event::CommandSuccess { .. })));
}

#[test]
fn test_pipe_feeds_next_stage() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo hi | cat"), format!("hi\n{}", PROMPT));
    assert_eq!(h.run("echo hi | cat | cat"), format!("hi\n{}", PROMPT));

    let events = h.events();
    assert!(events.contains(&Event::CommandInput { input: "echo hi | cat".into() }));
    assert!(events.contains(&Event::CommandSuccess { input: "echo hi".into() }));
    assert!(events.contains(&Event::CommandSuccess { input: "cat".into() }));
}

#[test]
fn test_redirect_then_read_back() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo secret > /tmp/loot"), PROMPT);
    assert_eq!(h.shell.fs().size("/tmp/loot").unwrap(), 7);
    assert_eq!(h.run("cat /tmp/loot"), format!("secret\n{}", PROMPT));
}

#[test]
fn test_redirect_into_missing_directory() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo x > /nope/f"), format!("-bash: /nope/f: No such file or directory\n{}", PROMPT));
    assert!(!h.shell.fs().exists("/nope/f"));
    assert_eq!(std::fs::read_dir(h._dir.path()).unwrap().count(), 0);
}

#[test]
fn test_assignment_is_statement_local() {
    let mut h = Harness::new();
    assert_eq!(h.run("FOO=bar echo x"), format!("x\n{}", PROMPT));
    assert!(!h.shell.context().env.contains_key("FOO"));
    assert_eq!(h.run("FOO=bar"), PROMPT);
    // Expansion happens when the line is read, before export runs
    assert_eq!(h.run("export FOO=baz; echo $FOO"), format!("\n{}", PROMPT));
    assert_eq!(h.run("echo $FOO"), format!("baz\n{}", PROMPT));
}

#[test]
fn test_cd_changes_prompt() {
    let mut h = Harness::new();
    assert_eq!(h.run("cd /tmp"), "root@svr04:/tmp# ");
    assert_eq!(h.run("mkdir -p a/b; cd a/b"), "root@svr04:/tmp/a/b# ");
    assert_eq!(h.run("cd /nope"), "-bash: cd: /nope: No such file or directory\nroot@svr04:/tmp/a/b# ");
    assert_eq!(h.run("cd"), PROMPT);
}

#[test]
fn test_glob_only_first_stage() {
    let mut h = Harness::new();
    h.run("echo a > /tmp/1.sh; echo b > /tmp/2.sh");
    assert_eq!(h.run("echo /tmp/*.sh"), format!("/tmp/1.sh /tmp/2.sh\n{}", PROMPT));
}

#[test]
fn test_interactive_cat_and_ctrl_c() {
    let mut h = Harness::new();
    assert_eq!(h.run("cat"), "");
    assert_eq!(h.run("typed line"), "typed line\n");
    let mut keys = typed("x");
    keys.push(Key::CtrlC);
    assert_eq!(h.keys(&keys), format!("x^C\n{}", PROMPT));
    assert!(h.shell.is_idle());
}

#[test]
fn test_ctrl_d_ends_foreground_then_logs_out() {
    let mut h = Harness::new();
    h.run("cat");
    assert_eq!(h.keys(&[Key::CtrlD]), PROMPT);
    assert!(!h.term.lost);

    assert_eq!(h.keys(&[Key::CtrlD]), "");
    assert!(h.term.lost);
}

#[test]
fn test_exit_stops_remaining_statements() {
    let mut h = Harness::new();
    assert_eq!(h.run("echo bye; exit; echo never"), "bye\n");
    assert!(h.term.lost);
    assert_eq!(h.run("echo ignored"), "");
}

#[test]
fn test_line_editing() {
    let mut h = Harness::new();
    let mut keys = typed("echp");
    keys.push(Key::Backspace);
    keys.extend(typed("o ok"));
    keys.push(Key::Enter);
    assert_eq!(h.keys(&keys), format!("echp\x1b[D\x1b[Po ok\nok\n{}", PROMPT));

    assert_eq!(h.keys(&[Key::CtrlC]), format!("\n{}", PROMPT));
}

#[test]
fn test_tab_completion() {
    let mut h = Harness::new();
    let mut keys = typed("cat /etc/pas");
    keys.push(Key::Tab);
    let out = h.keys(&keys);
    assert!(out.ends_with("cat /etc/passwd "), "{:?}", out);

    let out = h.keys(&[Key::Enter]);
    assert!(out.starts_with("\nroot:x:0:0:root:/root:/bin/bash\n"), "{:?}", out);
}

#[test]
fn test_tab_listing_reprints_line() {
    let mut h = Harness::new();
    let mut keys = typed("ls /etc/");
    keys.push(Key::Tab);
    let out = h.keys(&keys);
    assert!(out.contains("group"));
    assert!(out.contains("passwd"));
    assert!(out.ends_with(&format!("{}ls /etc/", PROMPT)), "{:?}", out);
}

struct Reader {
    seen: Vec<String>,
}

impl Command for Reader {
    fn call(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Running
    }

    fn line_received(&mut self, line: &str, io: &mut CommandIo<'_>) -> Flow {
        if line == "done" {
            io.write(format!("read {}\n", self.seen.join(",")));
            return Flow::Exit;
        }
        self.seen.push(line.to_string());
        Flow::Running
    }
}

fn reader() -> Box<dyn Command> {
    Box::new(Reader { seen: Vec::new() })
}

struct Sleeper;

impl Command for Sleeper {
    fn call(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Running
    }
}

fn sleeper() -> Box<dyn Command> {
    Box::new(Sleeper)
}

#[test]
fn test_running_command_consumes_lines() {
    let mut table = default_table();
    table.register("/usr/bin/reader", reader);
    let mut h = Harness::with_table(table, true);

    assert_eq!(h.run("reader | cat"), "");
    assert_eq!(h.run("one"), "");
    assert_eq!(h.run("two"), "");
    assert_eq!(h.run("done"), format!("read one,two\n{}", PROMPT));
}

#[test]
fn test_type_ahead_runs_after_exit() {
    let mut table = default_table();
    table.register("/bin/sleep", sleeper);
    let mut h = Harness::with_table(table, true);

    assert_eq!(h.run("sleep 5"), "");
    assert_eq!(h.run("echo later"), "");
    assert_eq!(h.keys(&[Key::CtrlC]), format!("^C\nlater\n{}", PROMPT));
}

#[test]
fn test_exec_mode_ends_process() {
    let mut h = Harness::with_table(default_table(), false);
    h.shell.exec("echo a; echo b", &mut h.term);
    assert_eq!(h.term.text(), "a\nb\n");
    assert!(h.term.ended);
    assert!(!h.term.lost);
}

#[test]
fn test_exec_cat_reads_until_eof() {
    let mut h = Harness::with_table(default_table(), false);
    h.shell.exec("cat", &mut h.term);
    assert!(!h.term.ended);
    h.shell.line_received("payload", &mut h.term);
    h.shell.eof_received(&mut h.term);
    assert_eq!(h.term.text(), "payload\n");
    assert!(h.term.ended);
}

#[test]
fn test_long_script_does_not_recurse() {
    let mut h = Harness::with_table(default_table(), false);
    let script = vec!["echo x"; 5000].join("; ");
    h.shell.exec(&script, &mut h.term);
    assert_eq!(h.term.text().lines().count(), 5000);
    assert!(h.term.ended);
}

#[test]
fn test_window_size_used_for_listing() {
    let mut h = Harness::new();
    h.term.size.cols = 10;
    h.run("cd /etc");
    let mut keys = typed("cat ");
    keys.push(Key::Tab);
    let out = h.keys(&keys);
    // One entry per row once the width is exhausted
    assert!(out.contains("\ngroup    \nhostname \n"), "{:?}", out);
    assert_eq!(h.term.session_id().to_string(), "T1-C1");
}
