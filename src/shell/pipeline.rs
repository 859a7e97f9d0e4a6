use crate::shell::ast::{StageSpec, Token};
use crate::shell::commands::{CommandHandle, CommandTable};
use crate::shell::context::{DEFAULT_PATH, Environment};
use crate::shell::parser::SyntaxError;
use crate::terminal::Terminal;
use crate::vfs::VirtualFs;

pub type RelayId = usize;

/// A resolved pipeline stage.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub args: Vec<String>,
    pub redirect: Option<String>,
    pub handle: CommandHandle,
}

impl CommandSpec {
    pub fn display(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Routes one stage's output: straight to the terminal when it is the
/// tail, otherwise held back for the successor.
pub struct Relay {
    pub spec: CommandSpec,
    next: Option<RelayId>,
    input: Option<Vec<u8>>,
    out: Vec<u8>,
}

impl Relay {
    fn new(spec: CommandSpec, next: Option<RelayId>) -> Self {
        Self { spec, next, input: None, out: Vec::new() }
    }
}

/// The relays of the statement currently executing, plus the environment
/// copy its assignments were applied to.
#[derive(Default)]
pub struct Pipeline {
    pub env: Environment,
    relays: Vec<Relay>,
    head: Option<RelayId>,
}

impl Pipeline {
    /// Resolve every stage and link relays back to front. Returns the name
    /// of the first command that could not be found; in that case nothing
    /// of the pipeline may run.
    pub fn build(
        mut stages: Vec<StageSpec>,
        env: Environment,
        table: &CommandTable,
        fs: &dyn VirtualFs,
        cwd: &str,
    ) -> Result<Self, String> {
        if let Some(first) = stages.first_mut() {
            first.args = expand_wildcards(&first.args, fs, cwd);
        }

        let search_path = env.get("PATH").map(String::as_str).unwrap_or(DEFAULT_PATH);
        let mut resolved = Vec::with_capacity(stages.len());
        for stage in stages.into_iter().rev() {
            let Some(handle) = table.get(&stage.name, search_path, cwd) else {
                return Err(stage.name);
            };
            resolved.push(CommandSpec { name: stage.name, args: stage.args, redirect: stage.redirect, handle });
        }

        let mut pipeline = Pipeline { env, relays: Vec::with_capacity(resolved.len()), head: None };
        // `resolved` is last stage first; each new relay feeds the previous one
        for spec in resolved {
            let id = pipeline.relays.len();
            pipeline.relays.push(Relay::new(spec, pipeline.head));
            pipeline.head = Some(id);
        }
        Ok(pipeline)
    }

    pub fn head(&self) -> Option<RelayId> {
        self.head
    }

    pub fn get(&self, id: RelayId) -> Option<&Relay> {
        self.relays.get(id)
    }

    /// Stages in execution order.
    pub fn stages(&self) -> Vec<&CommandSpec> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let Some(relay) = self.relays.get(id) else {
                break;
            };
            out.push(&relay.spec);
            cursor = relay.next;
        }
        out
    }

    pub fn take_input(&mut self, id: RelayId) -> Option<Vec<u8>> {
        self.relays.get_mut(id).and_then(|r| r.input.take())
    }

    pub fn out_received(&mut self, id: RelayId, data: &[u8], term: &mut dyn Terminal) {
        let Some(relay) = self.relays.get_mut(id) else {
            return;
        };
        relay.out.extend_from_slice(data);
        if relay.next.is_none() {
            term.write(data);
        }
    }

    /// The stage behind `id` closed its output. Hands the buffered stdout to
    /// the successor and returns it so the caller can start it.
    pub fn out_connection_lost(&mut self, id: RelayId) -> Option<RelayId> {
        let relay = self.relays.get_mut(id)?;
        let next = relay.next?;
        let data = std::mem::take(&mut relay.out);
        if let Some(successor) = self.relays.get_mut(next) {
            successor.input = Some(data);
        }
        Some(next)
    }
}

/// Cut a statement (assignments already removed) into stages on `|`.
pub fn split_stages(tokens: Vec<Token>) -> Result<Vec<StageSpec>, SyntaxError> {
    let mut stages = Vec::new();
    let mut current: Vec<Token> = Vec::new();

    for token in tokens {
        if token == Token::Pipe {
            stages.push(stage_from(std::mem::take(&mut current))?);
        } else {
            current.push(token);
        }
    }
    stages.push(stage_from(current)?);
    Ok(stages)
}

fn stage_from(tokens: Vec<Token>) -> Result<StageSpec, SyntaxError> {
    let mut iter = tokens.into_iter();
    let name = match iter.next() {
        Some(Token::Word(name)) => name,
        Some(other) => return Err(SyntaxError::UnexpectedToken(other.as_str().to_string())),
        None => return Err(SyntaxError::UnexpectedToken("|".to_string())),
    };

    let mut args = Vec::new();
    let mut redirect = None;
    while let Some(token) = iter.next() {
        match token {
            Token::Op(op) if op == ">" => {
                // Everything from the redirect on is dropped from the arguments
                match iter.next() {
                    Some(Token::Word(target)) => redirect = Some(target),
                    _ => return Err(SyntaxError::UnexpectedToken("newline".to_string())),
                }
                break;
            }
            other => args.push(other.as_str().to_string()),
        }
    }
    Ok(StageSpec { name, args, redirect })
}

/// Replace each argument that matches files with the matches, in order.
fn expand_wildcards(args: &[String], fs: &dyn VirtualFs, cwd: &str) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len());
    for arg in args {
        let matches = fs.resolve_path_wc(arg, cwd);
        if matches.is_empty() {
            expanded.push(arg.clone());
        } else {
            expanded.extend(matches);
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::commands::builtins::default_table;
    use crate::terminal::{BufferTerminal, SessionId};
    use crate::vfs::MemoryFs;

    fn stage(words: &[&str]) -> StageSpec {
        StageSpec {
            name: words[0].to_string(),
            args: words[1..].iter().map(|s| s.to_string()).collect(),
            redirect: None,
        }
    }

    fn env() -> Environment {
        let mut env = Environment::new();
        env.insert("PATH".into(), "/bin:/usr/bin".into());
        env
    }

    #[test]
    fn test_split_stages() {
        let tokens = vec![
            Token::word("cat"),
            Token::word("a"),
            Token::Pipe,
            Token::word("grep"),
            Token::word("x"),
            Token::Op(">".into()),
            Token::word("/tmp/out"),
            Token::word("ignored"),
        ];
        let stages = split_stages(tokens).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0], stage(&["cat", "a"]));
        assert_eq!(stages[1].name, "grep");
        assert_eq!(stages[1].args, vec!["x"]);
        assert_eq!(stages[1].redirect.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn test_split_stages_errors() {
        assert_eq!(
            split_stages(vec![Token::word("ls"), Token::Pipe]),
            Err(SyntaxError::UnexpectedToken("|".into()))
        );
        assert_eq!(
            split_stages(vec![Token::word("ls"), Token::Op(">".into())]),
            Err(SyntaxError::UnexpectedToken("newline".into()))
        );
        // Other operators are just passed along
        let stages = split_stages(vec![Token::word("sleep"), Token::word("1"), Token::Op("&".into())]).unwrap();
        assert_eq!(stages[0].args, vec!["1", "&"]);
    }

    #[test]
    fn test_build_links_in_order() {
        let table = default_table();
        let fs = MemoryFs::skeleton("svr04");
        let pipeline =
            Pipeline::build(vec![stage(&["echo", "hi"]), stage(&["cat"]), stage(&["cat", "-"])], env(), &table, &fs, "/")
                .unwrap();
        let names: Vec<String> = pipeline.stages().iter().map(|s| s.display()).collect();
        assert_eq!(names, vec!["echo hi", "cat", "cat -"]);
        // Built back to front: the tail was created first
        assert_eq!(pipeline.head(), Some(2));
        assert_eq!(pipeline.get(0).unwrap().next, None);
    }

    #[test]
    fn test_build_fails_on_any_stage() {
        let table = default_table();
        let fs = MemoryFs::skeleton("svr04");
        let err = Pipeline::build(vec![stage(&["echo"]), stage(&["nmap"]), stage(&["cat"])], env(), &table, &fs, "/");
        assert_eq!(err.err(), Some("nmap".to_string()));
    }

    #[test]
    fn test_only_first_stage_globbed() {
        let table = default_table();
        let mut fs = MemoryFs::new();
        fs.add_file("/tmp/a.sh", b"");
        fs.add_file("/tmp/b.sh", b"");
        let pipeline =
            Pipeline::build(vec![stage(&["cat", "*.sh", "-v"]), stage(&["cat", "*.sh"])], env(), &table, &fs, "/tmp")
                .unwrap();
        let stages = pipeline.stages();
        assert_eq!(stages[0].args, vec!["/tmp/a.sh", "/tmp/b.sh", "-v"]);
        assert_eq!(stages[1].args, vec!["*.sh"]);
    }

    #[test]
    fn test_relay_buffers_until_closed() {
        let table = default_table();
        let fs = MemoryFs::skeleton("svr04");
        let mut pipeline =
            Pipeline::build(vec![stage(&["echo"]), stage(&["cat"])], env(), &table, &fs, "/").unwrap();
        let mut term = BufferTerminal::new(SessionId::new("t", "1"));
        let head = pipeline.head().unwrap();

        pipeline.out_received(head, b"hidden\n", &mut term);
        assert_eq!(term.text(), "");

        let next = pipeline.out_connection_lost(head).unwrap();
        assert_eq!(pipeline.take_input(next), Some(b"hidden\n".to_vec()));

        pipeline.out_received(next, b"shown\n", &mut term);
        assert_eq!(term.text(), "shown\n");
        assert_eq!(pipeline.out_connection_lost(next), None);
    }
}
