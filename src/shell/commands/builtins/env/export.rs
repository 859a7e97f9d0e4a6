use crate::shell::commands::{Command, CommandIo, Flow};
use crate::utils::split_assignment;

/// Unlike `NAME=value cmd`, this changes the session environment.
pub struct ExportCommand;

impl Command for ExportCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        if io.args.is_empty() {
            let mut keys: Vec<&String> = io.ctx.env.keys().collect();
            keys.sort();
            let listing: String = keys
                .into_iter()
                .map(|k| format!("declare -x {}=\"{}\"\n", k, io.ctx.env[k]))
                .collect();
            io.write(listing);
            return Flow::Exit;
        }

        for arg in io.args {
            match split_assignment(arg) {
                Some((key, value)) => {
                    io.ctx.env.insert(key, value);
                }
                None if arg.contains('=') => {
                    io.write_err(format!("-bash: export: `{}': not a valid identifier\n", arg));
                }
                None => {}
            }
        }
        Flow::Exit
    }
}

pub fn export() -> Box<dyn Command> {
    Box::new(ExportCommand)
}
