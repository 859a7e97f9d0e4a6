// Cd command

use crate::shell::commands::{Command, CommandIo, Flow};

pub struct CdCommand;

impl Command for CdCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        let target = match io.args.first() {
            Some(arg) if arg != "~" => arg.clone(),
            _ => io.env.get("HOME").cloned().unwrap_or_else(|| io.ctx.user.home.clone()),
        };

        let path = io.resolve(&target);
        if io.fs.is_dir(&path) {
            io.ctx.cwd = path;
        } else if io.fs.exists(&path) {
            io.write_err(format!("-bash: cd: {}: Not a directory\n", target));
        } else {
            io.write_err(format!("-bash: cd: {}: No such file or directory\n", target));
        }
        Flow::Exit
    }
}

pub fn cd() -> Box<dyn Command> {
    Box::new(CdCommand)
}
