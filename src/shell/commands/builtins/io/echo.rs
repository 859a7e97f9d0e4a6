// Echo command

use crate::shell::commands::{Command, CommandIo, Flow};

pub struct EchoCommand;

impl Command for EchoCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        let mut args = io.args;
        let newline = args.first().map(String::as_str) != Some("-n");
        if !newline {
            args = &args[1..];
        }

        let mut output = args.join(" ");
        if newline {
            output.push('\n');
        }
        io.write(output);
        Flow::Exit
    }
}

pub fn echo() -> Box<dyn Command> {
    Box::new(EchoCommand)
}
