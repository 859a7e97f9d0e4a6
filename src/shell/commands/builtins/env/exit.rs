// Exit command

use crate::shell::commands::{Command, CommandIo, Flow};

pub struct ExitCommand;

impl Command for ExitCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        io.disconnect();
        Flow::Exit
    }
}

pub fn exit() -> Box<dyn Command> {
    Box::new(ExitCommand)
}
