// Cat command

use crate::shell::commands::{Command, CommandIo, Flow};
use crate::vfs::FsError;

/// `cat FILE...`, `... | cat`, or `cat` echoing typed lines until Ctrl-D.
pub struct CatCommand;

impl Command for CatCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        let files: Vec<String> = io.args.iter().filter(|a| !a.starts_with('-')).cloned().collect();

        if files.is_empty() {
            return match io.input {
                Some(data) => {
                    let data = data.to_vec();
                    io.write(data);
                    Flow::Exit
                }
                None => Flow::Running,
            };
        }

        for name in files {
            let path = io.resolve(&name);
            match io.fs.read_file(&path) {
                Ok(data) => io.write(data),
                Err(FsError::IsADirectory(_)) => io.write_err(format!("cat: {}: Is a directory\n", name)),
                Err(_) => io.write_err(format!("cat: {}: No such file or directory\n", name)),
            }
        }
        Flow::Exit
    }

    fn line_received(&mut self, line: &str, io: &mut CommandIo<'_>) -> Flow {
        io.write(format!("{}\n", line));
        Flow::Running
    }

    fn handle_ctrl_d(&mut self, _io: &mut CommandIo<'_>) -> Flow {
        Flow::Exit
    }
}

pub fn cat() -> Box<dyn Command> {
    Box::new(CatCommand)
}
