// Mkdir command

use crate::shell::commands::{Command, CommandIo, Flow};
use crate::vfs::{FsError, MODE_DIR, split_parent};

pub struct MkdirCommand;

impl Command for MkdirCommand {
    fn call(&mut self, io: &mut CommandIo<'_>) -> Flow {
        let mut parents = false;
        let mut paths = Vec::new();

        for arg in io.args {
            if arg == "-p" {
                parents = true;
            } else if arg.starts_with('-') {
                // Ignore other flags
            } else {
                paths.push(arg.clone());
            }
        }

        if paths.is_empty() {
            io.write_err("mkdir: missing operand\nTry 'mkdir --help' for more information.\n");
            return Flow::Exit;
        }

        let (uid, gid) = (io.ctx.user.uid, io.ctx.user.gid);
        for name in paths {
            let path = io.resolve(&name);
            let result = if parents {
                create_all(io, &path, uid, gid)
            } else {
                io.fs.mkdir(&path, uid, gid, MODE_DIR)
            };
            match result {
                Ok(()) => {}
                Err(FsError::Exists(_)) => {
                    io.write_err(format!("mkdir: cannot create directory '{}': File exists\n", name))
                }
                Err(_) => io.write_err(format!(
                    "mkdir: cannot create directory '{}': No such file or directory\n",
                    name
                )),
            }
        }
        Flow::Exit
    }
}

fn create_all(io: &mut CommandIo<'_>, path: &str, uid: u32, gid: u32) -> Result<(), FsError> {
    if path == "/" || io.fs.is_dir(path) {
        return Ok(());
    }
    let (parent, _) = split_parent(path);
    create_all(io, &parent, uid, gid)?;
    io.fs.mkdir(path, uid, gid, MODE_DIR)
}

pub fn mkdir() -> Box<dyn Command> {
    Box::new(MkdirCommand)
}
