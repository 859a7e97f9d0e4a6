pub mod env;
pub mod fs;
pub mod io;

use crate::shell::commands::CommandTable;

/// Helper to register all built-in commands at once
pub fn register_all_builtins(table: &mut CommandTable) {
    // Shell builtins, found without a PATH lookup
    table.register("cd", env::cd::cd);
    table.register("export", env::export::export);
    table.register("exit", env::exit::exit);
    table.register("logout", env::exit::exit);

    // IO
    table.register("/bin/echo", io::echo::echo);
    table.register("/bin/cat", io::cat::cat);

    // FS
    table.register("/bin/mkdir", fs::mkdir::mkdir);
}

pub fn default_table() -> CommandTable {
    let mut table = CommandTable::default();
    register_all_builtins(&mut table);
    table
}
