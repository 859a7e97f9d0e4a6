use crate::shell::commands::CommandTable;
use std::collections::HashMap;
use std::sync::Arc;

pub type Environment = HashMap<String, String>;

pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}

impl User {
    pub fn root() -> Self {
        Self { name: "root".to_string(), uid: 0, gid: 0, home: "/root".to_string() }
    }
}

/// Per-session shell state that survives between statements.
#[derive(Clone)]
pub struct ShellContext {
    pub cwd: String,
    pub env: Environment,
    pub user: User,
    pub hostname: String,
    pub registry: Arc<CommandTable>,
}

impl ShellContext {
    pub fn new(user: User, hostname: &str, base_env: Environment, registry: Arc<CommandTable>) -> Self {
        let mut env = base_env;
        env.entry("PATH".to_string()).or_insert_with(|| DEFAULT_PATH.to_string());
        env.entry("HOME".to_string()).or_insert_with(|| user.home.clone());
        env.entry("USER".to_string()).or_insert_with(|| user.name.clone());
        env.entry("LOGNAME".to_string()).or_insert_with(|| user.name.clone());
        env.entry("SHELL".to_string()).or_insert_with(|| "/bin/bash".to_string());

        Self {
            cwd: user.home.clone(),
            env,
            user,
            hostname: hostname.to_string(),
            registry,
        }
    }

    /// `root@svr04:~# `, Debian style.
    pub fn prompt(&self) -> String {
        let home = &self.user.home;
        let cwd = if &self.cwd == home {
            "~".to_string()
        } else if let Some(rest) = self.cwd.strip_prefix(&format!("{}/", home)) {
            format!("~/{}", rest)
        } else {
            self.cwd.clone()
        };
        let sigil = if self.user.uid == 0 { '#' } else { '$' };
        format!("{}@{}:{}{} ", self.user.name, self.hostname, cwd, sigil)
    }
}
