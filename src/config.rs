use anyhow::{Context, Result, bail};
use colored::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "honeyshell.toml";

#[derive(Debug, Deserialize, Default)]
pub struct HoneyshellConfig {
    #[serde(default)]
    pub honeypot: HoneypotConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HoneypotConfig {
    pub hostname: String,
    pub log_path: PathBuf,
    pub download_path: PathBuf,
    /// Inbound bytes per session before input is cut off, 0 for no limit.
    pub download_limit_size: u64,
    /// JSON lines event log, relative to `log_path`.
    pub event_log: Option<PathBuf>,
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            hostname: "svr04".to_string(),
            log_path: PathBuf::from("var/log"),
            download_path: PathBuf::from("var/lib/downloads"),
            download_limit_size: 0,
            event_log: Some(PathBuf::from("honeyshell.json")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShellConfig {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub home: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self { user: "root".to_string(), uid: 0, gid: 0, home: None }
    }
}

impl ShellConfig {
    pub fn home(&self) -> String {
        match &self.home {
            Some(home) => home.clone(),
            None if self.uid == 0 => "/root".to_string(),
            None => format!("/home/{}", self.user),
        }
    }
}

impl HoneyshellConfig {
    pub fn event_log_path(&self) -> Option<PathBuf> {
        self.honeypot.event_log.as_ref().map(|p| self.honeypot.log_path.join(p))
    }
}

/// Load `honeyshell.toml` from `dir`, falling back to defaults when it is
/// missing, then layer `.env` (or `.env.<HONEYSHELL_ENV>`) over `[env]`.
pub fn load_config(dir: &Path) -> Result<HoneyshellConfig> {
    let config_path = dir.join(CONFIG_FILE);

    // 1. honeyshell.toml (Base Layer)
    let mut config: HoneyshellConfig = if config_path.exists() {
        let content = fs::read_to_string(&config_path).context("Failed to read honeyshell.toml")?;
        toml::from_str(&content).context("Failed to parse honeyshell.toml")?
    } else {
        HoneyshellConfig::default()
    };

    if config.honeypot.hostname.trim().is_empty() {
        bail!("❌ Configuration Error: [honeypot] hostname cannot be empty.");
    }
    if config.shell.user.trim().is_empty() {
        bail!("❌ Configuration Error: [shell] user cannot be empty.");
    }

    // Relative paths are taken from the config directory
    config.honeypot.log_path = resolve(dir, &config.honeypot.log_path);
    config.honeypot.download_path = resolve(dir, &config.honeypot.download_path);

    // 2. .env (Override Layer)
    let env_filename = env::var("HONEYSHELL_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());
    let env_path = dir.join(&env_filename);

    if env_path.exists() {
        eprintln!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());
        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, val) = item?;
            config.env.insert(key, val);
        }
    }

    Ok(config)
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { dir.join(path) }
}
