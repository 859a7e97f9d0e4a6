use crate::config::load_config;
use crate::handlers::{StdioTerminal, build_session, open_events};
use crate::session::SessionKind;
use crate::terminal::{SessionId, Terminal};
use anyhow::{Context, Result};
use colored::*;
use log::debug;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

enum Input {
    Data(Vec<u8>),
    Eof,
}

/// Local interactive session. The controlling terminal stays in cooked
/// mode, so it does the echo and line editing itself.
pub fn handle_shell(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let events = Arc::new(open_events(&config)?);

    let id = SessionId::new(format!("{:x}", std::process::id()), "0");
    let mut session = build_session(&config, StdioTerminal::new(id), SessionKind::Interactive, events)?;
    session.shell_mut().set_echo(false);

    let (tx, rx) = mpsc::channel();
    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        // Forward as the byte a remote terminal would send
        let _ = interrupt.send(Input::Data(vec![0x03]));
    })
    .context("Failed to install Ctrl-C handler")?;

    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => {
                    let _ = tx.send(Input::Eof);
                    break;
                }
                Ok(n) => {
                    if tx.send(Input::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
            }
        }
    });

    eprintln!("{} Session {} started, {} to leave", "🍯".yellow(), session.transport().session_id().to_string().bold(), "exit".cyan());
    session.connection_made();

    while let Ok(input) = rx.recv() {
        match input {
            Input::Data(data) => session.data_received(&data),
            Input::Eof => {
                debug!("stdin closed");
                session.eof_received();
                break;
            }
        }
        if session.transport().finished() {
            break;
        }
    }

    session.connection_lost();
    eprintln!("\n{} Session closed.", "👋".cyan());
    Ok(())
}
