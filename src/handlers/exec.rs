use crate::config::load_config;
use crate::handlers::{StdioTerminal, build_session, open_events};
use crate::session::SessionKind;
use crate::terminal::SessionId;
use anyhow::{Result, bail};
use log::{debug, warn};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Non-interactive session: run `command`, stream our stdin into it until
/// the command line finishes or stdin runs dry.
pub fn handle_exec(config_dir: &Path, command: &[String]) -> Result<()> {
    let line = command.join(" ");
    if line.trim().is_empty() {
        bail!("Nothing to execute");
    }

    let config = load_config(config_dir)?;
    let events = Arc::new(open_events(&config)?);
    let id = SessionId::new(format!("{:x}", std::process::id()), "0");
    let mut session = build_session(&config, StdioTerminal::new(id), SessionKind::Exec, events)?;

    session.connection_made();
    session.exec(&line);

    let mut stdin = io::stdin();
    let mut buf = [0u8; 4096];
    while !session.transport().finished() {
        match stdin.read(&mut buf) {
            Ok(0) => {
                debug!("stdin closed");
                session.eof_received();
                break;
            }
            Ok(n) => session.data_received(&buf[..n]),
            Err(e) => {
                warn!("stdin read failed: {}", e);
                session.eof_received();
                break;
            }
        }
    }

    session.connection_lost();
    Ok(())
}
