use crate::config::load_config;
use crate::events::{Event, EventCollector, EventSink};
use crate::handlers::{build_session, open_events};
use crate::session::SessionKind;
use crate::terminal::{BufferTerminal, SessionId};
use anyhow::{Context, Result};
use colored::*;
use log::warn;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct BatchResult {
    label: String,
    output: String,
    missing: usize,
}

/// Run every script as its own exec session, in parallel. Each line is one
/// command line; a command still waiting for input gets end-of-input.
pub fn handle_batch(config_dir: &Path, scripts: &[PathBuf]) -> Result<()> {
    let config = load_config(config_dir)?;
    let collector = Arc::new(EventCollector::default());
    let events: Arc<dyn EventSink> = Arc::new((open_events(&config)?, collector.clone()));
    let transport = format!("{:x}", std::process::id());

    let results: Vec<Result<BatchResult>> = scripts
        .par_iter()
        .enumerate()
        .map(|(index, script)| {
            let source = fs::read_to_string(script)
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            let id = SessionId::new(transport.clone(), index.to_string());
            let mut session =
                build_session(&config, BufferTerminal::new(id.clone()), SessionKind::Exec, events.clone())?;

            session.connection_made();
            for line in source.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if session.transport().lost {
                    break;
                }
                session.transport_mut().ended = false;
                session.exec(line);
                if !session.shell().is_idle() {
                    session.eof_received();
                }
                if !session.transport().ended && !session.transport().lost {
                    warn!("{}: `{}` still running after end of input", script.display(), line);
                }
            }
            session.connection_lost();

            let missing = collector
                .for_session(&id.to_string())
                .iter()
                .filter(|e| matches!(e, Event::CommandFailed { .. }))
                .count();
            Ok(BatchResult { label: script.display().to_string(), output: session.transport().text(), missing })
        })
        .collect();

    let mut failures = 0;
    for result in results {
        match result {
            Ok(batch) => {
                let label = format!("[{}]", batch.label);
                for line in batch.output.lines() {
                    println!("{} {}", label.cyan().bold(), line);
                }
                if batch.missing > 0 {
                    println!("{} {} {} command(s) not found", label.cyan().bold(), "⚠️".yellow(), batch.missing);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {:#}", "❌".red(), e);
            }
        }
    }

    let recorded = collector.events();
    let found = recorded.iter().filter(|e| matches!(e, Event::CommandSuccess { .. })).count();
    let missing = recorded.iter().filter(|e| matches!(e, Event::CommandFailed { .. })).count();
    eprintln!(
        "{} {} session(s): {} command(s) dispatched, {} not found, {} failed",
        "📊".blue(),
        scripts.len(),
        found.to_string().green(),
        missing.to_string().yellow(),
        failures.to_string().red()
    );
    Ok(())
}
