use crate::logger::strip_ansi;
use crate::session::recorder::{Direction, Op, Record, read_log};
use anyhow::{Context, Result};
use colored::*;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

// Long idle gaps are not worth waiting out
const MAX_PAUSE: Duration = Duration::from_secs(3);

pub fn handle_replay(log: &Path, dump: bool, realtime: bool) -> Result<()> {
    let records = read_log(log).with_context(|| format!("Failed to read session log {}", log.display()))?;

    let mut out = io::stdout().lock();
    let mut previous: Option<&Record> = None;
    for record in &records {
        if realtime {
            if let Some(prev) = previous {
                let gap = (record.time() - prev.time()).to_std().unwrap_or_default();
                thread::sleep(gap.min(MAX_PAUSE));
            }
        }
        previous = Some(record);

        if dump {
            writeln!(out, "{}", describe(record))?;
        } else if record.op == Op::Write && record.direction == Direction::Output {
            out.write_all(&record.data)?;
            out.flush()?;
        }
    }

    if dump {
        let input: usize = records.iter().filter(|r| r.direction == Direction::Input).map(|r| r.data.len()).sum();
        let output: usize = records.iter().filter(|r| r.direction == Direction::Output).map(|r| r.data.len()).sum();
        writeln!(
            out,
            "{} {} record(s), {} byte(s) in, {} byte(s) out",
            "📼".cyan(),
            records.len(),
            input,
            output
        )?;
    }
    Ok(())
}

fn describe(record: &Record) -> String {
    let stamp = record.time().format("%Y-%m-%d %H:%M:%S%.6f").to_string().dimmed();
    let tag = match (record.op, record.direction) {
        (Op::Open, _) => "OPEN ".green().bold(),
        (Op::Close, _) => "CLOSE".red().bold(),
        (Op::Write, Direction::Input) => "IN   ".yellow().bold(),
        (Op::Write, Direction::Output) => "OUT  ".blue().bold(),
        (Op::Write, Direction::None) => "WRITE".normal(),
    };
    if record.data.is_empty() {
        return format!("{} {}", stamp, tag);
    }
    let text = String::from_utf8_lossy(&record.data);
    format!("{} {} {:>5} {:?}", stamp, tag, record.data.len(), strip_ansi(&text))
}
