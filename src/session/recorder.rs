use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every record starts with a header of this size: op, direction, two
/// padding bytes, payload length (u32), seconds (i64), microseconds (u32).
/// All integers are little endian.
pub const HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open = 1,
    Close = 2,
    Write = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None = 0,
    Input = 1,
    Output = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub op: Op,
    pub direction: Direction,
    pub sec: i64,
    pub usec: u32,
    pub data: Vec<u8>,
}

impl Record {
    pub fn time(&self) -> DateTime<Utc> {
        self.usec
            .checked_mul(1000)
            .and_then(|nsec| Utc.timestamp_opt(self.sec, nsec).single())
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("record at offset {0} is truncated")]
    Truncated(usize),
    #[error("unknown record type {op} at offset {offset}")]
    UnknownOp { op: u8, offset: usize },
    #[error("unknown direction {direction} at offset {offset}")]
    UnknownDirection { direction: u8, offset: usize },
    #[error("bad microseconds {usec} at offset {offset}")]
    BadTimestamp { usec: u32, offset: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a closed log leaves behind for the summary event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSummary {
    pub path: PathBuf,
    pub size: u64,
    pub duration: f64,
}

/// Append-only binary transcript of one session.
pub struct SessionLog {
    path: PathBuf,
    file: File,
    opened: DateTime<Local>,
    size: u64,
}

impl SessionLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open session log {}", path.display()))?;

        let mut log = Self { path: path.to_path_buf(), file, opened: Local::now(), size: 0 };
        log.record(Op::Open, Direction::None, &[])
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        Ok(log)
    }

    /// Record a chunk. Failures are logged, the session carries on.
    pub fn write(&mut self, direction: Direction, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        match self.record(Op::Write, direction, data) {
            Ok(()) => self.size += data.len() as u64,
            Err(e) => warn!("Session log {} write failed: {}", self.path.display(), e),
        }
    }

    /// Finish the log. Consumes it so nothing can be written afterwards.
    pub fn close(mut self) -> LogSummary {
        if let Err(e) = self.record(Op::Close, Direction::None, &[]) {
            warn!("Session log {} close failed: {}", self.path.display(), e);
        }
        let elapsed = Local::now() - self.opened;
        LogSummary {
            path: self.path,
            size: self.size,
            duration: elapsed.num_milliseconds() as f64 / 1000.0,
        }
    }

    fn record(&mut self, op: Op, direction: Direction, data: &[u8]) -> std::io::Result<()> {
        let now = Utc::now();
        let mut buf = Vec::with_capacity(HEADER_LEN + data.len());
        buf.push(op as u8);
        buf.push(direction as u8);
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&now.timestamp().to_le_bytes());
        buf.extend_from_slice(&now.timestamp_subsec_micros().to_le_bytes());
        buf.extend_from_slice(data);
        self.file.write_all(&buf)
    }
}

pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>, LogError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let header = bytes.get(offset..offset + HEADER_LEN).ok_or(LogError::Truncated(offset))?;
        let op = match header[0] {
            1 => Op::Open,
            2 => Op::Close,
            3 => Op::Write,
            op => return Err(LogError::UnknownOp { op, offset }),
        };
        let direction = match header[1] {
            0 => Direction::None,
            1 => Direction::Input,
            2 => Direction::Output,
            direction => return Err(LogError::UnknownDirection { direction, offset }),
        };
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut sec = [0u8; 8];
        sec.copy_from_slice(&header[8..16]);
        let usec = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
        if usec >= 1_000_000 {
            return Err(LogError::BadTimestamp { usec, offset });
        }

        let start = offset + HEADER_LEN;
        let data = bytes.get(start..start + len).ok_or(LogError::Truncated(offset))?;
        records.push(Record { op, direction, sec: i64::from_le_bytes(sec), usec, data: data.to_vec() });
        offset = start + len;
    }
    Ok(records)
}

pub fn read_log(path: &Path) -> Result<Vec<Record>, LogError> {
    let bytes = fs::read(path)?;
    parse_records(&bytes)
}
