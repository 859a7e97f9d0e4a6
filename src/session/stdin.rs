use crate::terminal::SessionId;
use crate::utils::file_timestamp;
use chrono::Local;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A finished stdin capture, stored under its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub shasum: String,
    pub outfile: PathBuf,
}

/// Raw input of a non-interactive session, staged in the download
/// directory and deduplicated by hash on close.
pub struct StdinCapture {
    store: PathBuf,
    staging: PathBuf,
    file: Option<File>,
}

impl StdinCapture {
    pub fn new(store: &Path, session: &SessionId) -> Self {
        let name = format!(
            "{}-{}-{}-stdin.log",
            file_timestamp(Local::now()),
            session.transport,
            session.channel
        );
        Self { store: store.to_path_buf(), staging: store.join(name), file: None }
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn append(&mut self, data: &[u8]) {
        if self.file.is_none() {
            match open_staging(&self.staging) {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    warn!("Cannot open stdin capture {}: {}", self.staging.display(), e);
                    return;
                }
            }
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(data) {
                warn!("Write to {} failed: {}", self.staging.display(), e);
            }
        }
    }

    /// Move the staged bytes into the store. Nothing is returned when no
    /// input arrived or the store could not be written.
    pub fn finalize(mut self) -> Option<Captured> {
        // Close before renaming
        self.file.take()?;
        match self.store_by_hash() {
            Ok(captured) => Some(captured),
            Err(e) => {
                debug!("Stdin capture {} not stored: {}", self.staging.display(), e);
                None
            }
        }
    }

    fn store_by_hash(&self) -> io::Result<Captured> {
        let contents = fs::read(&self.staging)?;
        let shasum = format!("{:x}", Sha256::digest(&contents));
        let outfile = self.store.join(&shasum);

        if outfile.exists() {
            fs::remove_file(&self.staging)?;
        } else {
            fs::rename(&self.staging, &outfile)?;
        }
        link_alias(&shasum, &outfile, &self.staging)?;
        Ok(Captured { shasum, outfile })
    }
}

fn open_staging(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(unix)]
fn link_alias(shasum: &str, _outfile: &Path, alias: &Path) -> io::Result<()> {
    // Relative, the alias sits next to the canonical file
    std::os::unix::fs::symlink(shasum, alias)
}

#[cfg(not(unix))]
fn link_alias(_shasum: &str, outfile: &Path, alias: &Path) -> io::Result<()> {
    fs::hard_link(outfile, alias)
}
