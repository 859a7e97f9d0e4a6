use crate::terminal::SessionId;
use crate::utils::{file_timestamp, sanitize_path};
use crate::vfs::VirtualFs;
use chrono::Local;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Real file standing behind a redirect target in the virtual filesystem.
/// Failures to write it are logged and otherwise ignored: the session must
/// carry on as if the redirect worked.
pub struct CaptureFile {
    virtual_path: String,
    staging: PathBuf,
    written: u64,
    file: Option<File>,
}

impl CaptureFile {
    pub fn create(virtual_path: &str, dir: &Path, session: &SessionId) -> Self {
        let name = format!(
            "{}-{}-{}-redir_{}",
            file_timestamp(Local::now()),
            session.transport,
            session.channel,
            sanitize_path(virtual_path)
        );
        let staging = dir.join(name);
        let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&staging) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Cannot create capture file {}: {}", staging.display(), e);
                None
            }
        };
        Self { virtual_path: virtual_path.to_string(), staging, written: 0, file }
    }

    /// Append and keep the virtual size in step with what was written.
    pub fn write(&mut self, data: &[u8], fs: &mut dyn VirtualFs) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(data) {
                warn!("Write to {} failed: {}", self.staging.display(), e);
                return;
            }
        }
        self.written += data.len() as u64;
        if let Err(e) = fs.update_size(&self.virtual_path, self.written) {
            warn!("Cannot update size of {}: {}", self.virtual_path, e);
        }
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{MODE_FILE, MemoryFs};

    #[test]
    fn test_capture_tracks_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = MemoryFs::skeleton("svr04");
        fs.mkfile("/tmp/out.txt", 0, 0, MODE_FILE).unwrap();

        let id = SessionId::new("T1", "C1");
        let mut capture = CaptureFile::create("/tmp/out.txt", dir.path(), &id);
        capture.write(b"abc", &mut fs);
        capture.write(b"de", &mut fs);

        let name = capture.staging().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-T1-C1-redir__tmp_out_txt"), "{}", name);
        assert_eq!(std::fs::read(capture.staging()).unwrap(), b"abcde");
        assert_eq!(fs.size("/tmp/out.txt").unwrap(), 5);
    }

    #[test]
    fn test_unwritable_dir_is_tolerated() {
        let mut fs = MemoryFs::skeleton("svr04");
        fs.mkfile("/tmp/x", 0, 0, MODE_FILE).unwrap();
        let mut capture =
            CaptureFile::create("/tmp/x", Path::new("/nonexistent/capture/dir"), &SessionId::new("a", "b"));
        capture.write(b"hello", &mut fs);
        assert_eq!(fs.size("/tmp/x").unwrap(), 5);
    }
}
