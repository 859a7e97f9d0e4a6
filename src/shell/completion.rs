use crate::utils::common_prefix;
use crate::vfs::{DirEntry, FileKind, VirtualFs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    // Nothing matched, leave the line alone
    None,
    Replace(String),
    // Ambiguous and already at the common prefix: show the candidates
    List { entries: Vec<DirEntry>, line: String },
}

/// Complete the last word of `line` against the virtual filesystem.
pub fn complete(line: &str, cwd: &str, fs: &dyn VirtualFs) -> Completion {
    if line.is_empty() {
        return Completion::None;
    }

    let (head, clue) = if line.ends_with(' ') {
        (line, "")
    } else {
        match line.rfind(' ') {
            Some(i) => line.split_at(i + 1),
            None => ("", line),
        }
    };

    let (basedir, basename) = match clue.rfind('/') {
        Some(i) => clue.split_at(i + 1),
        None => ("", clue),
    };

    let listing = if basedir.is_empty() { cwd.to_string() } else { fs.resolve_path(basedir, cwd) };
    let Ok(entries) = fs.list_dir(&listing) else {
        return Completion::None;
    };
    let mut files: Vec<DirEntry> = entries.into_iter().filter(|e| e.name.starts_with(basename)).collect();

    match files.len() {
        0 => Completion::None,
        1 => {
            let entry = files.remove(0);
            let suffix = if entry.kind == FileKind::Directory { '/' } else { ' ' };
            Completion::Replace(format!("{}{}{}{}", head, basedir, entry.name, suffix))
        }
        _ => {
            let prefix = if basename.is_empty() {
                String::new()
            } else {
                common_prefix(&files.iter().map(|e| e.name.as_str()).collect::<Vec<_>>())
            };
            let extended = format!("{}{}{}", head, basedir, prefix);
            if extended == line {
                Completion::List { entries: files, line: extended }
            } else {
                Completion::Replace(extended)
            }
        }
    }
}

/// Lay names out in fixed-width columns that fit `width`.
pub fn columns(names: &[&str], width: usize) -> String {
    let Some(longest) = names.iter().map(|n| n.chars().count()).max() else {
        return String::new();
    };
    let cell = longest + 1;
    let per_line = (width / (cell + 1)).max(1);

    let mut out = String::from("\n");
    for (i, name) in names.iter().enumerate() {
        if i > 0 && i % per_line == 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:<cell$}", name, cell = cell));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    fn fs() -> MemoryFs {
        let mut fs = MemoryFs::skeleton("svr04");
        fs.add_file("/root/notes.txt", b"");
        fs.add_file("/root/nmap.tgz", b"");
        fs
    }

    #[test]
    fn test_single_file_gets_space() {
        assert_eq!(
            complete("cat /etc/pas", "/root", &fs()),
            Completion::Replace("cat /etc/passwd ".into())
        );
    }

    #[test]
    fn test_single_dir_gets_slash() {
        assert_eq!(complete("cd /us", "/", &fs()), Completion::Replace("cd /usr/".into()));
        assert_eq!(complete("cd /usr/lo", "/", &fs()), Completion::Replace("cd /usr/local/".into()));
    }

    #[test]
    fn test_relative_to_cwd() {
        assert_eq!(complete("cat no", "/root", &fs()), Completion::Replace("cat notes.txt ".into()));
    }

    #[test]
    fn test_ambiguous_extends_then_lists() {
        let fs = fs();
        assert_eq!(complete("ls /etc/gr", "/", &fs), Completion::Replace("ls /etc/group ".into()));
        match complete("ls /root/n", "/", &fs) {
            Completion::List { entries, line } => {
                assert_eq!(line, "ls /root/n");
                let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(names, vec!["nmap.tgz", "notes.txt"]);
            }
            other => panic!("expected listing, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_clue_keeps_line() {
        match complete("cat ", "/root", &fs()) {
            Completion::List { line, entries } => {
                assert_eq!(line, "cat ");
                assert_eq!(entries.len(), 2);
            }
            other => panic!("expected listing, got {:?}", other),
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(complete("cat /etc/zzz", "/", &fs()), Completion::None);
        assert_eq!(complete("", "/", &fs()), Completion::None);
        assert_eq!(complete("cat /nonexistent/x", "/", &fs()), Completion::None);
    }

    #[test]
    fn test_columns() {
        assert_eq!(columns(&["a", "bb", "ccc"], 80), "\na   bb  ccc \n");
        assert_eq!(columns(&["aaaa", "bbbb", "cccc"], 12), "\naaaa bbbb \ncccc \n");
        assert_eq!(columns(&[], 80), "");
    }
}
