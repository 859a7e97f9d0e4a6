use super::{DirEntry, FileKind, FsError, MODE_DIR, MODE_FILE, VirtualFs, has_wildcard, normalize, split_parent};
use glob::Pattern;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct Meta {
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
}

impl Meta {
    fn new(uid: u32, gid: u32, mode: u32) -> Self {
        Self { uid, gid, mode, size: 0 }
    }
}

#[derive(Debug)]
enum Node {
    Dir {
        meta: Meta,
        children: BTreeMap<String, Node>,
    },
    File {
        meta: Meta,
        contents: Vec<u8>,
        realfile: Option<PathBuf>,
    },
}

impl Node {
    fn dir(uid: u32, gid: u32, mode: u32) -> Self {
        Node::Dir { meta: Meta::new(uid, gid, mode), children: BTreeMap::new() }
    }

    fn kind(&self) -> FileKind {
        match self {
            Node::Dir { .. } => FileKind::Directory,
            Node::File { .. } => FileKind::File,
        }
    }

    fn meta(&self) -> &Meta {
        match self {
            Node::Dir { meta, .. } | Node::File { meta, .. } => meta,
        }
    }
}

/// In-memory tree implementing [`VirtualFs`]. Children are kept sorted so
/// listings and wildcard matches come back in a stable order.
#[derive(Debug)]
pub struct MemoryFs {
    root: Node,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self { root: Node::dir(0, 0, MODE_DIR) }
    }

    /// A small Debian-looking tree.
    pub fn skeleton(hostname: &str) -> Self {
        let mut fs = Self::new();
        for dir in [
            "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/proc", "/root", "/sbin", "/tmp",
            "/usr", "/usr/bin", "/usr/sbin", "/usr/local", "/usr/local/bin", "/usr/local/sbin",
            "/var", "/var/log", "/var/tmp",
        ] {
            fs.add_dir(dir);
        }
        fs.add_file(
            "/etc/passwd",
            b"root:x:0:0:root:/root:/bin/bash\n\
              daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
              www-data:x:33:33:www-data:/var/www:/usr/sbin/nologin\n",
        );
        fs.add_file("/etc/group", b"root:x:0:\ndaemon:x:1:\nwww-data:x:33:\n");
        fs.add_file("/etc/hostname", format!("{}\n", hostname).as_bytes());
        fs.add_file("/etc/issue", b"Debian GNU/Linux 11 \\n \\l\n");
        for bin in ["cat", "echo", "mkdir"] {
            fs.add_file(&format!("/bin/{}", bin), b"");
        }
        fs
    }

    /// Create a directory and any missing parents.
    pub fn add_dir(&mut self, path: &str) {
        let path = normalize(path, "/");
        let mut node = &mut self.root;
        for comp in components(&path) {
            let Node::Dir { children, .. } = node else {
                return;
            };
            node = children.entry(comp.to_string()).or_insert_with(|| Node::dir(0, 0, MODE_DIR));
        }
    }

    /// Create a file with static contents, making parents as needed.
    pub fn add_file(&mut self, path: &str, contents: &[u8]) {
        let path = normalize(path, "/");
        let (parent, name) = split_parent(&path);
        self.add_dir(&parent);
        if let Some(Node::Dir { children, .. }) = self.node_mut(&parent) {
            let mut meta = Meta::new(0, 0, MODE_FILE);
            meta.size = contents.len() as u64;
            children.insert(name, Node::File { meta, contents: contents.to_vec(), realfile: None });
        }
    }

    fn node(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for comp in components(path) {
            match node {
                Node::Dir { children, .. } => node = children.get(comp)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for comp in components(path) {
            match node {
                Node::Dir { children, .. } => node = children.get_mut(comp)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Children map of the parent of `path`, with the error bash would give.
    fn parent_dir_mut(&mut self, path: &str) -> Result<(&mut BTreeMap<String, Node>, String), FsError> {
        let (parent, name) = split_parent(path);
        match self.node_mut(&parent) {
            Some(Node::Dir { children, .. }) => Ok((children, name)),
            Some(Node::File { .. }) => Err(FsError::NotADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    pub fn owner(&self, path: &str) -> Option<(u32, u32, u32)> {
        self.node(path).map(|n| {
            let m = n.meta();
            (m.uid, m.gid, m.mode)
        })
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

impl VirtualFs for MemoryFs {
    fn resolve_path_wc(&self, path: &str, cwd: &str) -> Vec<String> {
        if !has_wildcard(path) {
            return Vec::new();
        }
        let normalized = normalize(path, cwd);

        // Walk one component at a time, fanning out on wildcard components.
        let mut found = vec![String::new()];
        for comp in components(&normalized) {
            let mut next = Vec::new();
            for prefix in &found {
                let dir = if prefix.is_empty() { "/" } else { prefix.as_str() };
                if has_wildcard(comp) {
                    let Ok(pattern) = Pattern::new(comp) else {
                        return Vec::new();
                    };
                    if let Some(Node::Dir { children, .. }) = self.node(dir) {
                        for name in children.keys() {
                            if name.starts_with('.') && !comp.starts_with('.') {
                                continue;
                            }
                            if pattern.matches(name) {
                                next.push(format!("{}/{}", prefix, name));
                            }
                        }
                    }
                } else {
                    let candidate = format!("{}/{}", prefix, comp);
                    if self.node(&candidate).is_some() {
                        next.push(candidate);
                    }
                }
            }
            found = next;
            if found.is_empty() {
                break;
            }
        }
        found
    }

    fn exists(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.node(path), Some(Node::Dir { .. }))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        match self.node(path) {
            Some(Node::Dir { children, .. }) => Ok(children
                .iter()
                .map(|(name, node)| DirEntry { name: name.clone(), kind: node.kind() })
                .collect()),
            Some(Node::File { .. }) => Err(FsError::NotADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn mkfile(&mut self, path: &str, uid: u32, gid: u32, mode: u32) -> Result<(), FsError> {
        let (children, name) = self.parent_dir_mut(path)?;
        if let Some(Node::Dir { .. }) = children.get(&name) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        children.insert(
            name,
            Node::File { meta: Meta::new(uid, gid, mode), contents: Vec::new(), realfile: None },
        );
        Ok(())
    }

    fn mkdir(&mut self, path: &str, uid: u32, gid: u32, mode: u32) -> Result<(), FsError> {
        let (children, name) = self.parent_dir_mut(path)?;
        if children.contains_key(&name) {
            return Err(FsError::Exists(path.to_string()));
        }
        children.insert(name, Node::dir(uid, gid, mode));
        Ok(())
    }

    fn update_size(&mut self, path: &str, size: u64) -> Result<(), FsError> {
        match self.node_mut(path) {
            Some(Node::File { meta, .. }) => {
                meta.size = size;
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(FsError::IsADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn size(&self, path: &str) -> Result<u64, FsError> {
        self.node(path)
            .map(|n| n.meta().size)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn update_realfile(&mut self, path: &str, real: &Path) -> Result<(), FsError> {
        match self.node_mut(path) {
            Some(Node::File { realfile, .. }) => {
                *realfile = Some(real.to_path_buf());
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(FsError::IsADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        match self.node(path) {
            Some(Node::File { realfile: Some(real), .. }) => Ok(fs::read(real)?),
            Some(Node::File { contents, .. }) => Ok(contents.clone()),
            Some(Node::Dir { .. }) => Err(FsError::IsADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mkfile_missing_parent() {
        let mut fs = MemoryFs::skeleton("svr04");
        let err = fs.mkfile("/nonexistent/out.txt", 0, 0, MODE_FILE).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert!(fs.mkfile("/tmp/out.txt", 0, 0, MODE_FILE).is_ok());
        assert!(fs.exists("/tmp/out.txt"));
        assert_eq!(fs.size("/tmp/out.txt").unwrap(), 0);
        assert_eq!(fs.owner("/tmp/out.txt"), Some((0, 0, MODE_FILE)));
    }

    #[test]
    fn test_wildcard_expansion() {
        let mut fs = MemoryFs::new();
        fs.add_file("/tmp/a.log", b"a");
        fs.add_file("/tmp/b.log", b"b");
        fs.add_file("/tmp/c.txt", b"c");
        fs.add_file("/tmp/.hidden.log", b"h");

        assert_eq!(fs.resolve_path_wc("*.log", "/tmp"), vec!["/tmp/a.log", "/tmp/b.log"]);
        assert_eq!(fs.resolve_path_wc("/t?p/c.*", "/"), vec!["/tmp/c.txt"]);
        assert!(fs.resolve_path_wc("*.nomatch", "/tmp").is_empty());
        // Plain words are left for the caller.
        assert!(fs.resolve_path_wc("a.log", "/tmp").is_empty());
    }

    #[test]
    fn test_list_dir_sorted() {
        let fs = MemoryFs::skeleton("svr04");
        let names: Vec<_> = fs.list_dir("/etc").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["group", "hostname", "issue", "passwd"]);
        assert!(matches!(fs.list_dir("/etc/passwd"), Err(FsError::NotADirectory(_))));
    }

    #[test]
    fn test_realfile_backing() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("staged");
        std::fs::write(&real, b"captured").unwrap();

        let mut fs = MemoryFs::skeleton("svr04");
        fs.mkfile("/tmp/x", 0, 0, MODE_FILE).unwrap();
        fs.update_realfile("/tmp/x", &real).unwrap();
        assert_eq!(fs.read_file("/tmp/x").unwrap(), b"captured");
    }
}
