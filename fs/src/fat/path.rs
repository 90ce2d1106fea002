//! Path resolution and the current-directory cursor

use super::Filesystem;
use super::dir::DirEntry;
use crate::FsError;
use drivers::BlockDevice;

/// Default logical name of the root directory
pub const ROOT_ALIAS: &str = "/home";

/// Capacity of a canonical path, in bytes
pub const MAX_PATH_LEN: usize = 256;

pub type PathBuf = heapless::String<MAX_PATH_LEN>;

/// A directory position: its first cluster and its canonical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    cluster: u32,
    path: PathBuf,
}

impl Cursor {
    pub fn new(cluster: u32, alias: &str) -> Result<Self, FsError> {
        let mut path = PathBuf::new();
        path.push_str(alias).map_err(|_| FsError::NameTooLong)?;
        Ok(Self { cluster, path })
    }

    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append a component, adding a separator unless one is already last
    fn push(&mut self, cluster: u32, name: &str) -> Result<(), FsError> {
        let sep = usize::from(!self.path.ends_with('/'));
        if self.path.len() + sep + name.len() > MAX_PATH_LEN {
            return Err(FsError::NameTooLong);
        }
        if sep == 1 {
            self.path.push('/').map_err(|_| FsError::NameTooLong)?;
        }
        self.path.push_str(name).map_err(|_| FsError::NameTooLong)?;
        self.cluster = cluster;
        Ok(())
    }

    /// Drop the last component, never cutting into the first `root_len` bytes
    fn pop(&mut self, cluster: u32, root_len: usize) {
        let cut = match self.path.rfind('/') {
            Some(i) if i >= root_len => i,
            _ => root_len,
        };
        self.path.truncate(cut);
        self.cluster = cluster;
    }
}

/// Reject a root alias that cannot serve as a canonical path prefix
pub fn validate_alias(alias: &str) -> Result<(), FsError> {
    if alias.len() > MAX_PATH_LEN {
        return Err(FsError::NameTooLong);
    }
    if !alias.starts_with('/') || (alias.len() > 1 && alias.ends_with('/')) {
        return Err(FsError::InvalidPath);
    }
    Ok(())
}

/// Split off a leading root reference
///
/// Returns whether the path is absolute and the remainder to walk. The
/// alias only counts as a whole component, so `/homework` is the
/// `homework` entry of the root and not the alias.
pub fn split_root<'p>(path: &'p str, alias: &str) -> (bool, &'p str) {
    if let Some(rest) = path.strip_prefix(alias) {
        if rest.is_empty() || rest.starts_with('/') || alias.ends_with('/') {
            return (true, rest);
        }
    }
    match path.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, path),
    }
}

impl<D: BlockDevice> Filesystem<'_, D> {
    /// Change the current directory
    ///
    /// Walks a copy of the cursor and commits only if every component
    /// resolves, so a failed `cd` leaves the current directory unchanged.
    pub fn cd(&mut self, path: &str) -> Result<(), FsError> {
        let cursor = self.resolve_dir(path)?;
        log::trace!("cd: {} -> {} (cluster {})", path, cursor.path(), cursor.cluster());
        self.cwd = cursor;
        Ok(())
    }

    /// Resolve `path` as a directory without moving the current directory
    pub fn resolve_dir(&self, path: &str) -> Result<Cursor, FsError> {
        let alias = self.config.root_alias;
        let (absolute, rest) = split_root(path, alias);
        let mut cursor = if absolute {
            self.root_cursor()?
        } else {
            self.cwd.clone()
        };
        for segment in rest.split('/') {
            self.step(&mut cursor, segment)?;
        }
        Ok(cursor)
    }

    /// Resolve `path` to a single entry of any kind
    ///
    /// Every component before the last must be a directory. The last one is
    /// matched against files and directories alike.
    pub fn lookup(&self, path: &str) -> Result<DirEntry, FsError> {
        let (dir, name) = match path.rfind('/') {
            Some(i) => (&path[..=i], &path[i + 1..]),
            None => ("", path),
        };
        if name.is_empty() || name == "." || name == ".." {
            return Err(FsError::NotAFile);
        }
        let cursor = self.resolve_dir(dir)?;
        self.find(cursor.cluster(), |entry| entry.matches(name))?
            .ok_or(FsError::NotFound)
    }

    fn root_cursor(&self) -> Result<Cursor, FsError> {
        Cursor::new(self.volume.root_cluster(), self.config.root_alias)
    }

    fn step(&self, cursor: &mut Cursor, segment: &str) -> Result<(), FsError> {
        match segment {
            "" | "." => Ok(()),
            ".." => {
                let root = self.volume.root_cluster();
                if cursor.cluster() == root {
                    return Ok(());
                }
                let parent = self
                    .find(cursor.cluster(), DirEntry::is_dot_dot)?
                    .ok_or(FsError::NotFound)?;
                // `..` records of top-level directories hold 0 for the root.
                let cluster = if parent.cluster == 0 { root } else { parent.cluster };
                cursor.pop(cluster, self.config.root_alias.len());
                log::trace!("cd: up to {} (cluster {})", cursor.path(), cluster);
                Ok(())
            }
            name => {
                let entry = self
                    .find(cursor.cluster(), |e| e.is_dir() && e.matches(name))?
                    .ok_or_else(|| {
                        log::trace!("cd: no directory {:?} in {}", name, cursor.path());
                        FsError::NotFound
                    })?;
                let cluster = if entry.cluster == 0 {
                    self.volume.root_cluster()
                } else {
                    entry.cluster
                };
                cursor.push(cluster, name)
            }
        }
    }

    /// First entry of directory `cluster` accepted by `pred`
    fn find(
        &self,
        cluster: u32,
        mut pred: impl FnMut(&DirEntry) -> bool,
    ) -> Result<Option<DirEntry>, FsError> {
        for entry in self.read_dir(cluster) {
            let entry = entry?;
            if pred(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
