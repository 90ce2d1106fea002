//! Open file handles
//!
//! A fixed pool of [`MAX_OPEN_FILES`] slots. Each open file remembers the
//! last cluster it visited and caches that cluster's contents, so sequential
//! and repeated reads do not walk the chain from the start every time.
//!
//! The caches make the table large, so it is built by a `const fn` and is
//! meant to live in static memory. [`Filesystem`](crate::Filesystem) only
//! borrows it.

use crate::FsError;
use crate::fat::bpb::MAX_CLUSTER_SECTORS;
use core::fmt;
use drivers::{SECTOR_SIZE, Sector};

/// Maximum simultaneously open files
pub const MAX_OPEN_FILES: usize = 8;

/// File descriptor number (index into the handle pool)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fd(pub usize);

/// Chain position: the `index`-th cluster of the file is `cluster`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub cluster: u32,
}

/// One slot of the pool
pub struct OpenFile {
    in_use: bool,
    pub(crate) start_cluster: u32,
    pub(crate) size: u32,
    pub(crate) position: Position,
    /// Cluster whose contents are currently in `cache`
    pub(crate) cached_cluster: Option<u32>,
    pub(crate) cache: [Sector; MAX_CLUSTER_SECTORS],
}

impl OpenFile {
    const fn empty() -> Self {
        Self {
            in_use: false,
            start_cluster: 0,
            size: 0,
            position: Position {
                index: 0,
                cluster: 0,
            },
            cached_cluster: None,
            cache: [[0u8; SECTOR_SIZE]; MAX_CLUSTER_SECTORS],
        }
    }

    fn open(&mut self, start_cluster: u32, size: u32) {
        self.in_use = true;
        self.start_cluster = start_cluster;
        self.size = size;
        self.rewind();
    }

    /// Go back to the first cluster and forget the cache
    pub(crate) fn rewind(&mut self) {
        self.position = Position {
            index: 0,
            cluster: self.start_cluster,
        };
        self.cached_cluster = None;
    }

    pub fn is_open(&self) -> bool {
        self.in_use
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn start_cluster(&self) -> u32 {
        self.start_cluster
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFile")
            .field("in_use", &self.in_use)
            .field("start_cluster", &self.start_cluster)
            .field("size", &self.size)
            .field("position", &self.position)
            .field("cached_cluster", &self.cached_cluster)
            .finish()
    }
}

/// The handle pool
pub struct FileDescriptorTable {
    files: [OpenFile; MAX_OPEN_FILES],
}

impl FileDescriptorTable {
    pub const fn new() -> Self {
        Self {
            files: [const { OpenFile::empty() }; MAX_OPEN_FILES],
        }
    }

    /// Claim the lowest free slot
    pub fn alloc(&mut self, start_cluster: u32, size: u32) -> Result<Fd, FsError> {
        for (i, slot) in self.files.iter_mut().enumerate() {
            if !slot.in_use {
                slot.open(start_cluster, size);
                return Ok(Fd(i));
            }
        }
        Err(FsError::TooManyOpenFiles)
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile, FsError> {
        self.files
            .get(fd.0)
            .filter(|f| f.in_use)
            .ok_or(FsError::BadHandle)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile, FsError> {
        self.files
            .get_mut(fd.0)
            .filter(|f| f.in_use)
            .ok_or(FsError::BadHandle)
    }

    /// Release a slot. Closing a free or out-of-range descriptor does nothing.
    pub fn close(&mut self, fd: Fd) {
        if let Some(slot) = self.files.get_mut(fd.0) {
            slot.in_use = false;
        }
    }

    pub fn count(&self) -> usize {
        self.files.iter().filter(|f| f.in_use).count()
    }

    /// Release every slot
    pub fn close_all(&mut self) {
        for slot in self.files.iter_mut() {
            slot.in_use = false;
        }
    }
}

impl Default for FileDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileDescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptorTable")
            .field("open_fds", &self.count())
            .field("capacity", &MAX_OPEN_FILES)
            .finish()
    }
}
