//! Read-only FAT32 driver
//!
//! [`Filesystem`] owns the block device and the current directory. The open
//! file handles live in a [`FileDescriptorTable`] that the caller supplies,
//! usually a `static`, and the filesystem borrows it for as long as it is
//! mounted. Kernels with more than one execution context share it through
//! [`SharedFilesystem`].

pub mod bpb;
pub mod chain;
pub mod dir;
pub mod file;
pub mod mbr;
pub mod path;
pub mod read;

pub use bpb::{BiosParameterBlock, MAX_CLUSTER_SIZE, Volume};
pub use chain::ClusterChain;
pub use dir::{Attributes, DirEntry, DirIter, ShortName};
pub use path::{Cursor, MAX_PATH_LEN, ROOT_ALIAS};
pub use read::Usage;

use crate::FsError;
use crate::fd::FileDescriptorTable;
use drivers::BlockDevice;
use spin::{Mutex, MutexGuard};

/// Mount-time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Path under which the root directory is presented
    pub root_alias: &'static str,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            root_alias: ROOT_ALIAS,
        }
    }

    pub const fn root_alias(mut self, alias: &'static str) -> Self {
        self.root_alias = alias;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// A mounted FAT32 volume
pub struct Filesystem<'t, D> {
    dev: D,
    volume: Volume,
    config: Config,
    cwd: Cursor,
    files: &'t mut FileDescriptorTable,
}

impl<'t, D: BlockDevice> Filesystem<'t, D> {
    /// Mount the volume whose boot sector is at `partition_lba`
    pub fn mount(
        dev: D,
        partition_lba: u32,
        files: &'t mut FileDescriptorTable,
    ) -> Result<Self, FsError> {
        Self::mount_with(dev, partition_lba, Config::default(), files)
    }

    /// Mount with `config`. Handles left open in `files` are closed.
    pub fn mount_with(
        dev: D,
        partition_lba: u32,
        config: Config,
        files: &'t mut FileDescriptorTable,
    ) -> Result<Self, FsError> {
        path::validate_alias(config.root_alias)?;
        let volume = Volume::read(&dev, partition_lba)?;
        let cwd = Cursor::new(volume.root_cluster(), config.root_alias)?;
        log::info!(
            "fat32: mounted at lba {}: {} clusters of {} bytes, {} FAT(s) of {} sectors, root cluster {}",
            partition_lba,
            volume.cluster_count,
            volume.bytes_per_cluster,
            volume.bpb.num_fats,
            volume.bpb.sectors_per_fat,
            volume.root_cluster()
        );
        files.close_all();
        Ok(Self {
            dev,
            volume,
            config,
            cwd,
            files,
        })
    }

    /// Find the first FAT32 partition in the MBR and mount it
    pub fn mount_partitioned(
        dev: D,
        config: Config,
        files: &'t mut FileDescriptorTable,
    ) -> Result<Self, FsError> {
        let lba = mbr::find_fat32_partition(&dev)?;
        Self::mount_with(dev, lba, config, files)
    }

    /// Entries of the current directory
    pub fn list(&self) -> DirIter<'_, D> {
        self.read_dir(self.cwd.cluster())
    }

    /// Entries of the directory starting at `cluster`
    pub fn read_dir(&self, cluster: u32) -> DirIter<'_, D> {
        DirIter::new(&self.volume, &self.dev, cluster)
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_dir(&self) -> u32 {
        self.cwd.cluster()
    }

    pub fn current_path(&self) -> &str {
        self.cwd.path()
    }

    pub fn open_files(&self) -> usize {
        self.files.count()
    }

    /// Close every handle and give the device back
    pub fn unmount(self) -> D {
        self.files.close_all();
        self.dev
    }
}

/// A [`Filesystem`] behind a spinlock
///
/// The lock covers the device, the current directory and the handle pool
/// together, so one caller's `cd` cannot interleave with another's read.
pub struct SharedFilesystem<'t, D> {
    inner: Mutex<Filesystem<'t, D>>,
}

impl<'t, D: BlockDevice> SharedFilesystem<'t, D> {
    pub fn new(fs: Filesystem<'t, D>) -> Self {
        Self {
            inner: Mutex::new(fs),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Filesystem<'t, D>> {
        self.inner.lock()
    }

    /// Run `f` with the filesystem locked
    pub fn with<R>(&self, f: impl FnOnce(&mut Filesystem<'t, D>) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    pub fn into_inner(self) -> Filesystem<'t, D> {
        self.inner.into_inner()
    }
}
