//! Read-only FAT32 filesystem driver.
//!
//! Mounts one FAT32 volume from a [`drivers::BlockDevice`], keeps a current
//! directory cursor, and serves listings, whole-file reads, and pooled
//! random-access file handles. Nothing here allocates.
//!
//! - [`fat`]: on-disk format and the [`Filesystem`] context
//! - [`fd`]: open-file table
//! - [`shell`]: text rendering of results for the console
//!
//! The handle table is too large for a kernel stack. Put it in a `static`
//! and lend it to the mount:
//!
//! ```no_run
//! use drivers::RamDisk;
//! use fs::{Config, FileDescriptorTable, Filesystem};
//! use spin::Mutex;
//!
//! static FILES: Mutex<FileDescriptorTable> = Mutex::new(FileDescriptorTable::new());
//!
//! let disk = RamDisk::from_vec(vec![0; 1 << 20]);
//! let mut files = FILES.lock();
//! let fs = Filesystem::mount_partitioned(&disk, Config::default(), &mut files)?;
//! println!("{}", fs.current_path());
//! # Ok::<(), fs::FsError>(())
//! ```

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod fat;
pub mod fd;
pub mod shell;

pub use error::FsError;
pub use fat::{Config, Filesystem, SharedFilesystem};
pub use fd::{Fd, FileDescriptorTable};
