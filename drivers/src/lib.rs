//! Block Storage Driver Subsystem
//!
//! # Module Organization
//!
//! - [`hal`]: Platform-independent trait definitions
//! - [`ramdisk`]: Memory-backed block device for hosted builds and tests
//!
//! # Usage Example
//!
//! ```no_run
//! use drivers::hal::block_device::{BlockDevice, SECTOR_SIZE};
//! use drivers::ramdisk::RamDisk;
//!
//! let disk = RamDisk::new(64);
//! let mut sector = [0u8; SECTOR_SIZE];
//! disk.read_sector(0, &mut sector)?;
//! # Ok::<(), drivers::hal::block_device::BlockDeviceError>(())
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod hal;
pub mod ramdisk;

// Re-export commonly used types
pub use hal::block_device::{
    BlockDevice, BlockDeviceError, BlockDeviceInfo, DeviceStats, SECTOR_SIZE, Sector,
};
pub use ramdisk::RamDisk;
