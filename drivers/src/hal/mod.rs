//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! Traits here are implemented by platform drivers (ATA PIO, eMMC, ...) and
//! by [`crate::ramdisk::RamDisk`], so the filesystem layer never names a
//! concrete controller.
//!
//! # Available Interfaces
//!
//! - [`block_device`]: Block storage device access

pub mod block_device;
