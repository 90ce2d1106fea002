//! Memory-backed block device.
//!
//! Holds a whole disk image in memory. Used when the kernel runs hosted and
//! by the filesystem tests, which also rely on the read counters to check
//! how many sectors an operation touched.

use crate::hal::block_device::{
    BlockDevice, BlockDeviceError, BlockDeviceInfo, DeviceStats, SECTOR_SIZE, Sector,
};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

pub struct RamDisk {
    data: Vec<u8>,
    sectors_read: AtomicU64,
    read_errors: AtomicU64,
}

impl RamDisk {
    /// Create a zero-filled disk of `sectors` sectors
    pub fn new(sectors: usize) -> Self {
        Self::from_vec(vec![0u8; sectors * SECTOR_SIZE])
    }

    /// Wrap an existing image. A trailing partial sector is zero-padded.
    pub fn from_vec(mut data: Vec<u8>) -> Self {
        let rem = data.len() % SECTOR_SIZE;
        if rem != 0 {
            data.resize(data.len() + SECTOR_SIZE - rem, 0);
        }
        Self {
            data,
            sectors_read: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn sector_count(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            sectors_read: self.sectors_read.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.sectors_read.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
    }
}

impl BlockDevice for RamDisk {
    fn info(&self) -> BlockDeviceInfo {
        BlockDeviceInfo::new(self.sector_count()).read_only()
    }

    fn read_sector(&self, lba: u32, buffer: &mut Sector) -> Result<(), BlockDeviceError> {
        let start = lba as usize * SECTOR_SIZE;
        match self.data.get(start..start + SECTOR_SIZE) {
            Some(src) => {
                buffer.copy_from_slice(src);
                self.sectors_read.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => {
                log::trace!("ramdisk: read past end at lba {}", lba);
                self.read_errors.fetch_add(1, Ordering::Relaxed);
                Err(BlockDeviceError::InvalidAddress)
            }
        }
    }
}
