//! Block Device Hardware Abstraction Layer
//!
//! Generic traits for sector-addressed storage (ATA disks, SD cards, RAM
//! images). Every access is synchronous: a call returns once the sector has
//! been transferred or the device has reported a failure.
//!
//! # Architecture
//!
//! ```text
//! File System Layer (FAT32)
//!           ↓
//! Block Device HAL ← You are here
//!           ↓
//! Platform Drivers (ATA PIO, EMMC, RAM disk)
//! ```

use core::fmt;

/// Sector size in bytes. The only size the filesystem layer supports.
pub const SECTOR_SIZE: usize = 512;

/// One sector worth of bytes
pub type Sector = [u8; SECTOR_SIZE];

/// Block device information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceInfo {
    /// Block size in bytes (always [`SECTOR_SIZE`] for now)
    pub block_size: usize,
    /// Total number of blocks
    pub block_count: u64,
    /// Total capacity in bytes
    pub capacity: u64,
    /// Device is read-only
    pub read_only: bool,
    /// Device is removable (e.g., SD card)
    pub removable: bool,
}

impl BlockDeviceInfo {
    /// Create info for a standard 512-byte block device
    pub const fn new(block_count: u64) -> Self {
        Self {
            block_size: SECTOR_SIZE,
            block_count,
            capacity: block_count * SECTOR_SIZE as u64,
            read_only: false,
            removable: false,
        }
    }

    /// Mark device as read-only
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark device as removable
    pub const fn removable(mut self) -> Self {
        self.removable = true;
        self
    }
}

/// Block device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDeviceError {
    /// Device not initialized or not present
    NotReady,
    /// Invalid block address (out of range)
    InvalidAddress,
    /// Hardware error during read
    ReadError,
    /// Operation timed out
    Timeout,
    /// CRC or checksum error
    DataError,
    /// Device was removed
    DeviceRemoved,
    /// Generic I/O error
    IoError,
}

impl fmt::Display for BlockDeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockDeviceError::NotReady => write!(f, "device not ready"),
            BlockDeviceError::InvalidAddress => write!(f, "block address out of range"),
            BlockDeviceError::ReadError => write!(f, "read error"),
            BlockDeviceError::Timeout => write!(f, "device timed out"),
            BlockDeviceError::DataError => write!(f, "data error"),
            BlockDeviceError::DeviceRemoved => write!(f, "device removed"),
            BlockDeviceError::IoError => write!(f, "I/O error"),
        }
    }
}

/// Block device trait - fundamental storage abstraction
///
/// Reads are by logical block address and always transfer exactly one
/// [`SECTOR_SIZE`] sector per block. There is no retry at this layer; a
/// failed read is reported to the caller as is.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across cores. That
/// says nothing about the callers' own state; see the filesystem's shared
/// wrapper for that.
///
/// # Example
///
/// ```rust
/// use drivers::hal::block_device::{BlockDevice, BlockDeviceError, Sector};
///
/// fn read_mbr<B: BlockDevice>(device: &B) -> Result<Sector, BlockDeviceError> {
///     let mut buf = [0u8; 512];
///     device.read_sector(0, &mut buf)?;
///     Ok(buf)
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// Get device information
    fn info(&self) -> BlockDeviceInfo;

    /// Read a single sector
    ///
    /// # Errors
    /// - `InvalidAddress`: Block address out of range
    /// - `ReadError`: Hardware failure
    fn read_sector(&self, lba: u32, buffer: &mut Sector) -> Result<(), BlockDeviceError>;

    /// Read contiguous sectors starting at `lba`
    ///
    /// Default implementation issues one [`read_sector`](Self::read_sector)
    /// per buffer and stops at the first failure.
    fn read_sectors(&self, lba: u32, buffers: &mut [Sector]) -> Result<(), BlockDeviceError> {
        for (i, buffer) in buffers.iter_mut().enumerate() {
            let block = u32::try_from(i)
                .ok()
                .and_then(|i| lba.checked_add(i))
                .ok_or(BlockDeviceError::InvalidAddress)?;
            self.read_sector(block, buffer)?;
        }
        Ok(())
    }

    /// Check if device is ready
    ///
    /// Returns true if device is initialized and ready for I/O.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn info(&self) -> BlockDeviceInfo {
        (**self).info()
    }

    fn read_sector(&self, lba: u32, buffer: &mut Sector) -> Result<(), BlockDeviceError> {
        (**self).read_sector(lba, buffer)
    }

    fn read_sectors(&self, lba: u32, buffers: &mut [Sector]) -> Result<(), BlockDeviceError> {
        (**self).read_sectors(lba, buffers)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Read counters kept by devices that support them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Number of sectors successfully read
    pub sectors_read: u64,
    /// Number of failed reads
    pub read_errors: u64,
}
