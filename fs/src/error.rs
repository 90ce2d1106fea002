use core::fmt;
use drivers::BlockDeviceError;

/// Filesystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The block device failed a sector read
    Device(BlockDeviceError),
    /// Boot sector does not describe a usable FAT32 volume
    InvalidVolume,
    /// No FAT32 entry in the partition table
    NoPartition,
    /// A path component or name matched no entry
    NotFound,
    /// The entry is a directory where a file was required
    NotAFile,
    /// Cluster chain ended before the declared file size
    IncompleteRead,
    /// Cluster chain points outside the volume or loops
    CorruptChain,
    /// Destination buffer cannot hold the result
    BufferTooSmall,
    /// Every file handle slot is in use
    TooManyOpenFiles,
    /// Path or name does not fit its fixed buffer
    NameTooLong,
    /// Malformed configuration path
    InvalidPath,
    /// Handle is out of range or not open
    BadHandle,
    /// Read offset is at or past the end of the file
    EndOfFile,
}

impl From<BlockDeviceError> for FsError {
    fn from(err: BlockDeviceError) -> Self {
        FsError::Device(err)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Device(err) => write!(f, "device error: {}", err),
            FsError::InvalidVolume => write!(f, "not a valid FAT32 volume"),
            FsError::NoPartition => write!(f, "no FAT32 partition found"),
            FsError::NotFound => write!(f, "no such file or directory"),
            FsError::NotAFile => write!(f, "is a directory"),
            FsError::IncompleteRead => write!(f, "file is shorter on disk than its size"),
            FsError::CorruptChain => write!(f, "corrupt cluster chain"),
            FsError::BufferTooSmall => write!(f, "buffer too small"),
            FsError::TooManyOpenFiles => write!(f, "too many open files"),
            FsError::NameTooLong => write!(f, "name too long"),
            FsError::InvalidPath => write!(f, "invalid path"),
            FsError::BadHandle => write!(f, "bad file handle"),
            FsError::EndOfFile => write!(f, "end of file"),
        }
    }
}
