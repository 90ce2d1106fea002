//! Whole-file reads, directory serialization and free-space accounting

use super::Filesystem;
use super::bpb::{FAT_ENTRIES_PER_SECTOR, le32};
use super::dir::DirEntry;
use crate::FsError;
use drivers::{BlockDevice, SECTOR_SIZE};

/// Cluster usage of the mounted volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total_clusters: u32,
    pub free_clusters: u32,
    pub bytes_per_cluster: u32,
}

impl Usage {
    pub fn used_clusters(&self) -> u32 {
        self.total_clusters - self.free_clusters
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_clusters as u64 * self.bytes_per_cluster as u64
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_clusters() as u64 * self.bytes_per_cluster as u64
    }

    pub fn total_mib(&self) -> u64 {
        self.total_bytes() >> 20
    }

    pub fn used_mib(&self) -> u64 {
        self.used_bytes() >> 20
    }
}

impl<D: BlockDevice> Filesystem<'_, D> {
    /// Read a whole file into `buf`
    ///
    /// Copies `min(file size, buf.len())` bytes and returns that count. A
    /// chain shorter than the file's size is [`FsError::IncompleteRead`].
    pub fn read_file(&self, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let entry = self.lookup(path)?;
        if entry.is_dir() {
            return Err(FsError::NotAFile);
        }
        self.read_entry(&entry, buf)
    }

    /// Size in bytes of the file at `path`
    pub fn file_size(&self, path: &str) -> Result<u32, FsError> {
        let entry = self.lookup(path)?;
        if entry.is_dir() {
            return Err(FsError::NotAFile);
        }
        Ok(entry.size)
    }

    /// Serialize a directory listing or read a file
    ///
    /// A directory becomes one `name\n` line per entry. If the listing does
    /// not fit, `buf` is left untouched and [`FsError::BufferTooSmall`] is
    /// returned. Anything else is read like [`read_file`](Self::read_file).
    pub fn read_path(&self, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let dir = match self.resolve_dir(path) {
            Ok(cursor) => cursor,
            Err(FsError::NotFound) => return self.read_file(path, buf),
            Err(err) => return Err(err),
        };

        let mut needed = 0;
        for entry in self.read_dir(dir.cluster()) {
            needed += entry?.name.len() + 1;
        }
        if needed > buf.len() {
            return Err(FsError::BufferTooSmall);
        }

        let mut written = 0;
        for entry in self.read_dir(dir.cluster()) {
            let entry = entry?;
            let name = entry.name.as_bytes();
            if written + name.len() + 1 > buf.len() {
                return Err(FsError::BufferTooSmall);
            }
            buf[written..written + name.len()].copy_from_slice(name);
            buf[written + name.len()] = b'\n';
            written += name.len() + 1;
        }
        Ok(written)
    }

    /// Count free clusters by scanning the first FAT
    pub fn usage(&self) -> Result<Usage, FsError> {
        let max = self.volume.max_cluster();
        let mut free = 0;
        let mut sector = [0u8; SECTOR_SIZE];
        let fat_sectors = max / FAT_ENTRIES_PER_SECTOR + 1;
        for s in 0..fat_sectors {
            self.dev.read_sector(self.volume.fat_start + s, &mut sector)?;
            let first = s * FAT_ENTRIES_PER_SECTOR;
            for i in 0..FAT_ENTRIES_PER_SECTOR {
                let cluster = first + i;
                if cluster < 2 || cluster > max {
                    continue;
                }
                if le32(&sector, i as usize * 4) & 0x0FFF_FFFF == 0 {
                    free += 1;
                }
            }
        }
        Ok(Usage {
            total_clusters: self.volume.cluster_count,
            free_clusters: free,
            bytes_per_cluster: self.volume.bytes_per_cluster,
        })
    }

    pub(crate) fn read_entry(&self, entry: &DirEntry, buf: &mut [u8]) -> Result<usize, FsError> {
        let want = (entry.size as usize).min(buf.len());
        if want == 0 {
            return Ok(0);
        }
        let mut sector = [0u8; SECTOR_SIZE];
        let mut copied = 0;
        for cluster in self.volume.chain(&self.dev, entry.cluster) {
            let lba = self.volume.cluster_to_lba(cluster?);
            for s in 0..self.volume.sectors_per_cluster() {
                self.dev.read_sector(lba + s, &mut sector)?;
                let n = (want - copied).min(SECTOR_SIZE);
                buf[copied..copied + n].copy_from_slice(&sector[..n]);
                copied += n;
                if copied == want {
                    return Ok(copied);
                }
            }
        }
        log::warn!(
            "fat32: chain of {:?} ends after {} of {} bytes",
            entry.name.as_str(),
            copied,
            want
        );
        Err(FsError::IncompleteRead)
    }
}
