//! Handle-based random-access reads

use super::Filesystem;
use super::bpb::Volume;
use crate::FsError;
use crate::fd::{Fd, OpenFile, Position};
use drivers::BlockDevice;

impl<D: BlockDevice> Filesystem<'_, D> {
    /// Open a file for chunked reading
    pub fn open(&mut self, path: &str) -> Result<Fd, FsError> {
        let entry = self.lookup(path)?;
        if entry.is_dir() {
            return Err(FsError::NotAFile);
        }
        self.files.alloc(entry.cluster, entry.size)
    }

    pub fn close(&mut self, fd: Fd) {
        self.files.close(fd);
    }

    /// Read from an open file at byte `offset`
    ///
    /// Returns the number of bytes copied, which is short only at end of
    /// file. An empty `buf` reads nothing and returns `Ok(0)`; an offset at
    /// or past the end is [`FsError::EndOfFile`].
    pub fn read_at(&mut self, fd: Fd, buf: &mut [u8], offset: usize) -> Result<usize, FsError> {
        let file = self.files.get_mut(fd)?;
        read_at(&self.volume, &self.dev, file, buf, offset)
    }
}

fn read_at<D: BlockDevice>(
    vol: &Volume,
    dev: &D,
    file: &mut OpenFile,
    buf: &mut [u8],
    offset: usize,
) -> Result<usize, FsError> {
    if buf.is_empty() {
        return Ok(0);
    }
    let size = file.size as usize;
    if offset >= size {
        return Err(FsError::EndOfFile);
    }
    let end = size.min(offset.saturating_add(buf.len()));
    let cluster_size = vol.bytes_per_cluster as usize;

    let mut pos = offset;
    while pos < end {
        let cluster = seek(vol, dev, file, pos / cluster_size)?;
        load(vol, dev, file, cluster)?;

        let within = pos % cluster_size;
        let n = (cluster_size - within).min(end - pos);
        let cached = &file.cache.as_flattened()[within..within + n];
        buf[pos - offset..pos - offset + n].copy_from_slice(cached);
        pos += n;
    }
    Ok(end - offset)
}

/// Move the handle to its `index`-th cluster
///
/// Chains only go forward, so a target before the current position starts
/// over from the first cluster.
fn seek<D: BlockDevice>(
    vol: &Volume,
    dev: &D,
    file: &mut OpenFile,
    index: usize,
) -> Result<u32, FsError> {
    if index < file.position.index {
        file.rewind();
    }
    if file.position.index == 0 && !vol.is_valid_cluster(file.position.cluster) {
        log::warn!(
            "fat32: file of {} bytes starts at invalid cluster {:#x}",
            file.size,
            file.position.cluster
        );
        return Err(FsError::CorruptChain);
    }
    while file.position.index < index {
        match vol.next_cluster(dev, file.position.cluster)? {
            Some(next) => {
                file.position = Position {
                    index: file.position.index + 1,
                    cluster: next,
                };
            }
            None => {
                log::warn!(
                    "fat32: chain ends after {} clusters, file needs {}",
                    file.position.index + 1,
                    index + 1
                );
                return Err(FsError::IncompleteRead);
            }
        }
    }
    Ok(file.position.cluster)
}

/// Fill the handle cache with `cluster` unless it already holds it
fn load<D: BlockDevice>(
    vol: &Volume,
    dev: &D,
    file: &mut OpenFile,
    cluster: u32,
) -> Result<(), FsError> {
    if file.cached_cluster == Some(cluster) {
        return Ok(());
    }
    let spc = vol.sectors_per_cluster() as usize;
    file.cached_cluster = None;
    dev.read_sectors(vol.cluster_to_lba(cluster), &mut file.cache[..spc])?;
    file.cached_cluster = Some(cluster);
    Ok(())
}
