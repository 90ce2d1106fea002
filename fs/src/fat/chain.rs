//! Cluster addressing and FAT chain walking

use super::bpb::{Volume, le32};
use crate::FsError;
use drivers::{BlockDevice, SECTOR_SIZE};

/// FAT entries at or above this value end a chain
pub const END_OF_CHAIN: u32 = 0x0FFF_FFF8;
/// Upper four bits of a FAT32 entry are reserved
const ENTRY_MASK: u32 = 0x0FFF_FFFF;

impl Volume {
    /// First sector of `cluster`. Callers pass valid clusters only.
    pub fn cluster_to_lba(&self, cluster: u32) -> u32 {
        debug_assert!(self.is_valid_cluster(cluster));
        self.data_start + (cluster - 2) * self.sectors_per_cluster()
    }

    /// Raw 28-bit FAT entry for `cluster`
    pub fn fat_entry<D: BlockDevice>(&self, dev: &D, cluster: u32) -> Result<u32, FsError> {
        let offset = cluster as usize * 4;
        let lba = self.fat_start + (offset / SECTOR_SIZE) as u32;
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_sector(lba, &mut sector)?;
        Ok(le32(&sector, offset % SECTOR_SIZE) & ENTRY_MASK)
    }

    /// Successor of `cluster`, or `None` at end of chain
    pub fn next_cluster<D: BlockDevice>(
        &self,
        dev: &D,
        cluster: u32,
    ) -> Result<Option<u32>, FsError> {
        let next = self.fat_entry(dev, cluster)?;
        if next >= END_OF_CHAIN {
            return Ok(None);
        }
        if !self.is_valid_cluster(next) {
            log::warn!("fat32: cluster {} links to invalid cluster {:#x}", cluster, next);
            return Err(FsError::CorruptChain);
        }
        Ok(Some(next))
    }

    /// Lazily walk the chain starting at `start`. Cluster 0 is an empty chain.
    pub fn chain<'a, D: BlockDevice>(&'a self, dev: &'a D, start: u32) -> ClusterChain<'a, D> {
        ClusterChain {
            vol: self,
            dev,
            state: if start == 0 {
                ChainState::Done
            } else {
                ChainState::Start(start)
            },
            visited: 0,
        }
    }
}

enum ChainState {
    Start(u32),
    After(u32),
    Done,
}

/// Forward-only cluster sequence
///
/// The FAT is consulted only when the next cluster is requested, so a
/// caller that stops early never pays for the successor lookup. A chain
/// longer than the volume's cluster count must loop and ends with
/// [`FsError::CorruptChain`].
pub struct ClusterChain<'a, D> {
    vol: &'a Volume,
    dev: &'a D,
    state: ChainState,
    visited: u32,
}

impl<D: BlockDevice> ClusterChain<'_, D> {
    fn fail(&mut self, err: FsError) -> Option<Result<u32, FsError>> {
        self.state = ChainState::Done;
        Some(Err(err))
    }
}

impl<D: BlockDevice> Iterator for ClusterChain<'_, D> {
    type Item = Result<u32, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = match self.state {
            ChainState::Done => return None,
            ChainState::Start(start) => {
                if !self.vol.is_valid_cluster(start) {
                    log::warn!("fat32: chain starts at invalid cluster {:#x}", start);
                    return self.fail(FsError::CorruptChain);
                }
                start
            }
            ChainState::After(prev) => match self.vol.next_cluster(self.dev, prev) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    self.state = ChainState::Done;
                    return None;
                }
                Err(err) => return self.fail(err),
            },
        };

        self.visited += 1;
        if self.visited > self.vol.cluster_count {
            log::warn!("fat32: chain exceeds {} clusters", self.vol.cluster_count);
            return self.fail(FsError::CorruptChain);
        }
        self.state = ChainState::After(cluster);
        Some(Ok(cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivers::RamDisk;

    // One reserved sector, one single-sector FAT at lba 1, data from lba 2.
    fn volume() -> (Volume, RamDisk) {
        let mut boot = [0u8; SECTOR_SIZE];
        boot[11..13].copy_from_slice(&512u16.to_le_bytes());
        boot[13] = 1;
        boot[14..16].copy_from_slice(&1u16.to_le_bytes());
        boot[16] = 1;
        boot[32..36].copy_from_slice(&200u32.to_le_bytes());
        boot[36..40].copy_from_slice(&1u32.to_le_bytes());
        boot[44..48].copy_from_slice(&2u32.to_le_bytes());
        let vol = Volume::from_boot_sector(0, &boot).unwrap();
        (vol, RamDisk::new(200))
    }

    fn link(disk: &mut RamDisk, cluster: u32, value: u32) {
        let at = SECTOR_SIZE + cluster as usize * 4;
        disk.as_bytes_mut()[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn collect(vol: &Volume, disk: &RamDisk, start: u32) -> Result<Vec<u32>, FsError> {
        vol.chain(disk, start).collect()
    }

    #[test]
    fn cluster_addresses_follow_data_start() {
        let (vol, _) = volume();
        assert_eq!(vol.cluster_to_lba(2), 2);
        assert_eq!(vol.cluster_to_lba(7), 7);
    }

    #[test]
    fn walks_until_end_marker() {
        let (vol, mut disk) = volume();
        link(&mut disk, 2, 5);
        link(&mut disk, 5, 3);
        link(&mut disk, 3, 0x0FFF_FFFF);
        assert_eq!(collect(&vol, &disk, 2), Ok(vec![2, 5, 3]));
    }

    #[test]
    fn reserved_high_bits_are_ignored() {
        let (vol, mut disk) = volume();
        link(&mut disk, 2, 0xF000_0004);
        link(&mut disk, 4, 0xFFFF_FFF8);
        assert_eq!(vol.fat_entry(&disk, 2), Ok(4));
        assert_eq!(vol.next_cluster(&disk, 4), Ok(None));
    }

    #[test]
    fn zero_start_is_empty_and_reads_nothing() {
        let (vol, disk) = volume();
        assert_eq!(collect(&vol, &disk, 0), Ok(vec![]));
        assert_eq!(disk.stats().sectors_read, 0);
    }

    #[test]
    fn successor_is_read_lazily() {
        let (vol, mut disk) = volume();
        link(&mut disk, 2, 3);
        let mut chain = vol.chain(&disk, 2);
        assert_eq!(chain.next(), Some(Ok(2)));
        assert_eq!(disk.stats().sectors_read, 0);
        assert_eq!(chain.next(), Some(Ok(3)));
        assert_eq!(disk.stats().sectors_read, 1);
    }

    #[test]
    fn loop_is_reported_as_corrupt() {
        let (vol, mut disk) = volume();
        link(&mut disk, 2, 3);
        link(&mut disk, 3, 2);
        assert_eq!(collect(&vol, &disk, 2), Err(FsError::CorruptChain));
    }

    #[test]
    fn free_entry_mid_chain_is_corrupt() {
        let (vol, mut disk) = volume();
        link(&mut disk, 2, 3);
        assert_eq!(collect(&vol, &disk, 2), Err(FsError::CorruptChain));
    }

    #[test]
    fn out_of_range_start_is_corrupt() {
        let (vol, disk) = volume();
        assert_eq!(collect(&vol, &disk, 1), Err(FsError::CorruptChain));
        assert_eq!(collect(&vol, &disk, vol.max_cluster() + 1), Err(FsError::CorruptChain));
    }
}
