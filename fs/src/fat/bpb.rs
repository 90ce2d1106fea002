//! FAT32 BIOS Parameter Block (BPB)
//!
//! The BPB sits in the first sector of the partition. Only the fields the
//! driver needs are decoded, at their FAT32 offsets:
//!
//! | offset | width | field               |
//! |--------|-------|---------------------|
//! | 11     | 16    | bytes per sector    |
//! | 13     | 8     | sectors per cluster |
//! | 14     | 16    | reserved sectors    |
//! | 16     | 8     | number of FATs      |
//! | 19     | 16    | total sectors (16)  |
//! | 32     | 32    | total sectors (32)  |
//! | 36     | 32    | sectors per FAT     |
//! | 44     | 32    | root cluster        |

use crate::FsError;
use drivers::{BlockDevice, SECTOR_SIZE, Sector};

/// Largest cluster the file handle cache can hold
pub const MAX_CLUSTER_SIZE: usize = 32 * 1024;

/// Sectors in the largest supported cluster
pub const MAX_CLUSTER_SECTORS: usize = MAX_CLUSTER_SIZE / SECTOR_SIZE;

/// FAT entries per FAT sector
pub(crate) const FAT_ENTRIES_PER_SECTOR: u32 = (SECTOR_SIZE / 4) as u32;

pub(crate) fn le16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn le32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiosParameterBlock {
    /// Bytes per sector (must be 512)
    pub bytes_per_sector: u16,
    /// Sectors per cluster
    pub sectors_per_cluster: u8,
    /// Reserved sectors before the first FAT (including the boot sector)
    pub reserved_sectors: u16,
    /// Number of FAT copies
    pub num_fats: u8,
    /// Total sectors, from whichever of the 16/32-bit fields is set
    pub total_sectors: u32,
    /// Sectors per FAT (FAT32 field)
    pub sectors_per_fat: u32,
    /// First cluster of the root directory
    pub root_cluster: u32,
}

impl BiosParameterBlock {
    pub fn parse(sector: &Sector) -> Self {
        let total_16 = le16(sector, 19);
        Self {
            bytes_per_sector: le16(sector, 11),
            sectors_per_cluster: sector[13],
            reserved_sectors: le16(sector, 14),
            num_fats: sector[16],
            total_sectors: if total_16 != 0 {
                total_16 as u32
            } else {
                le32(sector, 32)
            },
            sectors_per_fat: le32(sector, 36),
            root_cluster: le32(sector, 44),
        }
    }

    pub fn validate(&self) -> Result<(), FsError> {
        if self.bytes_per_sector as usize != SECTOR_SIZE {
            log::debug!(
                "fat32: bytes_per_sector {} (expected {})",
                self.bytes_per_sector,
                SECTOR_SIZE
            );
            return Err(FsError::InvalidVolume);
        }
        if self.sectors_per_cluster == 0 {
            log::debug!("fat32: sectors_per_cluster is 0");
            return Err(FsError::InvalidVolume);
        }
        if self.num_fats == 0 {
            log::debug!("fat32: num_fats is 0");
            return Err(FsError::InvalidVolume);
        }
        if self.sectors_per_cluster as usize > MAX_CLUSTER_SECTORS {
            log::debug!(
                "fat32: cluster of {} sectors exceeds {} byte limit",
                self.sectors_per_cluster,
                MAX_CLUSTER_SIZE
            );
            return Err(FsError::InvalidVolume);
        }
        if self.sectors_per_fat == 0 {
            log::debug!("fat32: sectors_per_fat is 0 (FAT12/16 volume?)");
            return Err(FsError::InvalidVolume);
        }
        if self.root_cluster < 2 {
            log::debug!("fat32: root cluster {} below 2", self.root_cluster);
            return Err(FsError::InvalidVolume);
        }
        Ok(())
    }
}

/// Mounted volume geometry
///
/// All LBAs are absolute device addresses, i.e. already offset by the
/// partition start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    pub bpb: BiosParameterBlock,
    /// First sector of the partition
    pub partition_lba: u32,
    /// First sector of the first FAT
    pub fat_start: u32,
    /// First sector of cluster 2
    pub data_start: u32,
    pub bytes_per_cluster: u32,
    /// Number of data clusters; valid cluster numbers are `2..=cluster_count + 1`
    pub cluster_count: u32,
}

impl Volume {
    /// Read and validate the boot sector at `partition_lba`
    pub fn read<D: BlockDevice>(dev: &D, partition_lba: u32) -> Result<Self, FsError> {
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_sector(partition_lba, &mut sector)?;
        Self::from_boot_sector(partition_lba, &sector)
    }

    pub fn from_boot_sector(partition_lba: u32, sector: &Sector) -> Result<Self, FsError> {
        let bpb = BiosParameterBlock::parse(sector);
        bpb.validate()?;

        let spc = bpb.sectors_per_cluster as u32;
        let metadata = (bpb.num_fats as u32)
            .checked_mul(bpb.sectors_per_fat)
            .and_then(|fats| fats.checked_add(bpb.reserved_sectors as u32))
            .ok_or(FsError::InvalidVolume)?;
        let fat_start = partition_lba
            .checked_add(bpb.reserved_sectors as u32)
            .ok_or(FsError::InvalidVolume)?;
        let data_start = partition_lba
            .checked_add(metadata)
            .ok_or(FsError::InvalidVolume)?;
        if bpb.total_sectors <= metadata || partition_lba.checked_add(bpb.total_sectors).is_none() {
            log::debug!(
                "fat32: {} total sectors leave no data region after {}",
                bpb.total_sectors,
                metadata
            );
            return Err(FsError::InvalidVolume);
        }

        let data_clusters = (bpb.total_sectors - metadata) / spc;
        let fat_clusters = bpb
            .sectors_per_fat
            .saturating_mul(FAT_ENTRIES_PER_SECTOR)
            .saturating_sub(2);
        let cluster_count = data_clusters.min(fat_clusters);
        if cluster_count == 0 || bpb.root_cluster > cluster_count + 1 {
            log::debug!(
                "fat32: root cluster {} outside {} data clusters",
                bpb.root_cluster,
                cluster_count
            );
            return Err(FsError::InvalidVolume);
        }

        Ok(Self {
            bpb,
            partition_lba,
            fat_start,
            data_start,
            bytes_per_cluster: spc * SECTOR_SIZE as u32,
            cluster_count,
        })
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.bpb.sectors_per_cluster as u32
    }

    pub fn root_cluster(&self) -> u32 {
        self.bpb.root_cluster
    }

    /// Highest valid cluster number
    pub fn max_cluster(&self) -> u32 {
        self.cluster_count + 1
    }

    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        (2..=self.max_cluster()).contains(&cluster)
    }
}
