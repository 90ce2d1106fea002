//! Master Boot Record partition table

use super::bpb::le32;
use crate::FsError;
use drivers::{BlockDevice, SECTOR_SIZE, Sector};

/// Offset of the partition table within sector 0
pub const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_ENTRY_SIZE: usize = 16;
pub const PARTITION_COUNT: usize = 4;

/// FAT32 with CHS addressing
pub const TYPE_FAT32_CHS: u8 = 0x0B;
/// FAT32 with LBA addressing
pub const TYPE_FAT32_LBA: u8 = 0x0C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub bootable: bool,
    pub partition_type: u8,
    pub start_lba: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    fn parse(raw: &[u8]) -> Self {
        Self {
            bootable: raw[0] == 0x80,
            partition_type: raw[4],
            start_lba: le32(raw, 8),
            sector_count: le32(raw, 12),
        }
    }

    pub fn is_fat32(&self) -> bool {
        matches!(self.partition_type, TYPE_FAT32_CHS | TYPE_FAT32_LBA)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTable {
    entries: [PartitionEntry; PARTITION_COUNT],
}

impl PartitionTable {
    pub fn parse(mbr: &Sector) -> Self {
        let entries = core::array::from_fn(|i| {
            let start = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
            PartitionEntry::parse(&mbr[start..start + PARTITION_ENTRY_SIZE])
        });
        Self { entries }
    }

    pub fn read<D: BlockDevice>(dev: &D) -> Result<Self, FsError> {
        let mut mbr = [0u8; SECTOR_SIZE];
        dev.read_sector(0, &mut mbr)?;
        Ok(Self::parse(&mbr))
    }

    pub fn entries(&self) -> &[PartitionEntry; PARTITION_COUNT] {
        &self.entries
    }

    /// First slot whose type byte marks FAT32
    pub fn find_fat32(&self) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.is_fat32())
    }
}

/// Scan sector 0 and return the start LBA of the first FAT32 partition
pub fn find_fat32_partition<D: BlockDevice>(dev: &D) -> Result<u32, FsError> {
    let table = PartitionTable::read(dev)?;
    match table.find_fat32() {
        Some(entry) => {
            log::debug!(
                "mbr: FAT32 partition type {:#04x} at lba {}",
                entry.partition_type,
                entry.start_lba
            );
            Ok(entry.start_lba)
        }
        None => {
            log::debug!("mbr: no FAT32 partition in table");
            Err(FsError::NoPartition)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_entry(mbr: &mut Sector, slot: usize, kind: u8, start: u32, count: u32) {
        let base = PARTITION_TABLE_OFFSET + slot * PARTITION_ENTRY_SIZE;
        mbr[base + 4] = kind;
        mbr[base + 8..base + 12].copy_from_slice(&start.to_le_bytes());
        mbr[base + 12..base + 16].copy_from_slice(&count.to_le_bytes());
    }

    #[test]
    fn picks_first_fat32_slot() {
        let mut mbr = [0u8; SECTOR_SIZE];
        put_entry(&mut mbr, 0, 0x83, 2048, 1000);
        put_entry(&mut mbr, 2, TYPE_FAT32_LBA, 4096, 5000);
        put_entry(&mut mbr, 3, TYPE_FAT32_CHS, 9999, 10);

        let table = PartitionTable::parse(&mbr);
        let found = table.find_fat32().unwrap();
        assert_eq!(found.start_lba, 4096);
        assert_eq!(found.sector_count, 5000);
        assert!(!table.entries()[0].is_fat32());
    }

    #[test]
    fn chs_type_counts_as_fat32() {
        let mut mbr = [0u8; SECTOR_SIZE];
        put_entry(&mut mbr, 1, TYPE_FAT32_CHS, 63, 100);
        assert_eq!(PartitionTable::parse(&mbr).find_fat32().unwrap().start_lba, 63);
    }

    #[test]
    fn boot_flag_is_decoded() {
        let mut mbr = [0u8; SECTOR_SIZE];
        put_entry(&mut mbr, 0, TYPE_FAT32_LBA, 63, 100);
        mbr[PARTITION_TABLE_OFFSET] = 0x80;
        assert!(PartitionTable::parse(&mbr).entries()[0].bootable);
    }

    #[test]
    fn empty_table_has_no_fat32() {
        let table = PartitionTable::parse(&[0u8; SECTOR_SIZE]);
        assert!(table.find_fat32().is_none());
    }
}
