//! Hand-built FAT32 images for the integration tests
//!
//! Layout: MBR at lba 0 with one type 0x0C partition at [`PARTITION_LBA`],
//! 32 reserved sectors, two FATs of [`FAT_SECTORS`] sectors, then
//! [`DATA_CLUSTERS`] data clusters. The root directory is cluster 2.

#![allow(dead_code)]

use drivers::{BlockDevice, BlockDeviceError, BlockDeviceInfo, RamDisk, SECTOR_SIZE, Sector};
use std::collections::HashMap;

pub const PARTITION_LBA: u32 = 63;
pub const RESERVED_SECTORS: u32 = 32;
pub const NUM_FATS: u32 = 2;
pub const FAT_SECTORS: u32 = 8;
pub const DATA_CLUSTERS: u32 = 96;
pub const ROOT: u32 = 2;
pub const EOC: u32 = 0x0FFF_FFFF;

pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_LFN: u8 = 0x0F;

struct Dir {
    clusters: Vec<u32>,
    used: usize,
}

pub struct ImageBuilder {
    spc: u32,
    image: Vec<u8>,
    next_free: u32,
    dirs: HashMap<u32, Dir>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::with_cluster_sectors(1)
    }

    pub fn with_cluster_sectors(spc: u8) -> Self {
        let spc = spc as u32;
        let total = Self::partition_sectors(spc);
        let mut b = Self {
            spc,
            image: vec![0u8; ((PARTITION_LBA + total) as usize) * SECTOR_SIZE],
            next_free: ROOT + 1,
            dirs: HashMap::new(),
        };
        b.write_mbr(total);
        b.write_boot_sector(total);
        b.set_fat(0, 0x0FFF_FFF8);
        b.set_fat(1, EOC);
        b.set_fat(ROOT, EOC);
        b.dirs.insert(
            ROOT,
            Dir {
                clusters: vec![ROOT],
                used: 0,
            },
        );
        b
    }

    fn partition_sectors(spc: u32) -> u32 {
        RESERVED_SECTORS + NUM_FATS * FAT_SECTORS + DATA_CLUSTERS * spc
    }

    pub fn cluster_bytes(&self) -> usize {
        self.spc as usize * SECTOR_SIZE
    }

    pub fn fat_lba(&self) -> u32 {
        PARTITION_LBA + RESERVED_SECTORS
    }

    pub fn cluster_lba(&self, cluster: u32) -> u32 {
        PARTITION_LBA + RESERVED_SECTORS + NUM_FATS * FAT_SECTORS + (cluster - 2) * self.spc
    }

    /// Clusters allocated so far, the root included
    pub fn used_clusters(&self) -> u32 {
        self.next_free - 2
    }

    fn write_mbr(&mut self, total: u32) {
        let e = 446;
        self.image[e] = 0x80;
        self.image[e + 4] = 0x0C;
        self.image[e + 8..e + 12].copy_from_slice(&PARTITION_LBA.to_le_bytes());
        self.image[e + 12..e + 16].copy_from_slice(&total.to_le_bytes());
        self.image[510] = 0x55;
        self.image[511] = 0xAA;
    }

    fn write_boot_sector(&mut self, total: u32) {
        let base = PARTITION_LBA as usize * SECTOR_SIZE;
        let s = &mut self.image[base..base + SECTOR_SIZE];
        s[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        s[3..11].copy_from_slice(b"MSWIN4.1");
        s[11..13].copy_from_slice(&512u16.to_le_bytes());
        s[13] = self.spc as u8;
        s[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
        s[16] = NUM_FATS as u8;
        s[21] = 0xF8;
        s[32..36].copy_from_slice(&total.to_le_bytes());
        s[36..40].copy_from_slice(&FAT_SECTORS.to_le_bytes());
        s[44..48].copy_from_slice(&ROOT.to_le_bytes());
        s[66] = 0x29;
        s[71..82].copy_from_slice(b"TESTVOL    ");
        s[82..90].copy_from_slice(b"FAT32   ");
        s[510] = 0x55;
        s[511] = 0xAA;
    }

    /// Write `value` into `cluster`'s entry of every FAT copy
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        for copy in 0..NUM_FATS {
            let lba = self.fat_lba() + copy * FAT_SECTORS;
            let at = lba as usize * SECTOR_SIZE + cluster as usize * 4;
            self.image[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Allocate `count` clusters linked in order; 0 when `count` is 0
    fn alloc_chain(&mut self, count: usize) -> u32 {
        if count == 0 {
            return 0;
        }
        let first = self.next_free;
        assert!(first + count as u32 - 2 <= DATA_CLUSTERS, "test image is full");
        for i in 0..count as u32 {
            let c = first + i;
            let next = if i + 1 == count as u32 { EOC } else { c + 1 };
            self.set_fat(c, next);
        }
        self.next_free += count as u32;
        first
    }

    fn cluster_slice(&mut self, cluster: u32) -> &mut [u8] {
        let start = self.cluster_lba(cluster) as usize * SECTOR_SIZE;
        let len = self.cluster_bytes();
        &mut self.image[start..start + len]
    }

    /// Append one 32-byte record to directory `dir`, growing it as needed
    pub fn add_raw(&mut self, dir: u32, record: [u8; 32]) {
        let per_cluster = self.cluster_bytes() / 32;
        let (cluster, slot) = {
            let d = self.dirs.get(&dir).expect("unknown directory");
            let index = d.used / per_cluster;
            (d.clusters.get(index).copied(), d.used % per_cluster)
        };
        let cluster = match cluster {
            Some(c) => c,
            None => {
                let c = self.alloc_chain(1);
                let d = self.dirs.get_mut(&dir).expect("unknown directory");
                let last = *d.clusters.last().expect("directory without clusters");
                d.clusters.push(c);
                self.set_fat(last, c);
                c
            }
        };
        self.cluster_slice(cluster)[slot * 32..slot * 32 + 32].copy_from_slice(&record);
        self.dirs.get_mut(&dir).expect("unknown directory").used += 1;
    }

    fn add_entry(&mut self, dir: u32, short: &[u8; 11], long: Option<&str>, attr: u8, cluster: u32, size: u32) {
        if let Some(long) = long {
            for record in lfn_records(long, short) {
                self.add_raw(dir, record);
            }
        }
        self.add_raw(dir, short_record(short, attr, cluster, size));
    }

    /// Add a file and return its first cluster (0 when empty)
    pub fn add_file(&mut self, dir: u32, short: &[u8; 11], long: Option<&str>, data: &[u8]) -> u32 {
        let cb = self.cluster_bytes();
        let start = self.alloc_chain(data.len().div_ceil(cb));
        let mut cluster = start;
        for chunk in data.chunks(cb) {
            self.cluster_slice(cluster)[..chunk.len()].copy_from_slice(chunk);
            cluster += 1;
        }
        self.add_entry(dir, short, long, ATTR_ARCHIVE, start, data.len() as u32);
        start
    }

    /// Add a subdirectory with its `.` and `..` records and return its cluster
    pub fn add_dir(&mut self, parent: u32, short: &[u8; 11], long: Option<&str>) -> u32 {
        let cluster = self.alloc_chain(1);
        self.add_entry(parent, short, long, ATTR_DIRECTORY, cluster, 0);
        self.dirs.insert(
            cluster,
            Dir {
                clusters: vec![cluster],
                used: 0,
            },
        );
        let up = if parent == ROOT { 0 } else { parent };
        self.add_raw(cluster, short_record(b".          ", ATTR_DIRECTORY, cluster, 0));
        self.add_raw(cluster, short_record(b"..         ", ATTR_DIRECTORY, up, 0));
        cluster
    }

    /// Add a deleted record, optionally preceded by its long name fragments
    pub fn add_deleted(&mut self, dir: u32, short: &[u8; 11], long: Option<&str>) {
        if let Some(long) = long {
            for record in lfn_records(long, short) {
                self.add_raw(dir, record);
            }
        }
        let mut record = short_record(short, ATTR_ARCHIVE, 0, 0);
        record[0] = 0xE5;
        self.add_raw(dir, record);
    }

    pub fn add_volume_label(&mut self, dir: u32, label: &[u8; 11]) {
        self.add_raw(dir, short_record(label, ATTR_VOLUME_ID, 0, 0));
    }

    pub fn finish(self) -> RamDisk {
        RamDisk::from_vec(self.image)
    }
}

pub fn short_record(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut r = [0u8; 32];
    r[..11].copy_from_slice(name);
    r[11] = attr;
    r[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    r[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    r[28..32].copy_from_slice(&size.to_le_bytes());
    r
}

pub fn lfn_checksum(short: &[u8; 11]) -> u8 {
    short
        .iter()
        .fold(0u8, |sum, &b| (sum >> 1).wrapping_add(sum << 7).wrapping_add(b))
}

/// LFN fragments for `name` in on-disk order (highest ordinal first)
pub fn lfn_records(name: &str, short: &[u8; 11]) -> Vec<[u8; 32]> {
    const OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let units: Vec<u16> = name.encode_utf16().collect();
    let count = units.len().div_ceil(13);
    let checksum = lfn_checksum(short);
    (1..=count)
        .rev()
        .map(|ord| {
            let mut r = [0u8; 32];
            r[0] = ord as u8 | if ord == count { 0x40 } else { 0 };
            r[11] = ATTR_LFN;
            r[13] = checksum;
            for (i, &off) in OFFSETS.iter().enumerate() {
                let at = (ord - 1) * 13 + i;
                let unit = match at.cmp(&units.len()) {
                    std::cmp::Ordering::Less => units[at],
                    std::cmp::Ordering::Equal => 0x0000,
                    std::cmp::Ordering::Greater => 0xFFFF,
                };
                r[off..off + 2].copy_from_slice(&unit.to_le_bytes());
            }
            r
        })
        .collect()
}

/// Deterministic non-repeating test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// A device that fails reads of one sector
pub struct FaultyDisk {
    pub inner: RamDisk,
    pub bad_lba: u32,
}

impl BlockDevice for FaultyDisk {
    fn info(&self) -> BlockDeviceInfo {
        self.inner.info()
    }

    fn read_sector(&self, lba: u32, buffer: &mut Sector) -> Result<(), BlockDeviceError> {
        if lba == self.bad_lba {
            return Err(BlockDeviceError::ReadError);
        }
        self.inner.read_sector(lba, buffer)
    }
}
