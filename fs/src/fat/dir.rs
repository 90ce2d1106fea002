//! FAT32 directory records and long file name reconstruction
//!
//! A directory is a cluster chain of 32-byte records. Long names are stored
//! as a run of LFN fragment records, highest ordinal first, immediately
//! before the short (8.3) record they belong to.

use super::bpb::{Volume, le16, le32};
use super::chain::ClusterChain;
use crate::FsError;
use bitflags::bitflags;
use drivers::{BlockDevice, SECTOR_SIZE, Sector};

/// Directory record size in bytes
pub const DIR_ENTRY_SIZE: usize = 32;
const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// First name byte of the record that ends the directory
const END_OF_DIRECTORY: u8 = 0x00;
/// First name byte of a deleted record
const DELETED: u8 = 0xE5;
/// Stored in place of a leading 0xE5 that is part of a real name
const ESCAPED_E5: u8 = 0x05;
/// Attribute value of an LFN fragment
const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_MASK: u8 = 0x3F;

/// UTF-16 code units carried by one LFN fragment
pub const LFN_CHARS_PER_ENTRY: usize = 13;
/// Longest long name, in UTF-16 code units
pub const MAX_LFN_UNITS: usize = 255;
/// Longest display name, in UTF-8 bytes
pub const MAX_NAME_LEN: usize = MAX_LFN_UNITS * 3;

/// Byte offsets of the 13 code units inside a fragment (5 + 6 + 2)
const LFN_UNIT_OFFSETS: [usize; LFN_CHARS_PER_ENTRY] =
    [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

pub type Name = heapless::String<MAX_NAME_LEN>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// Short name as stored: 8 base bytes and 3 extension bytes, space-padded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortName([u8; 11]);

impl ShortName {
    pub const fn from_raw(raw: [u8; 11]) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> &[u8; 11] {
        &self.0
    }

    pub fn base(&self) -> &[u8] {
        trim_padding(&self.0[..8])
    }

    pub fn extension(&self) -> &[u8] {
        trim_padding(&self.0[8..])
    }

    /// Lowercase `base.ext`, or `base` when there is no extension
    pub fn normalize(&self) -> heapless::String<12> {
        let mut out = heapless::String::new();
        for (i, &b) in self.base().iter().enumerate() {
            let b = if i == 0 && b == ESCAPED_E5 { DELETED } else { b };
            let _ = out.push(char::from(b).to_ascii_lowercase());
        }
        if !self.extension().is_empty() {
            let _ = out.push('.');
            for &b in self.extension() {
                let _ = out.push(char::from(b).to_ascii_lowercase());
            }
        }
        out
    }

    /// Inverse of [`normalize`](Self::normalize): uppercase and pad a
    /// `base[.ext]` name. `None` if it cannot be an 8.3 name.
    pub fn parse(name: &str) -> Option<Self> {
        let (base, ext) = match name.rsplit_once('.') {
            Some((base, ext)) => (base, ext),
            None => (name, ""),
        };
        if base.is_empty() || base.len() > 8 || ext.len() > 3 || !name.is_ascii() {
            return None;
        }
        if base.contains(['.', ' ']) || ext.contains(' ') {
            return None;
        }
        let mut raw = [b' '; 11];
        for (dst, b) in raw[..8].iter_mut().zip(base.bytes()) {
            *dst = b.to_ascii_uppercase();
        }
        for (dst, b) in raw[8..].iter_mut().zip(ext.bytes()) {
            *dst = b.to_ascii_uppercase();
        }
        Some(Self(raw))
    }

    pub fn matches(&self, query: &str) -> bool {
        Self::parse(query).is_some_and(|q| q.0 == self.0)
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

/// One LFN fragment: ordinal plus up to 13 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfnFragment {
    pub ordinal: u8,
    units: [u16; LFN_CHARS_PER_ENTRY],
    len: usize,
}

impl LfnFragment {
    pub fn parse(raw: &[u8]) -> Self {
        let mut units = [0u16; LFN_CHARS_PER_ENTRY];
        let mut len = 0;
        for &offset in LFN_UNIT_OFFSETS.iter() {
            let unit = le16(raw, offset);
            if unit == 0x0000 || unit == 0xFFFF {
                break;
            }
            units[len] = unit;
            len += 1;
        }
        Self {
            ordinal: raw[0] & 0x1F,
            units,
            len,
        }
    }

    pub fn units(&self) -> &[u16] {
        &self.units[..self.len]
    }
}

/// In-progress long name
///
/// Fragments arrive last-part-first, so each one is prepended. Units fill
/// the buffer from the back and `start` marks the front of the name.
#[derive(Clone)]
pub struct LongNameBuf {
    units: [u16; MAX_LFN_UNITS],
    start: usize,
    overflowed: bool,
}

impl LongNameBuf {
    pub const fn new() -> Self {
        Self {
            units: [0; MAX_LFN_UNITS],
            start: MAX_LFN_UNITS,
            overflowed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == MAX_LFN_UNITS && !self.overflowed
    }

    pub fn clear(&mut self) {
        self.start = MAX_LFN_UNITS;
        self.overflowed = false;
    }

    pub fn prepend(&mut self, units: &[u16]) {
        if self.overflowed || units.len() > self.start {
            self.overflowed = true;
            return;
        }
        self.start -= units.len();
        self.units[self.start..self.start + units.len()].copy_from_slice(units);
    }

    pub fn units(&self) -> &[u16] {
        &self.units[self.start..]
    }

    /// Decoded, ASCII-lowercased name. `None` when empty or overflowed.
    pub fn to_name(&self) -> Option<Name> {
        if self.overflowed || self.units().is_empty() {
            return None;
        }
        let mut name = Name::new();
        for c in char::decode_utf16(self.units().iter().copied()) {
            let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
            name.push(c.to_ascii_lowercase()).ok()?;
        }
        Some(name)
    }
}

impl Default for LongNameBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// A short record paired with its reconstructed long name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Long name if one preceded the record, else the normalized short name
    pub name: Name,
    pub short_name: ShortName,
    pub attributes: Attributes,
    /// First cluster; 0 for empty files and for `..` pointing at the root
    pub cluster: u32,
    pub size: u32,
}

impl DirEntry {
    fn from_record(raw: &[u8], long: Option<Name>) -> Self {
        let mut short = [0u8; 11];
        short.copy_from_slice(&raw[..11]);
        let short_name = ShortName::from_raw(short);
        let name = long.unwrap_or_else(|| {
            let mut name = Name::new();
            // A normalized short name is at most 12 bytes.
            let _ = name.push_str(&short_name.normalize());
            name
        });
        let cluster_hi = le16(raw, 20) as u32;
        let cluster_lo = le16(raw, 26) as u32;
        Self {
            name,
            short_name,
            attributes: Attributes::from_bits_retain(raw[11]),
            cluster: (cluster_hi << 16) | cluster_lo,
            size: le32(raw, 28),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_dot(&self) -> bool {
        self.short_name.as_raw() == b".          "
    }

    pub fn is_dot_dot(&self) -> bool {
        self.short_name.as_raw() == b"..         "
    }

    /// Case-insensitive match against the long or the short name
    pub fn matches(&self, query: &str) -> bool {
        self.name.eq_ignore_ascii_case(query) || self.short_name.matches(query)
    }
}

enum Record<'a> {
    End,
    Deleted,
    LongName(LfnFragment),
    VolumeLabel,
    Short(&'a [u8]),
}

impl<'a> Record<'a> {
    fn classify(raw: &'a [u8]) -> Self {
        match raw[0] {
            END_OF_DIRECTORY => Record::End,
            DELETED => Record::Deleted,
            _ if raw[11] & ATTR_MASK == ATTR_LONG_NAME => {
                Record::LongName(LfnFragment::parse(raw))
            }
            _ if raw[11] & Attributes::VOLUME_ID.bits() != 0 => Record::VolumeLabel,
            _ => Record::Short(raw),
        }
    }
}

/// Iterator over the entries of one directory
///
/// Reads one sector at a time. Stops for good at the first end-of-directory
/// record, even if later sectors of the chain hold more records.
pub struct DirIter<'a, D> {
    vol: &'a Volume,
    dev: &'a D,
    chain: ClusterChain<'a, D>,
    cluster_lba: Option<u32>,
    sector_in_cluster: u32,
    sector: Sector,
    index: usize,
    long_name: LongNameBuf,
    done: bool,
}

impl<'a, D: BlockDevice> DirIter<'a, D> {
    pub fn new(vol: &'a Volume, dev: &'a D, cluster: u32) -> Self {
        Self {
            vol,
            dev,
            chain: vol.chain(dev, cluster),
            cluster_lba: None,
            sector_in_cluster: 0,
            sector: [0u8; SECTOR_SIZE],
            index: ENTRIES_PER_SECTOR,
            long_name: LongNameBuf::new(),
            done: false,
        }
    }

    /// Load the next sector of the directory. `false` once the chain ends.
    fn advance(&mut self) -> Result<bool, FsError> {
        match self.cluster_lba {
            Some(_) if self.sector_in_cluster + 1 < self.vol.sectors_per_cluster() => {
                self.sector_in_cluster += 1;
            }
            _ => match self.chain.next() {
                Some(cluster) => {
                    self.cluster_lba = Some(self.vol.cluster_to_lba(cluster?));
                    self.sector_in_cluster = 0;
                }
                None => return Ok(false),
            },
        }
        let lba = self.cluster_lba.unwrap_or_default() + self.sector_in_cluster;
        self.dev.read_sector(lba, &mut self.sector)?;
        self.index = 0;
        Ok(true)
    }
}

impl<D: BlockDevice> Iterator for DirIter<'_, D> {
    type Item = Result<DirEntry, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.index == ENTRIES_PER_SECTOR {
                match self.advance() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.done = true;
                        return None;
                    }
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }

            let start = self.index * DIR_ENTRY_SIZE;
            self.index += 1;
            match Record::classify(&self.sector[start..start + DIR_ENTRY_SIZE]) {
                Record::End => {
                    self.done = true;
                    return None;
                }
                Record::Deleted => self.long_name.clear(),
                Record::LongName(fragment) => self.long_name.prepend(fragment.units()),
                Record::VolumeLabel => self.long_name.clear(),
                Record::Short(raw) => {
                    let entry = DirEntry::from_record(raw, self.long_name.to_name());
                    self.long_name.clear();
                    return Some(Ok(entry));
                }
            }
        }
    }
}
