//! Section table
//!
//! Every region of an IGHW file is described by a 16-byte table entry:
//!
//! ```text
//! 0x00  u32 id
//! 0x04  u32 file offset
//! 0x08  u8  flag     0x10 = multi-item
//! 0x09  u24 count
//! 0x0C  u32 element size (total length for single blocks)
//! ```

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{IghwError, Result};
use crate::header::{Header, SECTION_ENTRY_SIZE};

/// Well-known section ids
pub mod ids {
    pub const REGION_DATA: u32 = 0x25005;
    pub const REGION_POINTERS: u32 = 0x25006;
    pub const ZONE_METADATA: u32 = 0x25008;
    pub const ZONE_OFFSETS: u32 = 0x2500C;
    pub const DEFAULT_REGION_NAMES: u32 = 0x25010;
    pub const ZONE_INDICES: u32 = 0x25014;

    pub const NAMES: u32 = 0x11300;
    pub const HOST_POOL: u32 = 0x25020;
    pub const INSTANCE_TYPES: u32 = 0x25022;
    pub const LOCAL_POOL: u32 = 0x25030;
    /// Only present inside a prop's sub-blob
    pub const CLASS_ENUM: u32 = 0x2501C;

    pub const PROP_DATA: u32 = 0x25048;
    pub const PROP_METADATA: u32 = 0x2504C;
    pub const PATH_DATA: u32 = 0x25050;
    pub const PATH_METADATA: u32 = 0x25054;
    pub const PATH_POINTS: u32 = 0x25058;
    pub const VOLUME_TRANSFORM: u32 = 0x2505C;
    pub const VOLUME_METADATA: u32 = 0x25060;
    pub const CLUE_INFO: u32 = 0x25064;
    pub const CLUE_METADATA: u32 = 0x25068;
    pub const CONTROLLER_DATA: u32 = 0x2506C;
    pub const CONTROLLER_METADATA: u32 = 0x25070;
    pub const POOL_DATA: u32 = 0x25074;
    pub const POOL_METADATA: u32 = 0x25078;
    pub const POOL_OFFSETS: u32 = 0x2507C;
    pub const AREA_DATA: u32 = 0x25080;
    pub const AREA_METADATA: u32 = 0x25084;
    pub const AREA_OFFSETS: u32 = 0x25088;
    pub const SCENT_DATA: u32 = 0x2508C;
    pub const SCENT_METADATA: u32 = 0x25090;
    pub const SCENT_OFFSETS: u32 = 0x25094;

    /// Reference list sections, each slot is an address
    pub const OFFSET_TABLES: [u32; 3] = [AREA_OFFSETS, POOL_OFFSETS, SCENT_OFFSETS];
}

pub const MULTI_ITEM: u8 = 0x10;

/// How the count and element size fields are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionFlag {
    /// Flag 0x10: `count` items of `element_size` bytes
    MultiItem,
    /// Any other flag: one block, element size holds the total length
    SingleBlock(u8),
}

impl SectionFlag {
    pub fn from_u8(value: u8) -> Self {
        match value {
            MULTI_ITEM => SectionFlag::MultiItem,
            other => SectionFlag::SingleBlock(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            SectionFlag::MultiItem => MULTI_ITEM,
            SectionFlag::SingleBlock(raw) => raw,
        }
    }

    pub fn is_multi_item(self) -> bool {
        matches!(self, SectionFlag::MultiItem)
    }
}

/// One section table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEntry {
    pub id: u32,
    pub offset: u32,
    pub flag: SectionFlag,
    /// Raw 24-bit count field
    pub count: u32,
    /// Raw element size field
    pub element_size: u32,
}

impl SectionEntry {
    pub fn multi(id: u32, offset: u32, count: u32, element_size: u32) -> Self {
        SectionEntry {
            id,
            offset,
            flag: SectionFlag::MultiItem,
            count,
            element_size,
        }
    }

    pub fn single(id: u32, offset: u32, length: u32) -> Self {
        SectionEntry {
            id,
            offset,
            flag: SectionFlag::SingleBlock(0),
            count: 1,
            element_size: length,
        }
    }

    /// Logical item count
    pub fn item_count(&self) -> u32 {
        if self.flag.is_multi_item() {
            self.count
        } else {
            1
        }
    }

    /// Total byte length of the section's data
    pub fn length(&self) -> u64 {
        if self.flag.is_multi_item() {
            self.count as u64 * self.element_size as u64
        } else {
            self.element_size as u64
        }
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length()
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.offset && (address as u64) < self.end()
    }

    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let id = r.u32()?;
        let offset = r.u32()?;
        let packed = r.u32()?;
        let element_size = r.u32()?;
        Ok(SectionEntry {
            id,
            offset,
            flag: SectionFlag::from_u8((packed >> 24) as u8),
            count: packed & 0x00FF_FFFF,
            element_size,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let packed = ((self.flag.to_u8() as u32) << 24) | (self.count & 0x00FF_FFFF);
        w.put_u32(self.id)
            .put_u32(self.offset)
            .put_u32(packed)
            .put_u32(self.element_size);
    }
}

/// Decoded section table of one container
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    entries: Vec<SectionEntry>,
}

impl SectionTable {
    pub fn new(entries: Vec<SectionEntry>) -> Self {
        SectionTable { entries }
    }

    /// Read and bounds-check every entry against the file length
    pub fn parse(data: &[u8], header: &Header) -> Result<Self> {
        let start = header.section_table_offset();
        let needed = SECTION_ENTRY_SIZE as u64 * header.section_count as u64;
        if start as u64 + needed > data.len() as u64 {
            return Err(IghwError::UnexpectedEof {
                offset: start,
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                available: data.len().saturating_sub(start),
            });
        }
        let mut r = ByteReader::at(data, start);
        let mut entries = Vec::with_capacity(header.section_count as usize);
        for _ in 0..header.section_count {
            let entry = SectionEntry::parse(&mut r)?;
            if entry.end() > data.len() as u64 {
                return Err(IghwError::SectionOutOfBounds {
                    id: entry.id,
                    offset: entry.offset,
                    length: entry.length(),
                    file_len: data.len(),
                });
            }
            entries.push(entry);
        }
        Ok(SectionTable { entries })
    }

    pub fn entries(&self) -> &[SectionEntry] {
        &self.entries
    }

    pub fn get(&self, id: u32) -> Option<&SectionEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Section whose data range contains `address`
    pub fn containing(&self, address: u32) -> Option<&SectionEntry> {
        self.entries.iter().find(|entry| entry.contains(address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(self.entries.len() * SECTION_ENTRY_SIZE);
        for entry in &self.entries {
            entry.write(&mut w);
        }
        w.into_inner()
    }
}

/// A parsed container: header, section table and the backing bytes
#[derive(Debug, Clone)]
pub struct Container<'a> {
    pub header: Header,
    pub sections: SectionTable,
    data: &'a [u8],
}

impl<'a> Container<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = Header::from_bytes(data)?;
        let sections = SectionTable::parse(data, &header)?;
        Ok(Container {
            header,
            sections,
            data,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn section(&self, id: u32) -> Option<&SectionEntry> {
        self.sections.get(id)
    }

    /// Raw bytes of a section, already bounds-checked by [`SectionTable::parse`]
    pub fn section_bytes(&self, id: u32) -> Option<&'a [u8]> {
        let entry = self.sections.get(id)?;
        let start = entry.offset as usize;
        Some(&self.data[start..start + entry.length() as usize])
    }

    /// Relocation table entries, empty for legacy headers or when it runs past EOF
    pub fn pointer_table(&self) -> Vec<u32> {
        if self.header.form() != crate::header::HeaderForm::Modern {
            return Vec::new();
        }
        let mut r = ByteReader::at(self.data, self.header.pointer_table_offset as usize);
        (0..self.header.pointer_count)
            .map_while(|_| r.u32().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Version;

    #[test]
    fn test_flag_interpretation() {
        let multi = SectionEntry::multi(ids::PROP_DATA, 0x80, 3, 80);
        assert_eq!(multi.item_count(), 3);
        assert_eq!(multi.length(), 240);

        let single = SectionEntry::single(ids::NAMES, 0x100, 37);
        assert_eq!(single.item_count(), 1);
        assert_eq!(single.length(), 37);
    }

    #[test]
    fn test_unknown_flag_is_single_block() {
        let mut w = ByteWriter::new();
        w.put_u32(ids::INSTANCE_TYPES)
            .put_u32(0x200)
            .put_u32(0x0100_0007)
            .put_u32(48);
        let data = w.into_inner();
        let entry = SectionEntry::parse(&mut ByteReader::new(&data)).unwrap();
        assert_eq!(entry.flag, SectionFlag::SingleBlock(1));
        assert_eq!(entry.count, 7);
        assert_eq!(entry.item_count(), 1);
        assert_eq!(entry.length(), 48);

        let mut again = ByteWriter::new();
        entry.write(&mut again);
        assert_eq!(again.as_slice(), &data[..]);
    }

    #[test]
    fn test_section_past_eof() {
        let mut header = Header::new(Version::REPACK, 1);
        header.pointer_table_offset = 0x30;
        let mut data = header.to_bytes();
        let mut w = ByteWriter::new();
        SectionEntry::single(ids::NAMES, 0x30, 0x100).write(&mut w);
        data.extend_from_slice(w.as_slice());

        let result = Container::parse(&data);
        assert!(matches!(
            result,
            Err(IghwError::SectionOutOfBounds { id: ids::NAMES, .. })
        ));
    }

    #[test]
    fn test_section_count_larger_than_file() {
        let mut data = b"IGHW\0\x01\0\x01\xFF\xFF\xFF\xFF".to_vec();
        data.extend_from_slice(&[0; 20]);
        let result = Container::parse(&data);
        assert!(matches!(
            result,
            Err(IghwError::UnexpectedEof { offset: 0x20, available: 0, .. })
        ));
    }

    #[test]
    fn test_containing_lookup() {
        let table = SectionTable::new(vec![
            SectionEntry::single(ids::HOST_POOL, 0x100, 0x40),
            SectionEntry::single(ids::LOCAL_POOL, 0x180, 0x40),
        ]);
        assert_eq!(table.containing(0x13F).map(|e| e.id), Some(ids::HOST_POOL));
        assert_eq!(table.containing(0x180).map(|e| e.id), Some(ids::LOCAL_POOL));
        assert!(table.containing(0x140).is_none());
    }
}
