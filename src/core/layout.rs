//! Physical layout
//!
//! Turns a logical [`SectionSet`] into container bytes:
//!
//! ```text
//! +--------------------+  0x00
//! | header (32 bytes)  |
//! | section table      |  16 bytes per section
//! +--------------------+  padded to 0x80
//! | section payloads   |  each one starting on 0x80
//! | ...                |
//! +--------------------+  padded to 0x80
//! | pointer table      |  sorted u32 file offsets
//! +--------------------+
//! ```
//!
//! Padding runs repeat `PAD0PAD1...PADF` from the start of each run.

use crate::cursor::{u32_at, write_u32_at, ByteWriter};
use crate::error::{IghwError, Result};
use crate::header::{Header, Version};
use crate::patch::SectionSet;
use crate::report::{Report, Warning};
use crate::section::{ids, SectionEntry, SectionTable};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub const ALIGNMENT: usize = 0x80;

pub const PAD_PATTERN: &[u8; 64] =
    b"PAD0PAD1PAD2PAD3PAD4PAD5PAD6PAD7PAD8PAD9PADAPADBPADCPADDPADEPADF";

/// Canonical placement of known sections; anything else follows by ascending id
pub const PREFERRED_ORDER: [u32; 30] = [
    ids::PROP_DATA,
    ids::PROP_METADATA,
    ids::NAMES,
    ids::ZONE_METADATA,
    ids::ZONE_OFFSETS,
    ids::PATH_DATA,
    ids::PATH_METADATA,
    ids::CONTROLLER_DATA,
    ids::CONTROLLER_METADATA,
    ids::PATH_POINTS,
    ids::VOLUME_TRANSFORM,
    ids::VOLUME_METADATA,
    ids::CLUE_INFO,
    ids::CLUE_METADATA,
    ids::SCENT_DATA,
    ids::SCENT_METADATA,
    ids::AREA_DATA,
    ids::AREA_METADATA,
    ids::POOL_DATA,
    ids::POOL_METADATA,
    ids::SCENT_OFFSETS,
    ids::AREA_OFFSETS,
    ids::POOL_OFFSETS,
    ids::INSTANCE_TYPES,
    ids::DEFAULT_REGION_NAMES,
    ids::ZONE_INDICES,
    ids::HOST_POOL,
    ids::LOCAL_POOL,
    ids::REGION_DATA,
    ids::REGION_POINTERS,
];

/// Offset of the sub-blob address inside a prop data record
const PROP_SUBFILE_SLOT: usize = 12;
const PROP_DATA_SIZE: usize = 80;

pub fn align_up(value: usize) -> usize {
    value.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Pad `buf` with the filler pattern up to `len`
pub fn pad_to(buf: &mut Vec<u8>, len: usize) {
    let start = buf.len();
    buf.extend((0..len.saturating_sub(start)).map(|i| PAD_PATTERN[i % PAD_PATTERN.len()]));
}

/// True if `bytes` is a prefix of the repeating filler
pub fn is_padding(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .all(|(i, b)| *b == PAD_PATTERN[i % PAD_PATTERN.len()])
}

/// Ids of the non-empty payloads in emission order
pub fn section_order(set: &SectionSet) -> Vec<u32> {
    let mut order: Vec<u32> = PREFERRED_ORDER
        .iter()
        .copied()
        .filter(|id| set.get(*id).is_some_and(|p| !p.is_empty()))
        .collect();
    let rest: BTreeSet<u32> = set
        .iter()
        .map(|p| p.id)
        .filter(|id| !PREFERRED_ORDER.contains(id))
        .collect();
    order.extend(rest);
    order
}

/// A fully laid out container
#[derive(Debug, Clone)]
pub struct Assembled {
    pub bytes: Vec<u8>,
    pub header: Header,
    pub sections: SectionTable,
    pub pointer_table: Vec<u32>,
}

impl Assembled {
    pub fn section_offset(&self, id: u32) -> Option<u32> {
        self.sections.get(id).map(|e| e.offset)
    }
}

/// Lay out sections, resolve patches and emit the pointer table
pub fn assemble(set: &SectionSet, version: Version, report: &mut Report) -> Result<Assembled> {
    let order = section_order(set);
    let mut header = Header::new(version, order.len() as u32);

    // Physical offsets first, nothing is written until all are known.
    let mut cursor = align_up(header.header_length as usize);
    let mut entries = Vec::with_capacity(order.len());
    let mut offsets: HashMap<u32, (usize, usize)> = HashMap::new();
    for id in &order {
        let Some(payload) = set.get(*id) else { continue };
        cursor = align_up(cursor);
        let offset = u32::try_from(cursor).map_err(|_| IghwError::LayoutOverflow { id: *id })?;
        entries.push(payload.entry(offset)?);
        offsets.insert(*id, (cursor, payload.len()));
        cursor += payload.len();
        debug!("section {:#x} at {:#x} (+{:#x})", id, offset, payload.len());
    }
    let sections = SectionTable::new(entries);

    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(&sections.to_bytes());
    for entry in sections.entries() {
        pad_to(&mut bytes, entry.offset as usize);
        if let Some(payload) = set.get(entry.id) {
            bytes.extend_from_slice(&payload.data);
        }
    }

    let mut pointers = BTreeSet::new();
    for entry in sections.entries() {
        let Some(payload) = set.get(entry.id) else { continue };
        let base = entry.offset as usize;
        for patch in &payload.patches {
            let location = base + patch.at as usize;
            let target = offsets
                .get(&patch.target_section)
                .filter(|(_, len)| *len > 0)
                .map(|(offset, _)| *offset);
            let Some(target) = target else {
                report.push(Warning::UnresolvedPatch {
                    source_section: entry.id,
                    at: patch.at,
                    target_section: patch.target_section,
                });
                continue;
            };
            let value = target as u64 + patch.target_offset as u64;
            let value = u32::try_from(value).map_err(|_| IghwError::LayoutOverflow {
                id: patch.target_section,
            })?;
            write_u32_at(&mut bytes, location, value);
            pointers.insert(location as u32);
        }
    }

    // Reference lists are relocated slot by slot, zero slots included.
    for entry in sections.entries() {
        if ids::OFFSET_TABLES.contains(&entry.id) {
            let start = entry.offset as usize;
            let end = start + entry.length() as usize;
            pointers.extend((start..end).step_by(4).map(|slot| slot as u32));
        }
    }
    if let Some(entry) = sections.get(ids::PROP_DATA) {
        prop_subfile_slots(&bytes, entry, &mut pointers)?;
    }

    let table_start = align_up(bytes.len());
    pad_to(&mut bytes, table_start);
    header.pointer_table_offset =
        u32::try_from(table_start).map_err(|_| IghwError::LayoutOverflow { id: 0 })?;
    header.pointer_count = pointers.len() as u32;
    let mut table = ByteWriter::with_capacity(pointers.len() * 4);
    for pointer in &pointers {
        table.put_u32(*pointer);
    }
    bytes.extend_from_slice(table.as_slice());
    bytes[..header.form().size()].copy_from_slice(&header.to_bytes());

    debug!(
        "assembled {} sections, {} bytes, {} pointers",
        sections.len(),
        bytes.len(),
        pointers.len()
    );

    Ok(Assembled {
        bytes,
        header,
        sections,
        pointer_table: pointers.into_iter().collect(),
    })
}

fn prop_subfile_slots(bytes: &[u8], entry: &SectionEntry, pointers: &mut BTreeSet<u32>) -> Result<()> {
    let start = entry.offset as usize;
    for i in 0..entry.item_count() as usize {
        let slot = start + i * PROP_DATA_SIZE + PROP_SUBFILE_SLOT;
        if u32_at(bytes, slot)? != 0 {
            pointers.insert(slot as u32);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Patch, SectionPayload};
    use crate::section::Container;

    fn sample_set() -> SectionSet {
        let mut set = SectionSet::new();
        set.insert(SectionPayload::single(ids::NAMES).with_data(b"Crate\0".to_vec()));
        let mut meta = SectionPayload::multi(ids::PROP_METADATA, 16);
        let mut w = ByteWriter::new();
        w.put_u64(1).put_u32(0).put_u16(0).put_u16(0);
        meta.push_record(w, [Patch::new(8, ids::NAMES, 0)]);
        set.insert(meta);
        set.insert(SectionPayload::single(0x7_0000).with_data(vec![0xAA; 3]));
        set
    }

    #[test]
    fn test_alignment_and_order() {
        let mut report = Report::new();
        let out = assemble(&sample_set(), Version::REPACK, &mut report).unwrap();
        assert!(report.is_clean());

        let ids_in_order: Vec<u32> = out.sections.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids_in_order, vec![ids::PROP_METADATA, ids::NAMES, 0x7_0000]);
        for entry in out.sections.entries() {
            assert_eq!(entry.offset as usize % ALIGNMENT, 0);
        }
        assert_eq!(out.header.pointer_table_offset as usize % ALIGNMENT, 0);
        assert_eq!(out.sections.entries()[0].offset, 0x80);
    }

    #[test]
    fn test_patch_resolution_and_pointer_table() {
        let mut report = Report::new();
        let out = assemble(&sample_set(), Version::REPACK, &mut report).unwrap();
        let meta = out.section_offset(ids::PROP_METADATA).unwrap();
        let names = out.section_offset(ids::NAMES).unwrap();

        assert_eq!(u32_at(&out.bytes, meta as usize + 8).unwrap(), names);
        assert_eq!(out.pointer_table, vec![meta + 8]);

        let parsed = Container::parse(&out.bytes).unwrap();
        assert_eq!(parsed.pointer_table(), out.pointer_table);
        assert_eq!(parsed.header.pointer_count, 1);
    }

    #[test]
    fn test_padding_uses_filler() {
        let mut report = Report::new();
        let out = assemble(&sample_set(), Version::REPACK, &mut report).unwrap();
        let table_end = out.header.header_length as usize;
        assert!(is_padding(&out.bytes[table_end..0x80]));
    }

    #[test]
    fn test_missing_target_leaves_zero() {
        let mut set = SectionSet::new();
        let mut pool = SectionPayload::multi(ids::POOL_DATA, 16);
        let mut w = ByteWriter::new();
        w.put_u32(0).put_u32(1).put_zeros(8);
        pool.push_record(w, [Patch::new(0, ids::POOL_OFFSETS, 0)]);
        set.insert(pool);

        let mut report = Report::new();
        let out = assemble(&set, Version::REPACK, &mut report).unwrap();
        let offset = out.section_offset(ids::POOL_DATA).unwrap() as usize;
        assert_eq!(u32_at(&out.bytes, offset).unwrap(), 0);
        assert!(out.pointer_table.is_empty());
        assert!(matches!(
            report.warnings(),
            [Warning::UnresolvedPatch {
                target_section: ids::POOL_OFFSETS,
                ..
            }]
        ));
    }

    #[test]
    fn test_offset_tables_fully_relocated() {
        let mut set = SectionSet::new();
        set.insert(SectionPayload::single(ids::AREA_OFFSETS).with_data(vec![0; 12]));
        let mut report = Report::new();
        let out = assemble(&set, Version::REPACK, &mut report).unwrap();
        let base = out.section_offset(ids::AREA_OFFSETS).unwrap();
        assert_eq!(out.pointer_table, vec![base, base + 4, base + 8]);
    }

    #[test]
    fn test_pointer_table_follows_last_section() {
        let mut report = Report::new();
        let out = assemble(&sample_set(), Version::REPACK, &mut report).unwrap();
        let last = out.sections.entries().iter().map(|e| e.end()).max().unwrap() as usize;
        let table = out.header.pointer_table_offset as usize;
        assert_eq!(table, align_up(last));
        assert!(is_padding(&out.bytes[last..table]));
        assert_eq!(out.bytes.len(), table + 4 * out.pointer_table.len());
    }

    #[test]
    fn test_pad_pattern_restarts() {
        let mut buf = vec![1, 2, 3];
        pad_to(&mut buf, 9);
        assert_eq!(&buf[3..], b"PAD0PA");
    }
}
