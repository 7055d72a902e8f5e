//! Instance type registry
//!
//! The global symbol table every cross-entity reference points into: one
//! 16-byte `(tuid, type code, padding)` row per instance, stored as a single
//! block. Reference slots hold the absolute address of the target's row.

use crate::cursor::{ByteReader, ByteWriter};
use crate::patch::SectionPayload;
use crate::record::tuid_serde;
use crate::section::ids;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ENTRY_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeEntry {
    #[serde(with = "tuid_serde")]
    pub tuid: u64,
    #[serde(rename = "type")]
    pub type_code: u32,
}

impl InstanceTypeEntry {
    pub fn new(tuid: u64, type_code: u32) -> Self {
        InstanceTypeEntry { tuid, type_code }
    }
}

/// Ordered registry built fresh for every encode
///
/// Recorded rows may repeat a TUID; lookups resolve to its first row.
#[derive(Debug, Clone, Default)]
pub struct InstanceTypeRegistry {
    entries: Vec<InstanceTypeEntry>,
    index: HashMap<u64, usize>,
}

impl InstanceTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Append a row verbatim, duplicates included
    pub fn push(&mut self, tuid: u64, type_code: u32) {
        self.index.entry(tuid).or_insert(self.entries.len());
        self.entries.push(InstanceTypeEntry::new(tuid, type_code));
    }

    /// Add a row, or overwrite the type of the TUID's first row in place
    pub fn insert(&mut self, tuid: u64, type_code: u32) {
        match self.index.get(&tuid) {
            Some(pos) => self.entries[*pos].type_code = type_code,
            None => {
                self.index.insert(tuid, self.entries.len());
                self.entries.push(InstanceTypeEntry::new(tuid, type_code));
            }
        }
    }

    /// Add a row only if the TUID is unknown
    pub fn insert_if_absent(&mut self, tuid: u64, type_code: u32) -> bool {
        if self.contains(tuid) {
            return false;
        }
        self.insert(tuid, type_code);
        true
    }

    pub fn contains(&self, tuid: u64) -> bool {
        self.index.contains_key(&tuid)
    }

    /// Byte offset of the TUID's row inside the registry section
    pub fn offset_of(&self, tuid: u64) -> Option<u32> {
        self.index.get(&tuid).map(|pos| *pos as u32 * ENTRY_SIZE)
    }

    pub fn type_of(&self, tuid: u64) -> Option<u32> {
        self.index.get(&tuid).map(|pos| self.entries[*pos].type_code)
    }

    /// Sort rows by TUID
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.tuid);
        self.index.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index.entry(entry.tuid).or_insert(i);
        }
    }

    pub fn entries(&self) -> &[InstanceTypeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_payload(&self) -> SectionPayload {
        let mut w = ByteWriter::with_capacity(self.entries.len() * ENTRY_SIZE as usize);
        for entry in &self.entries {
            w.put_u64(entry.tuid).put_u32(entry.type_code).put_u32(0);
        }
        SectionPayload::single(ids::INSTANCE_TYPES).with_data(w.into_inner())
    }
}

/// Rows of a decoded registry section, duplicates kept
pub fn parse_entries(bytes: &[u8]) -> Vec<InstanceTypeEntry> {
    let mut r = ByteReader::new(bytes);
    let mut entries = Vec::with_capacity(bytes.len() / ENTRY_SIZE as usize);
    while r.remaining() >= ENTRY_SIZE as usize {
        let (Ok(tuid), Ok(type_code), Ok(_)) = (r.u64(), r.u32(), r.u32()) else {
            break;
        };
        entries.push(InstanceTypeEntry::new(tuid, type_code));
    }
    entries
}
