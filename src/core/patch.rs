//! Deferred relocations and the logical section set
//!
//! Codecs never write absolute addresses. They append payload bytes with a
//! zero placeholder and record a [`Patch`]; the layout assembler resolves
//! all of them in one pass once physical offsets are known.

use crate::cursor::ByteWriter;
use crate::error::{IghwError, Result};
use crate::section::SectionEntry;
use std::collections::BTreeMap;

/// Largest value of the 24-bit count field
pub const MAX_ITEM_COUNT: usize = 0x00FF_FFFF;

/// A 32-bit absolute address to fill in at layout time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Byte offset inside the owning section's payload
    pub at: u32,
    pub target_section: u32,
    pub target_offset: u32,
}

impl Patch {
    pub fn new(at: u32, target_section: u32, target_offset: u32) -> Self {
        Patch {
            at,
            target_section,
            target_offset,
        }
    }
}

/// Element layout of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Multi { element_size: u32 },
    Single,
}

/// One section's bytes plus the patches that still need addresses
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPayload {
    pub id: u32,
    pub kind: PayloadKind,
    pub data: Vec<u8>,
    pub patches: Vec<Patch>,
}

impl SectionPayload {
    pub fn multi(id: u32, element_size: u32) -> Self {
        SectionPayload {
            id,
            kind: PayloadKind::Multi { element_size },
            data: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn single(id: u32) -> Self {
        SectionPayload {
            id,
            kind: PayloadKind::Single,
            data: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one record, shifting its record-relative patches into place
    pub fn push_record(&mut self, record: ByteWriter, patches: impl IntoIterator<Item = Patch>) {
        let base = self.data.len() as u32;
        self.patches.extend(patches.into_iter().map(|mut p| {
            p.at += base;
            p
        }));
        self.data.extend_from_slice(record.as_slice());
    }

    /// Append a 32-bit placeholder and a patch for it
    pub fn push_pointer(&mut self, target_section: u32, target_offset: u32) {
        self.patches
            .push(Patch::new(self.data.len() as u32, target_section, target_offset));
        self.data.extend_from_slice(&[0; 4]);
    }

    pub fn item_count(&self) -> usize {
        match self.kind {
            PayloadKind::Multi { element_size } if element_size > 0 => {
                self.data.len() / element_size as usize
            }
            _ => 1,
        }
    }

    /// Table entry for this payload placed at `offset`
    pub fn entry(&self, offset: u32) -> Result<SectionEntry> {
        match self.kind {
            PayloadKind::Multi { element_size } => {
                let count = self.item_count();
                if count > MAX_ITEM_COUNT {
                    return Err(IghwError::ItemCountOverflow { id: self.id, count });
                }
                Ok(SectionEntry::multi(self.id, offset, count as u32, element_size))
            }
            PayloadKind::Single => {
                let length = u32::try_from(self.data.len())
                    .map_err(|_| IghwError::LayoutOverflow { id: self.id })?;
                Ok(SectionEntry::single(self.id, offset, length))
            }
        }
    }
}

/// Logical layout: every payload keyed by section id
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    sections: BTreeMap<u32, SectionPayload>,
}

impl SectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payload, replacing any earlier one with the same id
    pub fn insert(&mut self, payload: SectionPayload) {
        self.sections.insert(payload.id, payload);
    }

    pub fn get(&self, id: u32) -> Option<&SectionPayload> {
        self.sections.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.sections.contains_key(&id)
    }

    /// Non-empty payloads in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &SectionPayload> {
        self.sections.values().filter(|p| !p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
