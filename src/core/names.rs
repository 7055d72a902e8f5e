//! Name pool
//!
//! Display names live in one single-block section of NUL-terminated UTF-8
//! strings. Entries are never deduplicated: each entity owns the entry its
//! metadata points at, even when another entity has the same name.

use crate::patch::SectionPayload;
use crate::section::ids;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub offset: u32,
    pub text: String,
}

/// Encode-side string pool builder
#[derive(Debug, Clone, Default)]
pub struct NameInterner {
    data: Vec<u8>,
    entries: Vec<NameEntry>,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` and return the offset of the new entry
    pub fn intern(&mut self, name: &str) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(name.as_bytes());
        self.data.push(0);
        self.entries.push(NameEntry {
            offset,
            text: name.to_string(),
        });
        offset
    }

    pub fn entries(&self) -> &[NameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.entries.clear();
    }

    pub fn to_payload(&self) -> SectionPayload {
        SectionPayload::single(ids::NAMES).with_data(self.data.clone())
    }
}
