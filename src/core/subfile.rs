//! Embedded sub-blob pools
//!
//! Props, controllers and clues may carry a sub-binary. It is stored in one
//! of two single-block pools:
//!
//! - **host**: appended every time, byte-identical blobs included
//! - **local**: deduplicated by SHA-256 of the content within one encode run

use crate::patch::SectionPayload;
use crate::section::ids;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Host,
    Local,
}

impl PoolKind {
    pub fn section_id(self) -> u32 {
        match self {
            PoolKind::Host => ids::HOST_POOL,
            PoolKind::Local => ids::LOCAL_POOL,
        }
    }

    pub fn from_section(id: u32) -> Option<Self> {
        match id {
            ids::HOST_POOL => Some(PoolKind::Host),
            ids::LOCAL_POOL => Some(PoolKind::Local),
            _ => None,
        }
    }

    /// File name tag of a sub-blob in a workspace
    pub fn tag(self) -> &'static str {
        match self {
            PoolKind::Host => "host",
            PoolKind::Local => "local",
        }
    }
}

/// A sub-binary and the pool it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfile {
    pub pool: PoolKind,
    pub bytes: Vec<u8>,
}

impl Subfile {
    pub fn new(pool: PoolKind, bytes: Vec<u8>) -> Self {
        Subfile { pool, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where a registered sub-blob landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubfileSlot {
    pub pool: PoolKind,
    /// Offset inside the pool section
    pub offset: u32,
    pub length: u32,
}

/// Per-run accumulator for both pools
#[derive(Debug, Clone, Default)]
pub struct SubfileAggregator {
    host: Vec<u8>,
    local: Vec<u8>,
    local_index: HashMap<[u8; 32], u32>,
}

impl SubfileAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.host.clear();
        self.local.clear();
        self.local_index.clear();
    }

    pub fn register(&mut self, subfile: &Subfile) -> SubfileSlot {
        let offset = match subfile.pool {
            PoolKind::Host => self.register_host(&subfile.bytes),
            PoolKind::Local => self.register_local(&subfile.bytes),
        };
        SubfileSlot {
            pool: subfile.pool,
            offset,
            length: subfile.bytes.len() as u32,
        }
    }

    /// Always appends
    pub fn register_host(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.host.len() as u32;
        self.host.extend_from_slice(bytes);
        offset
    }

    /// Appends unless identical content was registered earlier in this run
    pub fn register_local(&mut self, bytes: &[u8]) -> u32 {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        if let Some(offset) = self.local_index.get(&digest) {
            return *offset;
        }
        let offset = self.local.len() as u32;
        self.local.extend_from_slice(bytes);
        self.local_index.insert(digest, offset);
        offset
    }

    pub fn host_len(&self) -> usize {
        self.host.len()
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Pool payloads; empty pools are dropped by the assembler
    pub fn to_payloads(&self) -> [SectionPayload; 2] {
        [
            SectionPayload::single(ids::HOST_POOL).with_data(self.host.clone()),
            SectionPayload::single(ids::LOCAL_POOL).with_data(self.local.clone()),
        ]
    }
}
