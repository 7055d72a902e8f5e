//! Zones and the region that lists them
//!
//! ```text
//! zone metadata (144): name[64] | 9 x (u32 data address, u32 count) | 4 x u16 tail
//! zone offsets   (36): 9 x u32 metadata address
//! zone indices       : u16 per zone
//! region names (0x48): name[64] | u32 zone indices address | u32 zone count
//! region data    (16): u32 zone metadata address | u32 zone count
//!                      u32 region names address  | u32 region count
//! region pointer  (4): u32 zone offsets address
//! ```
//!
//! Zone N's entities of one category occupy the slice of that category's
//! sections right after every earlier zone's entities of the same category.

use crate::cursor::{fixed_str, ByteReader, ByteWriter};
use crate::entity::{Category, METADATA_SIZE};
use crate::patch::{Patch, SectionPayload};
use crate::report::{Report, Warning};
use crate::section::{ids, Container};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NAME_SIZE: usize = 64;
pub const ZONE_RECORD_SIZE: usize = 144;
pub const ZONE_OFFSETS_SIZE: usize = 36;
pub const REGION_NAMES_SIZE: usize = 0x48;
/// Eight categories plus one slot that is always empty
pub const SLOT_COUNT: usize = 9;

pub const DEFAULT_REGION: &str = "default";

/// Per-category entity counts of one zone, indexed by zone slot
pub type SlotCounts = [u32; SLOT_COUNT];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub index: u16,
    pub name: String,
    /// Opaque values carried through unchanged
    #[serde(default)]
    pub tail: [u16; 4],
}

impl Zone {
    pub fn new(index: u16, name: impl Into<String>) -> Self {
        Zone {
            index,
            name: name.into(),
            tail: [0; 4],
        }
    }

    pub fn placeholder_name(index: u16) -> String {
        format!("zone_{}", index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub zones: Vec<Zone>,
}

impl Default for Region {
    fn default() -> Self {
        Region {
            name: DEFAULT_REGION.to_string(),
            zones: Vec::new(),
        }
    }
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Region {
            name: name.into(),
            zones: Vec::new(),
        }
    }

    pub fn zone(&self, index: u16) -> Option<&Zone> {
        self.zones.iter().find(|z| z.index == index)
    }

    /// Add a zone with a placeholder name and zero tail if `index` is unknown
    pub fn ensure_zone(&mut self, index: u16) -> bool {
        if self.zone(index).is_some() {
            return false;
        }
        self.zones.push(Zone::new(index, Zone::placeholder_name(index)));
        true
    }

    /// Zones by ascending index, first entry wins on duplicates
    pub fn sorted_zones(&self) -> Vec<&Zone> {
        let mut by_index: BTreeMap<u16, &Zone> = BTreeMap::new();
        for zone in &self.zones {
            by_index.entry(zone.index).or_insert(zone);
        }
        by_index.into_values().collect()
    }
}

/// Build the zone and region payloads from per-zone counts
pub fn encode_region(region: &Region, counts: &BTreeMap<u16, SlotCounts>) -> Vec<SectionPayload> {
    let zones = region.sorted_zones();
    let mut meta = SectionPayload::multi(ids::ZONE_METADATA, ZONE_RECORD_SIZE as u32);
    let mut offsets = SectionPayload::multi(ids::ZONE_OFFSETS, ZONE_OFFSETS_SIZE as u32);
    let mut indices = ByteWriter::with_capacity(zones.len() * 2);
    let mut running: SlotCounts = [0; SLOT_COUNT];

    for zone in &zones {
        let zone_counts = counts.get(&zone.index).copied().unwrap_or_default();
        let mut record = ByteWriter::with_capacity(ZONE_RECORD_SIZE);
        let mut record_patches = Vec::new();
        let mut slots = ByteWriter::with_capacity(ZONE_OFFSETS_SIZE);
        let mut slot_patches = Vec::new();

        record.put_fixed_str(&zone.name, NAME_SIZE);
        for slot in 0..SLOT_COUNT {
            let count = zone_counts[slot];
            let category = Category::ALL.get(slot).copied().filter(|_| count > 0);
            if let Some(category) = category {
                let at = (NAME_SIZE + slot * 8) as u32;
                let data_offset = running[slot] * category.data_size() as u32;
                record_patches.push(Patch::new(at, category.data_section(), data_offset));
                let meta_offset = running[slot] * METADATA_SIZE as u32;
                slot_patches.push(Patch::new((slot * 4) as u32, category.metadata_section(), meta_offset));
            }
            record.put_u32(0).put_u32(count);
            slots.put_u32(0);
            running[slot] += count;
        }
        for value in zone.tail {
            record.put_u16(value);
        }

        meta.push_record(record, record_patches);
        offsets.push_record(slots, slot_patches);
        indices.put_u16(zone.index);
    }

    let mut names = ByteWriter::with_capacity(REGION_NAMES_SIZE);
    names
        .put_fixed_str(&region.name, NAME_SIZE)
        .put_u32(0)
        .put_u32(zones.len() as u32);
    let mut region_names = SectionPayload::multi(ids::DEFAULT_REGION_NAMES, REGION_NAMES_SIZE as u32);
    region_names.push_record(names, [Patch::new(NAME_SIZE as u32, ids::ZONE_INDICES, 0)]);

    let mut data = ByteWriter::with_capacity(16);
    data.put_u32(0).put_u32(zones.len() as u32).put_u32(0).put_u32(1);
    let mut region_data = SectionPayload::single(ids::REGION_DATA);
    region_data.push_record(
        data,
        [
            Patch::new(0, ids::ZONE_METADATA, 0),
            Patch::new(8, ids::DEFAULT_REGION_NAMES, 0),
        ],
    );

    let mut region_pointers = SectionPayload::single(ids::REGION_POINTERS);
    region_pointers.push_pointer(ids::ZONE_OFFSETS, 0);

    vec![
        meta,
        offsets,
        SectionPayload::single(ids::ZONE_INDICES).with_data(indices.into_inner()),
        region_names,
        region_data,
        region_pointers,
    ]
}

/// A zone as read back, with the counts its record claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedZone {
    pub zone: Zone,
    pub counts: SlotCounts,
}

/// Read the region name and zone records; absent sections yield an empty default region
pub fn decode_region(container: &Container<'_>, report: &mut Report) -> (Region, Vec<DecodedZone>) {
    let name = container
        .section_bytes(ids::DEFAULT_REGION_NAMES)
        .filter(|b| b.len() >= NAME_SIZE)
        .map(|b| fixed_str(&b[..NAME_SIZE]))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let Some(meta) = container.section_bytes(ids::ZONE_METADATA) else {
        return (Region::new(name), Vec::new());
    };
    let zone_count = meta.len() / ZONE_RECORD_SIZE;

    let indices: Vec<u16> = container
        .section_bytes(ids::ZONE_INDICES)
        .map(|b| b.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
        .unwrap_or_default();
    let indices = if indices.len() == zone_count {
        indices
    } else {
        if !indices.is_empty() {
            report.push(Warning::CountMismatch {
                context: "zone index list".into(),
                detail: format!(
                    "{} indices for {} zones, using record positions",
                    indices.len(),
                    zone_count
                ),
            });
        }
        (0..zone_count as u16).collect()
    };

    let mut decoded = Vec::with_capacity(zone_count);
    for (i, index) in indices.into_iter().enumerate() {
        let record = &meta[i * ZONE_RECORD_SIZE..(i + 1) * ZONE_RECORD_SIZE];
        let mut r = ByteReader::at(record, NAME_SIZE);
        let mut counts: SlotCounts = [0; SLOT_COUNT];
        let mut tail = [0u16; 4];
        // Records are sliced at full size, these reads cannot run short.
        for count in counts.iter_mut() {
            *count = r.u32().and_then(|_| r.u32()).unwrap_or(0);
        }
        for value in tail.iter_mut() {
            *value = r.u16().unwrap_or(0);
        }
        decoded.push(DecodedZone {
            zone: Zone {
                index,
                name: fixed_str(&record[..NAME_SIZE]),
                tail,
            },
            counts,
        });
    }

    let region = Region {
        name,
        zones: decoded.iter().map(|d| d.zone.clone()).collect(),
    };
    (region, decoded)
}
