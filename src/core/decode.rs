//! Container decode
//!
//! Header, then section table, then names, registry and entity codecs,
//! then zones. Every address is dereferenced immediately; addresses that
//! lead nowhere are reported and dropped.

use crate::cursor::{u32_at, u64_at, ByteReader};
use crate::entity::{
    decode_category, Area, Category, Clue, Controller, Entity, EntityHeader, Path, Pool, Prop,
    Reference, Scent, Volume, METADATA_SIZE,
};
use crate::error::Result;
use crate::level::Level;
use crate::registry::{parse_entries, ENTRY_SIZE};
use crate::report::{Report, Warning};
use crate::section::{ids, Container, SectionEntry};
use crate::subfile::{PoolKind, Subfile};
use crate::zone::decode_region;
use tracing::{debug, info};

/// Address resolution over one parsed container
pub struct DecodeView<'a> {
    pub container: Container<'a>,
    names: Option<SectionEntry>,
    registry: Option<SectionEntry>,
}

impl<'a> DecodeView<'a> {
    pub fn new(container: Container<'a>) -> Self {
        let names = container.section(ids::NAMES).copied();
        let registry = container.section(ids::INSTANCE_TYPES).copied();
        DecodeView {
            container,
            names,
            registry,
        }
    }

    /// Display name at an absolute address
    pub fn name_at(&self, address: u32, tuid: u64, report: &mut Report) -> String {
        let data = self.container.data();
        let entity = format!("{:#x}", tuid);
        if let Some(names) = self.names.filter(|n| n.contains(address)) {
            let start = names.offset as usize;
            let pool = &data[start..start + names.length() as usize];
            if let Ok(raw) = ByteReader::at(pool, (address - names.offset) as usize).cstr_bytes() {
                return utf8_name(raw, &entity, report);
            }
        }
        if (address as usize) < data.len() && address != 0 {
            report.push(Warning::BadAddress {
                entity: entity.clone(),
                address,
                detail: "name outside the name pool".into(),
            });
            return match ByteReader::at(data, address as usize).cstr_bytes() {
                Ok(raw) => utf8_name(raw, &entity, report),
                Err(_) => String::new(),
            };
        }
        report.push(Warning::BadAddress {
            entity,
            address,
            detail: "name address out of range, name left empty".into(),
        });
        String::new()
    }

    /// Reference stored as a registry row address
    pub fn reference_at(&self, address: u32, owner: &EntityHeader, report: &mut Report) -> Option<Reference> {
        if address == 0 {
            report.push(Warning::BadAddress {
                entity: owner.label(),
                address,
                detail: "null reference dropped".into(),
            });
            return None;
        }
        let data = self.container.data();
        if let Some(registry) = self.registry {
            let row = if registry.contains(address) {
                let relative = address - registry.offset;
                Some(registry.offset + relative - relative % ENTRY_SIZE)
            } else if (address as u64) < registry.length() && address % ENTRY_SIZE == 0 {
                report.push(Warning::BadAddress {
                    entity: owner.label(),
                    address,
                    detail: "registry-relative reference, rebuilt as absolute".into(),
                });
                Some(registry.offset + address)
            } else {
                None
            };
            if let Some(row) = row {
                let row = row as usize;
                if let (Ok(tuid), Ok(code)) = (u64_at(data, row), u32_at(data, row + 8)) {
                    return Some(Reference::typed(tuid, code));
                }
            }
        }
        match u64_at(data, address as usize) {
            Ok(tuid) => {
                report.push(Warning::BadAddress {
                    entity: owner.label(),
                    address,
                    detail: "reference outside the instance type registry, read as bare TUID".into(),
                });
                Some(Reference::new(tuid))
            }
            Err(_) => {
                report.push(Warning::BadAddress {
                    entity: owner.label(),
                    address,
                    detail: "reference past end of file dropped".into(),
                });
                None
            }
        }
    }

    /// Sub-blob at `address`, pool decided by the section containing it
    pub fn subfile(&self, address: u32, length: u32, owner: &EntityHeader, report: &mut Report) -> Option<Subfile> {
        if length == 0 {
            return None;
        }
        let data = self.container.data();
        let end = address as u64 + length as u64;
        if address == 0 || end > data.len() as u64 {
            report.push(Warning::BadAddress {
                entity: owner.label(),
                address,
                detail: format!("sub-blob of {} bytes out of range, dropped", length),
            });
            return None;
        }
        let pool = self
            .container
            .sections
            .containing(address)
            .and_then(|s| PoolKind::from_section(s.id));
        let pool = pool.unwrap_or_else(|| {
            report.push(Warning::BadAddress {
                entity: owner.label(),
                address,
                detail: "sub-blob outside both pools, kept as host".into(),
            });
            PoolKind::Host
        });
        Some(Subfile::new(pool, data[address as usize..end as usize].to_vec()))
    }

    /// Class enum of a sub-blob that is itself an IGHW container
    pub fn class_enum(&self, blob: &[u8]) -> Option<u32> {
        let inner = Container::parse(blob).ok()?;
        let entry = inner.section(ids::CLASS_ENUM)?;
        u32_at(blob, entry.offset as usize).ok()
    }
}

/// Decode a name, reporting bytes that are not UTF-8
fn utf8_name(raw: &[u8], entity: &str, report: &mut Report) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(raw).into_owned();
            report.push(Warning::MalformedField {
                record: entity.to_string(),
                field: "name".into(),
                fallback: text.clone(),
            });
            text
        }
    }
}

/// Entity TUIDs ordered by the address of their name
fn name_order(view: &DecodeView<'_>) -> Vec<u64> {
    let mut named = Vec::new();
    for category in Category::ALL {
        let Some(meta) = view.container.section_bytes(category.metadata_section()) else {
            continue;
        };
        for record in meta.chunks_exact(METADATA_SIZE) {
            let mut r = ByteReader::new(record);
            if let (Ok(tuid), Ok(address)) = (r.u64(), r.u32()) {
                named.push((address, tuid));
            }
        }
    }
    named.sort_by_key(|(address, _)| *address);
    named.into_iter().map(|(_, tuid)| tuid).collect()
}

/// Decode a whole container. Only format errors are fatal.
pub fn decode_level(bytes: &[u8]) -> Result<(Level, Report)> {
    let container = Container::parse(bytes)?;
    info!(
        "Decoding IGHW {} with {} sections ({} bytes)",
        container.header.version,
        container.sections.len(),
        bytes.len()
    );
    let view = DecodeView::new(container);
    let mut report = Report::new();

    let (region, zones) = decode_region(&view.container, &mut report);

    let mut entities = Vec::new();
    entities.extend(decode_category::<Prop>(&view, &mut report).into_iter().map(Entity::Prop));
    entities.extend(decode_category::<Path>(&view, &mut report).into_iter().map(Entity::Path));
    entities.extend(decode_category::<Volume>(&view, &mut report).into_iter().map(Entity::Volume));
    entities.extend(decode_category::<Clue>(&view, &mut report).into_iter().map(Entity::Clue));
    entities.extend(
        decode_category::<Controller>(&view, &mut report)
            .into_iter()
            .map(Entity::Controller),
    );
    entities.extend(decode_category::<Area>(&view, &mut report).into_iter().map(Entity::Area));
    entities.extend(decode_category::<Pool>(&view, &mut report).into_iter().map(Entity::Pool));
    entities.extend(decode_category::<Scent>(&view, &mut report).into_iter().map(Entity::Scent));

    let instance_order = view
        .container
        .section_bytes(ids::INSTANCE_TYPES)
        .map(parse_entries)
        .unwrap_or_default();

    let level = Level {
        version: view.container.header.version,
        region,
        entities,
        instance_order,
        name_order: name_order(&view),
    };

    let actual = level.zone_counts();
    for decoded in &zones {
        let found = actual.get(&decoded.zone.index).copied().unwrap_or_default();
        if found != decoded.counts {
            report.push(Warning::CountMismatch {
                context: format!("zone {} ({})", decoded.zone.index, decoded.zone.name),
                detail: format!("record claims {:?}, entities give {:?}", decoded.counts, found),
            });
        }
    }

    debug!(
        "decoded {} entities in {} zones, {} registry rows",
        level.entities.len(),
        level.region.zones.len(),
        level.instance_order.len()
    );
    Ok((level, report))
}
