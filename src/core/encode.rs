//! Container encode
//!
//! Encoding is split in two steps that never interleave:
//!
//! 1. [`build_sections`] turns a [`Level`] into a logical [`SectionSet`]:
//!    payload bytes with zero placeholders plus the patches that fill them.
//! 2. [`crate::layout::assemble`] places every section, resolves every patch
//!    and writes the pointer table.
//!
//! All per-run state lives in an [`EncodeContext`]; nothing is global.

use crate::config::{CodecConfig, RegistryFallback};
use crate::entity::{
    encode_category, Category, Entity, EntityCodec, EntityHeader, Reference,
};
use crate::error::Result;
use crate::header::Version;
use crate::layout::{assemble, Assembled};
use crate::level::Level;
use crate::names::NameInterner;
use crate::patch::{SectionPayload, SectionSet};
use crate::registry::InstanceTypeRegistry;
use crate::report::{Report, Warning};
use crate::subfile::{Subfile, SubfileAggregator, SubfileSlot};
use crate::zone::encode_region;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Accumulators of exactly one encode run
#[derive(Debug, Default)]
pub struct EncodeContext {
    pub registry: InstanceTypeRegistry,
    pub subfiles: SubfileAggregator,
    pub names: NameInterner,
    pub report: Report,
}

impl EncodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every accumulator before reuse
    pub fn reset(&mut self) {
        self.registry.reset();
        self.subfiles.reset();
        self.names.reset();
        self.report = Report::new();
    }

    /// Register a non-empty sub-blob in its pool
    pub fn register_subfile(&mut self, subfile: &Subfile) -> Option<SubfileSlot> {
        if subfile.is_empty() {
            return None;
        }
        Some(self.subfiles.register(subfile))
    }

    /// Registry row offset of a reference target, or a warning
    pub fn resolve(&mut self, owner: &EntityHeader, reference: &Reference) -> Option<u32> {
        let offset = self.registry.offset_of(reference.tuid);
        if offset.is_none() {
            self.report.push(Warning::UnresolvedReference {
                entity: owner.name.clone(),
                source_tuid: owner.tuid,
                target_tuid: reference.tuid,
            });
        }
        offset
    }
}

/// Type code a reference registers with: explicit tag, slot default, then target category
fn reference_type(
    reference: &Reference,
    implied: Option<u32>,
    categories: &HashMap<u64, Category>,
) -> Option<u32> {
    reference
        .type_code
        .or(implied)
        .or_else(|| categories.get(&reference.tuid).map(|c| c.type_code()))
}

/// Fill the registry for one run
pub fn build_registry(level: &Level, config: &CodecConfig, registry: &mut InstanceTypeRegistry) {
    let mut categories: HashMap<u64, Category> = HashMap::new();
    for entity in &level.entities {
        categories.entry(entity.tuid()).or_insert(entity.category());
    }

    let recorded = config.use_recorded_order && !level.instance_order.is_empty();
    if recorded {
        for entry in &level.instance_order {
            registry.push(entry.tuid, entry.type_code);
        }
    }

    for entity in &level.entities {
        if !recorded {
            registry.insert(entity.tuid(), entity.category().type_code());
        }
        for (reference, implied) in entity.references() {
            match reference.type_code {
                Some(code) => registry.insert(reference.tuid, code),
                None => {
                    if let Some(code) = reference_type(&reference, implied, &categories) {
                        registry.insert_if_absent(reference.tuid, code);
                    }
                }
            }
        }
    }

    if !recorded && config.registry_fallback == RegistryFallback::Sorted {
        registry.sort();
    }
    debug!(
        "registry built with {} rows ({})",
        registry.len(),
        if recorded { "recorded order" } else { "fallback order" }
    );
}

/// Name offsets per entity position, interned in recorded order first
fn intern_names(level: &Level, config: &CodecConfig, names: &mut NameInterner) -> Vec<u32> {
    let mut offsets: Vec<Option<u32>> = vec![None; level.entities.len()];
    if config.use_recorded_order {
        let mut by_tuid: HashMap<u64, VecDeque<usize>> = HashMap::new();
        for (i, entity) in level.entities.iter().enumerate() {
            by_tuid.entry(entity.tuid()).or_default().push_back(i);
        }
        for tuid in &level.name_order {
            if let Some(i) = by_tuid.get_mut(tuid).and_then(VecDeque::pop_front) {
                offsets[i] = Some(names.intern(level.entities[i].name()));
            }
        }
    }
    level
        .entities
        .iter()
        .zip(offsets)
        .map(|(entity, offset)| offset.unwrap_or_else(|| names.intern(entity.name())))
        .collect()
}

/// Entities of one category stably grouped by zone
fn grouped<'a, T: EntityCodec>(
    level: &'a Level,
    name_offsets: &[u32],
    pick: impl Fn(&'a Entity) -> Option<&'a T>,
) -> (Vec<&'a T>, Vec<u32>) {
    let mut items: Vec<(&'a T, u32)> = level
        .entities
        .iter()
        .zip(name_offsets)
        .filter_map(|(entity, offset)| pick(entity).map(|item| (item, *offset)))
        .collect();
    items.sort_by_key(|(item, _)| item.header().zone);
    items.into_iter().unzip()
}

/// Logical layout of a level
pub fn build_sections(level: &Level, config: &CodecConfig, ctx: &mut EncodeContext) -> SectionSet {
    let mut region = level.region.clone();
    let counts = level.zone_counts();
    for index in counts.keys() {
        if region.ensure_zone(*index) {
            ctx.report.push(Warning::SynthesizedZone {
                index: *index,
                name: crate::zone::Zone::placeholder_name(*index),
            });
        }
    }

    build_registry(level, config, &mut ctx.registry);
    let name_offsets = intern_names(level, config, &mut ctx.names);

    let mut set = SectionSet::new();
    let add = |set: &mut SectionSet, payloads: Vec<SectionPayload>| {
        for payload in payloads {
            set.insert(payload);
        }
    };

    // Sub-blobs land in the pools in this category order.
    let (props, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Prop(p) => Some(p),
        _ => None,
    });
    add(&mut set, encode_category(&props, &offsets, ctx));
    let (controllers, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Controller(c) => Some(c),
        _ => None,
    });
    add(&mut set, encode_category(&controllers, &offsets, ctx));
    let (clues, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Clue(c) => Some(c),
        _ => None,
    });
    add(&mut set, encode_category(&clues, &offsets, ctx));
    let (paths, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Path(p) => Some(p),
        _ => None,
    });
    add(&mut set, encode_category(&paths, &offsets, ctx));
    let (volumes, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Volume(v) => Some(v),
        _ => None,
    });
    add(&mut set, encode_category(&volumes, &offsets, ctx));
    let (areas, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Area(a) => Some(a),
        _ => None,
    });
    add(&mut set, encode_category(&areas, &offsets, ctx));
    let (pools, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Pool(p) => Some(p),
        _ => None,
    });
    add(&mut set, encode_category(&pools, &offsets, ctx));
    let (scents, offsets) = grouped(level, &name_offsets, |e| match e {
        Entity::Scent(s) => Some(s),
        _ => None,
    });
    add(&mut set, encode_category(&scents, &offsets, ctx));

    add(&mut set, encode_region(&region, &counts));
    set.insert(ctx.names.to_payload());
    set.insert(ctx.registry.to_payload());
    add(&mut set, ctx.subfiles.to_payloads().into());
    set
}

/// Version written for a level: its own when modern, the repack default otherwise
pub fn output_version(level: &Level) -> Version {
    if level.version.is_legacy() {
        Version::REPACK
    } else {
        level.version
    }
}

/// Encode a level into container bytes
pub fn encode_level(level: &Level, config: &CodecConfig) -> Result<(Assembled, Report)> {
    let mut ctx = EncodeContext::new();
    encode_with(level, config, &mut ctx)
}

/// Encode with a caller-owned context; the context is reset first
pub fn encode_with(level: &Level, config: &CodecConfig, ctx: &mut EncodeContext) -> Result<(Assembled, Report)> {
    ctx.reset();
    info!(
        "Encoding {} entities in {} zones",
        level.entities.len(),
        level.region.zones.len()
    );
    let set = build_sections(level, config, ctx);
    let mut report = std::mem::take(&mut ctx.report);
    let assembled = assemble(&set, output_version(level), &mut report)?;
    info!(
        "Encoded {} bytes, {} sections, {} pointers, {} warnings",
        assembled.bytes.len(),
        assembled.sections.len(),
        assembled.pointer_table.len(),
        report.len()
    );
    Ok((assembled, report))
}
