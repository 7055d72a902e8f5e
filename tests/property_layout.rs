//! Property-based tests for layout invariants
//!
//! Uses proptest to check alignment, section flag consistency, padding and
//! the sub-blob dedup law across many random levels.

use ighw_rs::core::layout::{is_padding, ALIGNMENT};
use ighw_rs::core::section::ids;
use ighw_rs::{
    Codec, Container, Entity, EntityHeader, InstanceTypeEntry, Level, Pool, PoolKind, Prop,
    Reference, Region, Subfile, Zone,
};
use proptest::prelude::*;

fn level_from(props: &[(String, u16)], zone_count: u16) -> Level {
    let mut region = Region::new("prop");
    for index in 0..zone_count {
        region.zones.push(Zone::new(index, format!("zone{}", index)));
    }
    let mut level = Level::new(region);
    let mut pool = Pool::new(EntityHeader::new(0xFFFF, "everything", 0));
    for (i, (name, zone)) in props.iter().enumerate() {
        let tuid = i as u64 + 1;
        level.push(Entity::Prop(Prop::new(EntityHeader::new(tuid, name.clone(), zone % zone_count))));
        pool.references.push(Reference::new(tuid));
    }
    level.push(Entity::Pool(pool));
    level
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

proptest! {
    #[test]
    fn prop_sections_and_pointer_table_aligned(
        props in prop::collection::vec(("[a-zA-Z ]{0,12}", 0u16..4), 0..40),
        zone_count in 1u16..4
    ) {
        let (bytes, _) = Codec::new().encode(&level_from(&props, zone_count)).unwrap();
        let container = Container::parse(&bytes).unwrap();

        for entry in container.sections.entries() {
            prop_assert_eq!(entry.offset as usize % ALIGNMENT, 0, "section {:#x}", entry.id);
        }
        prop_assert_eq!(container.header.pointer_table_offset as usize % ALIGNMENT, 0);
        prop_assert_eq!(
            bytes.len(),
            container.header.pointer_table_offset as usize + 4 * container.header.pointer_count as usize
        );
    }

    #[test]
    fn prop_section_flags_consistent(
        props in prop::collection::vec(("[a-z]{1,8}", 0u16..2), 1..30)
    ) {
        let (bytes, _) = Codec::new().encode(&level_from(&props, 2)).unwrap();
        let container = Container::parse(&bytes).unwrap();

        for entry in container.sections.entries() {
            if entry.flag.is_multi_item() {
                prop_assert_eq!(entry.length(), entry.count as u64 * entry.element_size as u64);
            } else {
                prop_assert_eq!(entry.item_count(), 1);
                prop_assert_eq!(entry.length(), entry.element_size as u64);
            }
        }
    }

    #[test]
    fn prop_gaps_are_filler(
        props in prop::collection::vec(("[a-z]{1,8}", 0u16..3), 1..20)
    ) {
        let (bytes, _) = Codec::new().encode(&level_from(&props, 3)).unwrap();
        let container = Container::parse(&bytes).unwrap();

        let mut end = container.header.header_length as usize;
        for entry in container.sections.entries() {
            prop_assert!(is_padding(&bytes[end..entry.offset as usize]));
            end = entry.end() as usize;
        }
        prop_assert!(is_padding(&bytes[end..container.header.pointer_table_offset as usize]));
    }

    #[test]
    fn prop_local_dedups_host_does_not(
        blob in prop::collection::vec(any::<u8>(), 1..256),
        local in any::<bool>()
    ) {
        let pool = if local { PoolKind::Local } else { PoolKind::Host };
        let mut level = level_from(&[("a".to_string(), 0), ("b".to_string(), 0)], 1);
        for entity in level.entities.iter_mut().take(2) {
            entity.set_subfile(Some(Subfile::new(pool, blob.clone())));
        }
        let (bytes, _) = Codec::new().encode(&level).unwrap();
        let container = Container::parse(&bytes).unwrap();

        let section = container.section(pool.section_id()).unwrap();
        let props = container.section(ids::PROP_DATA).unwrap();
        let first = u32_at(&bytes, props.offset as usize + 12);
        let second = u32_at(&bytes, props.offset as usize + 80 + 12);
        if local {
            prop_assert_eq!(section.length(), blob.len() as u64);
            prop_assert_eq!(first, second);
        } else {
            prop_assert_eq!(section.length(), 2 * blob.len() as u64);
            prop_assert_eq!(second - first, blob.len() as u32);
        }
    }

    #[test]
    fn prop_every_reference_resolves_or_is_zero(
        targets in prop::collection::vec(1u64..20, 0..16),
        prop_count in 0usize..10
    ) {
        let props: Vec<(String, u16)> = (0..prop_count).map(|i| (format!("p{}", i), 0)).collect();
        let mut level = level_from(&props, 1);
        if let Some(Entity::Pool(pool)) = level.entities.last_mut() {
            pool.references = targets.iter().map(|t| Reference::new(*t)).collect();
        }
        let (bytes, report) = Codec::new().encode(&level).unwrap();
        let container = Container::parse(&bytes).unwrap();

        let unresolved = targets.iter().filter(|t| **t as usize > prop_count).count();
        prop_assert_eq!(report.unresolved_references().count(), unresolved);

        if let Some(offsets) = container.section(ids::POOL_OFFSETS) {
            let registry = container.section(ids::INSTANCE_TYPES).unwrap();
            for (i, target) in targets.iter().enumerate() {
                let address = u32_at(&bytes, offsets.offset as usize + 4 * i);
                if *target as usize > prop_count {
                    prop_assert_eq!(address, 0);
                } else {
                    prop_assert!(registry.contains(address));
                    let tuid = u64::from_be_bytes(bytes[address as usize..address as usize + 8].try_into().unwrap());
                    prop_assert_eq!(tuid, *target);
                }
            }
        }
    }

    #[test]
    fn prop_repeated_registry_rows_round_trip(
        recorded in prop::collection::vec(1u64..6, 1..24),
        prop_count in 1usize..6
    ) {
        let props: Vec<(String, u16)> = (0..prop_count).map(|i| (format!("p{}", i), 0)).collect();
        let mut level = level_from(&props, 1);
        level.instance_order = recorded.iter().map(|t| InstanceTypeEntry::new(*t, 0)).collect();
        let codec = Codec::new();
        let (original, _) = codec.encode(&level).unwrap();

        let (decoded, _) = codec.decode(&original).unwrap();
        prop_assert_eq!(&decoded.instance_order[..recorded.len()], &level.instance_order[..]);
        let (rebuilt, _) = codec.encode(&decoded).unwrap();
        prop_assert_eq!(&rebuilt, &original);

        let container = Container::parse(&original).unwrap();
        let registry = container.section(ids::INSTANCE_TYPES).unwrap();
        let offsets = container.section(ids::POOL_OFFSETS).unwrap();
        for i in 0..prop_count {
            let tuid = i as u64 + 1;
            let first = decoded.instance_order.iter().position(|e| e.tuid == tuid).unwrap();
            let address = u32_at(&original, offsets.offset as usize + 4 * i);
            prop_assert_eq!(address, registry.offset + 16 * first as u32);
        }
    }
}
