//! Decoded level: everything needed to rebuild a container

use crate::entity::{Category, Entity};
use crate::header::Version;
use crate::registry::InstanceTypeEntry;
use crate::zone::{Region, SlotCounts, SLOT_COUNT};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Level {
    /// Version of the source container
    pub version: Version,
    pub region: Region,
    /// Entities grouped by category, in section order within each
    pub entities: Vec<Entity>,
    /// Registry rows in source order
    pub instance_order: Vec<InstanceTypeEntry>,
    /// Entity TUIDs in name pool order
    pub name_order: Vec<u64>,
}

impl Level {
    pub fn new(region: Region) -> Self {
        Level {
            region,
            ..Self::default()
        }
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn of_category(&self, category: Category) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.category() == category)
    }

    pub fn find(&self, tuid: u64) -> Option<&Entity> {
        self.entities.iter().find(|e| e.tuid() == tuid)
    }

    pub fn count(&self, category: Category) -> usize {
        self.of_category(category).count()
    }

    /// Entity counts per zone index and zone slot
    pub fn zone_counts(&self) -> BTreeMap<u16, SlotCounts> {
        let mut counts: BTreeMap<u16, SlotCounts> = BTreeMap::new();
        for entity in &self.entities {
            counts.entry(entity.zone()).or_insert([0; SLOT_COUNT])[entity.category().zone_slot()] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Pool, Prop};

    #[test]
    fn test_zone_counts() {
        let mut level = Level::default();
        level.push(Entity::Prop(Prop::new(EntityHeader::new(1, "a", 0))));
        level.push(Entity::Prop(Prop::new(EntityHeader::new(2, "b", 2))));
        level.push(Entity::Pool(Pool::new(EntityHeader::new(3, "c", 2))));

        let counts = level.zone_counts();
        assert_eq!(counts[&0][0], 1);
        assert_eq!(counts[&2][Category::Prop.zone_slot()], 1);
        assert_eq!(counts[&2][Category::Pool.zone_slot()], 1);
        assert_eq!(level.count(Category::Prop), 2);
        assert_eq!(level.find(3).map(|e| e.category()), Some(Category::Pool));
    }
}
