//! Story clues
//!
//! ```text
//! 0x00  u32 volume reference (registry row address)
//! 0x04  u32 sub-blob address
//! 0x08  u32 sub-blob length
//! 0x0C  u32 class id
//! ```

use super::{CategoryOutput, EntityCodec, EntityHeader, Reference};
use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::patch::Patch;
use crate::record::{references_value, FieldReader};
use crate::report::Report;
use crate::section::ids;
use crate::subfile::Subfile;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Clue {
    pub header: EntityHeader,
    pub volume: Option<Reference>,
    pub class_id: u32,
    pub subfile: Option<Subfile>,
}

impl Clue {
    pub fn new(header: EntityHeader) -> Self {
        Clue {
            header,
            volume: None,
            class_id: 0,
            subfile: None,
        }
    }
}

impl EntityCodec for Clue {
    const CATEGORY: Category = Category::Clue;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let volume_address = r.u32()?;
        let subfile_address = r.u32()?;
        let subfile_length = r.u32()?;
        let class_id = r.u32()?;

        // A clue without a volume stores zero, that is not a dangling edge.
        let volume = match volume_address {
            0 => None,
            address => view.reference_at(address, &header, report),
        };
        let subfile = view.subfile(subfile_address, subfile_length, &header, report);
        Ok(Clue {
            header,
            volume,
            class_id,
            subfile,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        let mut patches = Vec::with_capacity(2);
        if let Some(entry) = self.volume.and_then(|v| ctx.resolve(&self.header, &v)) {
            patches.push(Patch::new(0, ids::INSTANCE_TYPES, entry));
        }
        let slot = self.subfile.as_ref().and_then(|s| ctx.register_subfile(s));
        if let Some(slot) = slot {
            patches.push(Patch::new(4, slot.pool.section_id(), slot.offset));
        }

        let mut w = ByteWriter::with_capacity(16);
        w.put_u32(0)
            .put_u32(0)
            .put_u32(slot.map_or(0, |s| s.length))
            .put_u32(self.class_id);
        out.data.push_record(w, patches);
    }

    fn references(&self) -> Vec<(Reference, Option<u32>)> {
        self.volume
            .iter()
            .map(|r| (*r, Some(Category::Volume.type_code())))
            .collect()
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("class_id".into(), json!(self.class_id));
        let refs: Vec<Reference> = self.volume.into_iter().collect();
        map.insert("volume_references".into(), references_value(&refs));
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        let class_id = r.u32("class_id", 0);
        let mut refs = r.references("volume_references");
        if refs.is_empty() && r.has("volume_tuid") {
            refs.push(Reference::new(r.tuid("volume_tuid")));
        }
        if refs.len() > 1 {
            r.report_malformed(
                "volume_references",
                format!("first of {} references", refs.len()),
            );
        }
        Clue {
            header,
            volume: refs.first().copied(),
            class_id,
            subfile: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPayload;
    use crate::report::Report;

    #[test]
    fn test_legacy_volume_key() {
        let value = json!({ "volume_tuid": "0x22", "class_id": 9 });
        let mut report = Report::new();
        let mut r = FieldReader::new(value.as_object().unwrap(), "c.clue.json", &mut report);
        let clue = Clue::read_fields(EntityHeader::new(1, "c", 0), &mut r);
        assert_eq!(clue.volume, Some(Reference::new(0x22)));
        assert_eq!(clue.class_id, 9);
        assert!(report.is_clean());
    }

    #[test]
    fn test_missing_volume_leaves_zero() {
        let mut clue = Clue::new(EntityHeader::new(1, "c", 0));
        clue.volume = Some(Reference::new(0x99));
        let mut ctx = EncodeContext::new();
        let mut out = CategoryOutput {
            data: SectionPayload::multi(ids::CLUE_INFO, 16),
            aux: None,
        };
        clue.encode(&mut out, &mut ctx);
        assert!(out.data.patches.is_empty());
        assert_eq!(&out.data.data[0..4], &[0; 4]);
        assert_eq!(ctx.report.unresolved_references().count(), 1);
    }
}
