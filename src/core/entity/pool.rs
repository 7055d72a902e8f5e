//! Reference pools: a typed list of arbitrary instances
//!
//! ```text
//! 0x00  u32 list address (pool offsets section)
//! 0x04  u32 count
//! 0x08  8 padding bytes
//! ```
//!
//! Scent pools share this layout, see [`super::scent`].

use super::{
    decode_reference_list, encode_reference_list, CategoryOutput, EntityCodec, EntityHeader,
    Reference,
};
use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::patch::Patch;
use crate::record::{hex_value, references_value, FieldReader};
use crate::report::Report;
use crate::section::ids;
use serde_json::{Map, Value};

/// Data record shared by pools and scent pools
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListRecord {
    pub references: Vec<Reference>,
    pub padding: [u8; 8],
}

impl ListRecord {
    pub fn decode(
        header: &EntityHeader,
        data: &[u8],
        view: &DecodeView<'_>,
        report: &mut Report,
    ) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let list = r.u32()?;
        let count = r.u32()? as usize;
        let padding = r.array()?;
        Ok(ListRecord {
            references: decode_reference_list(list, count, header, view, report),
            padding,
        })
    }

    pub fn encode(
        references: &[Reference],
        padding: &[u8; 8],
        header: &EntityHeader,
        offsets_section: u32,
        out: &mut CategoryOutput,
        ctx: &mut EncodeContext,
    ) {
        let mut patches = Vec::with_capacity(1);
        if let Some(offsets) = out.aux.as_mut().filter(|_| !references.is_empty()) {
            let start = encode_reference_list(references, header, offsets, ctx);
            patches.push(Patch::new(0, offsets_section, start));
        }
        let mut w = ByteWriter::with_capacity(16);
        w.put_u32(0)
            .put_u32(references.len() as u32)
            .put_bytes(padding);
        out.data.push_record(w, patches);
    }
}

pub(crate) fn write_list_fields(references: &[Reference], padding: &[u8; 8], map: &mut Map<String, Value>) {
    map.insert("instance_references".into(), references_value(references));
    if *padding != [0; 8] {
        map.insert("data_padding".into(), hex_value(padding));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub header: EntityHeader,
    pub references: Vec<Reference>,
    pub padding: [u8; 8],
}

impl Pool {
    pub fn new(header: EntityHeader) -> Self {
        Pool {
            header,
            references: Vec::new(),
            padding: [0; 8],
        }
    }
}

impl EntityCodec for Pool {
    const CATEGORY: Category = Category::Pool;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let list = ListRecord::decode(&header, data, view, report)?;
        Ok(Pool {
            header,
            references: list.references,
            padding: list.padding,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        ListRecord::encode(
            &self.references,
            &self.padding,
            &self.header,
            ids::POOL_OFFSETS,
            out,
            ctx,
        );
    }

    fn aux_section() -> Option<u32> {
        Some(ids::POOL_OFFSETS)
    }

    /// Pool slots carry no implied type; untyped targets take their own category
    fn references(&self) -> Vec<(Reference, Option<u32>)> {
        self.references.iter().map(|r| (*r, None)).collect()
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        write_list_fields(&self.references, &self.padding, map);
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        Pool {
            header,
            references: r.references("instance_references"),
            padding: r.bytes("data_padding", [0; 8]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPayload;

    fn output() -> CategoryOutput {
        CategoryOutput {
            data: SectionPayload::multi(ids::POOL_DATA, 16),
            aux: Pool::aux_section().map(SectionPayload::single),
        }
    }

    #[test]
    fn test_empty_pool_has_no_list_pointer() {
        let pool = Pool::new(EntityHeader::new(2, "Empty", 0));
        let mut out = output();
        pool.encode(&mut out, &mut EncodeContext::new());
        assert!(out.data.patches.is_empty());
        assert!(out.aux.unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_slot_is_zero_but_counted() {
        let mut ctx = EncodeContext::new();
        ctx.registry.insert(1, 0);

        let mut pool = Pool::new(EntityHeader::new(2, "Crates", 0));
        pool.references = vec![Reference::typed(1, 0), Reference::new(0xDEAD)];
        let mut out = output();
        pool.encode(&mut out, &mut ctx);

        assert_eq!(&out.data.data[4..8], &2u32.to_be_bytes());
        let offsets = out.aux.unwrap();
        assert_eq!(offsets.len(), 8);
        assert_eq!(offsets.patches, vec![Patch::new(0, ids::INSTANCE_TYPES, 0)]);
        assert_eq!(ctx.report.unresolved_references().count(), 1);
    }
}
