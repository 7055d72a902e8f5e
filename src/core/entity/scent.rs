//! Scent pools: untyped reference lists, laid out like [`super::Pool`]

use super::pool::{write_list_fields, ListRecord};
use super::{CategoryOutput, EntityCodec, EntityHeader, Reference};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::record::FieldReader;
use crate::report::Report;
use crate::section::ids;
use serde_json::{Map, Value};

/// Registry type given to scent targets that carry no explicit type
pub const IMPLIED_TARGET_TYPE: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Scent {
    pub header: EntityHeader,
    pub references: Vec<Reference>,
    pub padding: [u8; 8],
}

impl Scent {
    pub fn new(header: EntityHeader) -> Self {
        Scent {
            header,
            references: Vec::new(),
            padding: [0; 8],
        }
    }
}

impl EntityCodec for Scent {
    const CATEGORY: Category = Category::Scent;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let list = ListRecord::decode(&header, data, view, report)?;
        Ok(Scent {
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
            ids::SCENT_OFFSETS,
            out,
            ctx,
        );
    }

    fn aux_section() -> Option<u32> {
        Some(ids::SCENT_OFFSETS)
    }

    fn references(&self) -> Vec<(Reference, Option<u32>)> {
        self.references
            .iter()
            .map(|r| (*r, Some(IMPLIED_TARGET_TYPE)))
            .collect()
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        write_list_fields(&self.references, &self.padding, map);
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        Scent {
            header,
            references: r.references("instance_references"),
            padding: r.bytes("data_padding", [0; 8]),
        }
    }
}
