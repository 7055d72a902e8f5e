//! Gameplay areas: a list of paths and a list of volumes
//!
//! ```text
//! 0x00  u32 path list address    0x04  u32 volume list address
//! 0x08  u16 path count           0x0A  u16 volume count
//! 0x0C  4 padding bytes
//! ```
//!
//! Each area writes its path list, then its volume list, into the area
//! offsets section.

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
use crate::report::{Report, Warning};
use crate::section::ids;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub header: EntityHeader,
    pub paths: Vec<Reference>,
    pub volumes: Vec<Reference>,
    pub padding: [u8; 4],
}

impl Area {
    pub fn new(header: EntityHeader) -> Self {
        Area {
            header,
            paths: Vec::new(),
            volumes: Vec::new(),
            padding: [0; 4],
        }
    }
}

fn clamp_count(refs: &[Reference], what: &str, owner: &EntityHeader, report: &mut Report) -> usize {
    if refs.len() > u16::MAX as usize {
        report.push(Warning::CountMismatch {
            context: owner.label(),
            detail: format!("{} {} references, truncated to {}", refs.len(), what, u16::MAX),
        });
        u16::MAX as usize
    } else {
        refs.len()
    }
}

impl EntityCodec for Area {
    const CATEGORY: Category = Category::Area;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let path_list = r.u32()?;
        let volume_list = r.u32()?;
        let path_count = r.u16()? as usize;
        let volume_count = r.u16()? as usize;
        let padding = r.array()?;

        let paths = decode_reference_list(path_list, path_count, &header, view, report);
        let volumes = decode_reference_list(volume_list, volume_count, &header, view, report);
        Ok(Area {
            header,
            paths,
            volumes,
            padding,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        let path_count = clamp_count(&self.paths, "path", &self.header, &mut ctx.report);
        let volume_count = clamp_count(&self.volumes, "volume", &self.header, &mut ctx.report);

        let mut patches = Vec::with_capacity(2);
        if let Some(offsets) = out.aux.as_mut() {
            if path_count > 0 {
                let start = encode_reference_list(&self.paths[..path_count], &self.header, offsets, ctx);
                patches.push(Patch::new(0, ids::AREA_OFFSETS, start));
            }
            if volume_count > 0 {
                let start =
                    encode_reference_list(&self.volumes[..volume_count], &self.header, offsets, ctx);
                patches.push(Patch::new(4, ids::AREA_OFFSETS, start));
            }
        }

        let mut w = ByteWriter::with_capacity(16);
        w.put_u32(0)
            .put_u32(0)
            .put_u16(path_count as u16)
            .put_u16(volume_count as u16)
            .put_bytes(&self.padding);
        out.data.push_record(w, patches);
    }

    fn aux_section() -> Option<u32> {
        Some(ids::AREA_OFFSETS)
    }

    fn references(&self) -> Vec<(Reference, Option<u32>)> {
        let path = Some(Category::Path.type_code());
        let volume = Some(Category::Volume.type_code());
        self.paths
            .iter()
            .map(|r| (*r, path))
            .chain(self.volumes.iter().map(|r| (*r, volume)))
            .collect()
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("path_references".into(), references_value(&self.paths));
        map.insert("volume_references".into(), references_value(&self.volumes));
        if self.padding != [0; 4] {
            map.insert("data_padding".into(), hex_value(&self.padding));
        }
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        Area {
            header,
            paths: r.references("path_references"),
            volumes: r.references("volume_references"),
            padding: r.bytes("data_padding", [0; 4]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPayload;

    #[test]
    fn test_path_list_then_volume_list() {
        let mut ctx = EncodeContext::new();
        ctx.registry.insert(0x10, 1);
        ctx.registry.insert(0x20, 2);
        ctx.registry.insert(0x30, 2);

        let mut area = Area::new(EntityHeader::new(0x40, "Arena", 0));
        area.paths = vec![Reference::new(0x10)];
        area.volumes = vec![Reference::new(0x20), Reference::new(0x30)];

        let mut out = CategoryOutput {
            data: SectionPayload::multi(ids::AREA_DATA, 16),
            aux: Area::aux_section().map(SectionPayload::single),
        };
        area.encode(&mut out, &mut ctx);

        assert_eq!(
            out.data.patches,
            vec![
                Patch::new(0, ids::AREA_OFFSETS, 0),
                Patch::new(4, ids::AREA_OFFSETS, 4),
            ]
        );
        let offsets = out.aux.unwrap();
        assert_eq!(offsets.len(), 12);
        let targets: Vec<u32> = offsets.patches.iter().map(|p| p.target_offset).collect();
        assert_eq!(targets, vec![0, 16, 32]);
        assert_eq!(&out.data.data[8..12], &[0, 1, 0, 2]);
    }
}
