//! Props (movable world objects)
//!
//! ```text
//! 0x00  u16 model index        0x02  u16 zone render index
//! 0x04  f32 update distance    0x08  f32 display distance
//! 0x0C  u32 sub-blob address   0x10  u32 sub-blob length
//! 0x14  f32 x3 position        0x20  f32 x3 rotation
//! 0x2C  f32 scale              0x30  8 flag bytes
//! 0x38  4 unknown bytes        0x3C  4 padding bytes
//! 0x40  16 reserved bytes
//! ```

use super::{CategoryOutput, EntityCodec, EntityHeader};
use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::patch::Patch;
use crate::record::{float_value, hex_value, vec3_value, FieldReader};
use crate::report::Report;
use crate::subfile::Subfile;
use serde_json::{json, Map, Value};

pub const DATA_SIZE: usize = 80;
pub const DEFAULT_PADDING: [u8; 4] = [0xFF; 4];

#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub header: EntityHeader,
    pub model_index: u16,
    pub zone_render_index: u16,
    pub update_dist: f32,
    pub display_dist: f32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
    pub flags: [u8; 8],
    pub unknown: [u8; 4],
    pub padding: [u8; 4],
    pub reserved: [u8; 16],
    pub subfile: Option<Subfile>,
    /// Read from the sub-blob's class enum section; informational only
    pub class_enum: Option<u32>,
}

impl Prop {
    pub fn new(header: EntityHeader) -> Self {
        let zone = header.zone;
        Prop {
            header,
            model_index: 0,
            zone_render_index: zone,
            update_dist: -1.0,
            display_dist: -1.0,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: 1.0,
            flags: [0; 8],
            unknown: [0; 4],
            padding: DEFAULT_PADDING,
            reserved: [0; 16],
            subfile: None,
            class_enum: None,
        }
    }
}

impl EntityCodec for Prop {
    const CATEGORY: Category = Category::Prop;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let model_index = r.u16()?;
        let zone_render_index = r.u16()?;
        let update_dist = r.f32()?;
        let display_dist = r.f32()?;
        let subfile_address = r.u32()?;
        let subfile_length = r.u32()?;
        let position = r.vec3()?;
        let rotation = r.vec3()?;
        let scale = r.f32()?;
        let flags = r.array()?;
        let unknown = r.array()?;
        let padding = r.array()?;
        let reserved = r.array()?;

        let subfile = view.subfile(subfile_address, subfile_length, &header, report);
        let class_enum = subfile.as_ref().and_then(|s| view.class_enum(&s.bytes));

        Ok(Prop {
            header,
            model_index,
            zone_render_index,
            update_dist,
            display_dist,
            position,
            rotation,
            scale,
            flags,
            unknown,
            padding,
            reserved,
            subfile,
            class_enum,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        let slot = self.subfile.as_ref().and_then(|s| ctx.register_subfile(s));
        let mut w = ByteWriter::with_capacity(DATA_SIZE);
        w.put_u16(self.model_index)
            .put_u16(self.zone_render_index)
            .put_f32(self.update_dist)
            .put_f32(self.display_dist)
            .put_u32(0)
            .put_u32(slot.map_or(0, |s| s.length))
            .put_vec3(self.position)
            .put_vec3(self.rotation)
            .put_f32(self.scale)
            .put_bytes(&self.flags)
            .put_bytes(&self.unknown)
            .put_bytes(&self.padding)
            .put_bytes(&self.reserved);
        let patches = slot.map(|s| Patch::new(12, s.pool.section_id(), s.offset));
        out.data.push_record(w, patches);
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("model_index".into(), json!(self.model_index));
        map.insert("zone_render_index".into(), json!(self.zone_render_index));
        map.insert("update_dist".into(), float_value(self.update_dist));
        map.insert("display_dist".into(), float_value(self.display_dist));
        map.insert("position".into(), vec3_value(self.position));
        map.insert("rotation".into(), vec3_value(self.rotation));
        map.insert("scale".into(), float_value(self.scale));
        map.insert("flags".into(), hex_value(&self.flags));
        map.insert("unknown".into(), hex_value(&self.unknown));
        map.insert("padding".into(), hex_value(&self.padding));
        if self.reserved != [0; 16] {
            map.insert("reserved".into(), hex_value(&self.reserved));
        }
        if let Some(class_enum) = self.class_enum {
            map.insert("class_enum".into(), json!(class_enum));
        }
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        let zone = header.zone;
        Prop {
            header,
            model_index: r.u16("model_index", 0),
            zone_render_index: r.u16("zone_render_index", zone),
            update_dist: r.f32("update_dist", -1.0),
            display_dist: r.f32("display_dist", -1.0),
            position: r.vec3("position", [0.0; 3]),
            rotation: r.vec3("rotation", [0.0; 3]),
            scale: r.f32("scale", 1.0),
            flags: r.bytes("flags", [0; 8]),
            unknown: r.bytes("unknown", [0; 4]),
            padding: r.bytes("padding", DEFAULT_PADDING),
            reserved: r.bytes("reserved", [0; 16]),
            subfile: None,
            class_enum: r.optional_u32("class_enum"),
        }
    }
}
