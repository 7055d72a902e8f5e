//! Controllers (mechanical objects with their own sub-blob)
//!
//! ```text
//! 0x00  u32 sub-blob address   0x04  u32 sub-blob length
//! 0x08  f32 x3 position        0x14  f32 x3 rotation
//! 0x20  f32 scale  0x24  f32 scale y  0x28  f32 scale z
//! 0x2C  4 padding bytes
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
use serde_json::{Map, Value};

pub const DATA_SIZE: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    pub header: EntityHeader,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
    pub scale_y: f32,
    pub scale_z: f32,
    pub padding: [u8; 4],
    pub subfile: Option<Subfile>,
}

impl Controller {
    pub fn new(header: EntityHeader) -> Self {
        Controller {
            header,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: 1.0,
            scale_y: 1.0,
            scale_z: 1.0,
            padding: [0; 4],
            subfile: None,
        }
    }
}

impl EntityCodec for Controller {
    const CATEGORY: Category = Category::Controller;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let subfile_address = r.u32()?;
        let subfile_length = r.u32()?;
        let subfile = view.subfile(subfile_address, subfile_length, &header, report);
        Ok(Controller {
            position: r.vec3()?,
            rotation: r.vec3()?,
            scale: r.f32()?,
            scale_y: r.f32()?,
            scale_z: r.f32()?,
            padding: r.array()?,
            subfile,
            header,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        let slot = self.subfile.as_ref().and_then(|s| ctx.register_subfile(s));
        let mut w = ByteWriter::with_capacity(DATA_SIZE);
        w.put_u32(0)
            .put_u32(slot.map_or(0, |s| s.length))
            .put_vec3(self.position)
            .put_vec3(self.rotation)
            .put_f32(self.scale)
            .put_f32(self.scale_y)
            .put_f32(self.scale_z)
            .put_bytes(&self.padding);
        out.data
            .push_record(w, slot.map(|s| Patch::new(0, s.pool.section_id(), s.offset)));
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("position".into(), vec3_value(self.position));
        map.insert("rotation".into(), vec3_value(self.rotation));
        map.insert("scale".into(), float_value(self.scale));
        map.insert("scale_y".into(), float_value(self.scale_y));
        map.insert("scale_z".into(), float_value(self.scale_z));
        map.insert("data_padding".into(), hex_value(&self.padding));
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        Controller {
            header,
            position: r.vec3("position", [0.0; 3]),
            rotation: r.vec3("rotation", [0.0; 3]),
            scale: r.f32("scale", 1.0),
            scale_y: r.f32("scale_y", 1.0),
            scale_z: r.f32("scale_z", 1.0),
            padding: r.bytes("data_padding", [0; 4]),
            subfile: None,
        }
    }
}
