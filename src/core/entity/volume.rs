//! Trigger volumes: one row-major 4x4 transform per volume

use super::{CategoryOutput, EntityCodec, EntityHeader};
use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::record::{float_value, FieldReader, IDENTITY};
use crate::report::Report;
use serde_json::{Map, Value};

pub const DATA_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub header: EntityHeader,
    pub transform: [[f32; 4]; 4],
}

impl Volume {
    pub fn new(header: EntityHeader) -> Self {
        Volume {
            header,
            transform: IDENTITY,
        }
    }
}

impl EntityCodec for Volume {
    const CATEGORY: Category = Category::Volume;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], _view: &DecodeView<'_>, _report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let mut transform = [[0.0; 4]; 4];
        for row in transform.iter_mut() {
            for cell in row.iter_mut() {
                *cell = r.f32()?;
            }
        }
        Ok(Volume { header, transform })
    }

    fn encode(&self, out: &mut CategoryOutput, _ctx: &mut EncodeContext) {
        let mut w = ByteWriter::with_capacity(DATA_SIZE);
        for value in self.transform.iter().flatten() {
            w.put_f32(*value);
        }
        out.data.push_record(w, []);
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        let rows = self
            .transform
            .iter()
            .map(|row| Value::Array(row.iter().map(|v| float_value(*v)).collect()))
            .collect();
        map.insert("transform_matrix".into(), Value::Array(rows));
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        Volume {
            header,
            transform: r.matrix("transform_matrix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPayload;

    #[test]
    fn test_row_major_layout() {
        let mut volume = Volume::new(EntityHeader::new(3, "Trigger", 0));
        volume.transform[3] = [10.0, 20.0, 30.0, 1.0];
        let mut out = CategoryOutput {
            data: SectionPayload::multi(Category::Volume.data_section(), DATA_SIZE as u32),
            aux: None,
        };
        volume.encode(&mut out, &mut EncodeContext::new());
        assert_eq!(out.data.len(), DATA_SIZE);
        assert_eq!(&out.data.data[48..52], &10.0f32.to_be_bytes());
        assert_eq!(&out.data.data[0..4], &1.0f32.to_be_bytes());
    }
}
