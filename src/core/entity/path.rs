//! Waypoint paths
//!
//! ```text
//! data   (16): u32 points address | u32 opaque | f32 duration | u16 flags | u16 point count
//! points (16): f32 x | f32 y | f32 z | f32 timestamp
//! ```
//!
//! Points of every path are concatenated into one single-block section.

use super::{CategoryOutput, EntityCodec, EntityHeader};
use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::entity::Category;
use crate::error::Result;
use crate::patch::Patch;
use crate::record::{float_value, parse_float, vec3_value, FieldReader};
use crate::report::{Report, Warning};
use crate::section::ids;
use serde_json::{json, Map, Value};

pub const POINT_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub position: [f32; 3],
    pub timestamp: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub header: EntityHeader,
    pub unknown: u32,
    pub total_duration: f32,
    pub flags: u16,
    pub points: Vec<PathPoint>,
}

impl Path {
    pub fn new(header: EntityHeader) -> Self {
        Path {
            header,
            unknown: 0,
            total_duration: 0.0,
            flags: 0,
            points: Vec::new(),
        }
    }
}

impl EntityCodec for Path {
    const CATEGORY: Category = Category::Path;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn decode(header: EntityHeader, data: &[u8], view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let points_address = r.u32()?;
        let unknown = r.u32()?;
        let total_duration = r.f32()?;
        let flags = r.u16()?;
        let point_count = r.u16()? as usize;

        let mut points = Vec::with_capacity(point_count);
        if point_count > 0 {
            let mut p = ByteReader::at(view.container.data(), points_address as usize);
            for _ in 0..point_count {
                let point = p.vec3().and_then(|position| {
                    p.f32().map(|timestamp| PathPoint {
                        position,
                        timestamp,
                    })
                });
                match point {
                    Ok(point) => points.push(point),
                    Err(_) => {
                        report.push(Warning::BadAddress {
                            entity: header.label(),
                            address: points_address,
                            detail: format!("only {} of {} points readable", points.len(), point_count),
                        });
                        break;
                    }
                }
            }
        }

        Ok(Path {
            header,
            unknown,
            total_duration,
            flags,
            points,
        })
    }

    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext) {
        let count = u16::try_from(self.points.len()).unwrap_or_else(|_| {
            ctx.report.push(Warning::CountMismatch {
                context: self.header.label(),
                detail: format!("{} points, truncated to {}", self.points.len(), u16::MAX),
            });
            u16::MAX
        });
        let mut patches = Vec::new();
        if let Some(aux) = out.aux.as_mut().filter(|_| count > 0) {
            patches.push(Patch::new(0, ids::PATH_POINTS, aux.len() as u32));
            let mut w = ByteWriter::with_capacity(count as usize * POINT_SIZE);
            for point in &self.points[..count as usize] {
                w.put_vec3(point.position).put_f32(point.timestamp);
            }
            aux.data.extend_from_slice(w.as_slice());
        }

        let mut w = ByteWriter::with_capacity(16);
        w.put_u32(0)
            .put_u32(self.unknown)
            .put_f32(self.total_duration)
            .put_u16(self.flags)
            .put_u16(count);
        out.data.push_record(w, patches);
    }

    fn aux_section() -> Option<u32> {
        Some(ids::PATH_POINTS)
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("unknown".into(), json!(self.unknown));
        map.insert("total_duration".into(), float_value(self.total_duration));
        map.insert("flags".into(), json!(self.flags));
        map.insert("point_count".into(), json!(self.points.len()));
        let points = self
            .points
            .iter()
            .map(|p| json!({ "position": vec3_value(p.position), "timestamp": float_value(p.timestamp) }))
            .collect();
        map.insert("points".into(), Value::Array(points));
    }

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self {
        let unknown = r.u32("unknown", 0);
        let total_duration = r.f32("total_duration", 0.0);
        let flags = r.u16("flags", 0);
        let mut points = Vec::new();
        let mut bad = 0;
        for item in r.array("points") {
            let position = item.get("position").and_then(|pos| {
                ["x", "y", "z"]
                    .iter()
                    .map(|axis| pos.get(*axis).map_or(Some(0.0), parse_float))
                    .collect::<Option<Vec<f32>>>()
            });
            let timestamp = item.get("timestamp").map_or(Some(0.0), parse_float);
            match (position, timestamp) {
                (Some(p), Some(timestamp)) => points.push(PathPoint {
                    position: [p[0], p[1], p[2]],
                    timestamp,
                }),
                _ => {
                    bad += 1;
                    points.push(PathPoint {
                        position: [0.0; 3],
                        timestamp: 0.0,
                    });
                }
            }
        }
        let path = Path {
            header,
            unknown,
            total_duration,
            flags,
            points,
        };
        if bad > 0 {
            r.report_malformed("points", format!("origin for {} malformed point(s)", bad));
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPayload;

    fn output() -> CategoryOutput {
        CategoryOutput {
            data: SectionPayload::multi(ids::PATH_DATA, 16),
            aux: Path::aux_section().map(SectionPayload::single),
        }
    }

    #[test]
    fn test_points_pointer_only_when_present() {
        let mut ctx = EncodeContext::new();
        let mut out = output();

        let empty = Path::new(EntityHeader::new(1, "Empty", 0));
        let mut walk = Path::new(EntityHeader::new(2, "Walk", 0));
        walk.points = vec![
            PathPoint { position: [1.0, 2.0, 3.0], timestamp: 0.0 },
            PathPoint { position: [4.0, 5.0, 6.0], timestamp: 1.5 },
        ];
        empty.encode(&mut out, &mut ctx);
        walk.encode(&mut out, &mut ctx);

        assert_eq!(out.data.patches, vec![Patch::new(16, ids::PATH_POINTS, 0)]);
        assert_eq!(&out.data.data[30..32], &2u16.to_be_bytes());
        let aux = out.aux.unwrap();
        assert_eq!(aux.len(), 32);
        assert_eq!(&aux.data[28..32], &1.5f32.to_be_bytes());
    }

    #[test]
    fn test_malformed_point_is_reported() {
        let value = json!({ "points": [
            { "position": { "x": 1, "y": 2, "z": 3 }, "timestamp": 0.5 },
            { "position": { "x": "?" } },
        ]});
        let mut report = Report::new();
        let mut r = FieldReader::new(value.as_object().unwrap(), "p.path.json", &mut report);
        let path = Path::read_fields(EntityHeader::new(1, "p", 0), &mut r);
        assert_eq!(path.points.len(), 2);
        assert_eq!(path.points[0].timestamp, 0.5);
        assert_eq!(report.len(), 1);
    }
}
