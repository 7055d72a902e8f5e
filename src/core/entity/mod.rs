//! Entity codecs
//!
//! Every placed object has a 16-byte metadata record and a fixed-size data
//! record in its category's sections:
//!
//! ```text
//! metadata: u64 tuid | u32 name address | u16 zone | u16 padding
//! ```
//!
//! Four categories also own variable-length reference lists (clue, area,
//! pool, scent) whose slots point at instance type registry rows.

pub mod area;
pub mod clue;
pub mod controller;
pub mod path;
pub mod pool;
pub mod prop;
pub mod scent;
pub mod volume;

pub use area::Area;
pub use clue::Clue;
pub use controller::Controller;
pub use path::{Path, PathPoint};
pub use pool::Pool;
pub use prop::Prop;
pub use scent::Scent;
pub use volume::Volume;

use crate::cursor::{ByteReader, ByteWriter};
use crate::decode::DecodeView;
use crate::encode::EncodeContext;
use crate::error::Result;
use crate::patch::{Patch, SectionPayload};
use crate::record::{hex_value, tuid_value, FieldReader};
use crate::report::{Report, Warning};
use crate::section::ids;
use crate::subfile::Subfile;
use serde_json::{json, Map, Value};
use std::fmt;

pub const METADATA_SIZE: usize = 16;

/// The eight entity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Prop,
    Path,
    Volume,
    Clue,
    Controller,
    Area,
    Pool,
    Scent,
}

impl Category {
    /// Zone slot order
    pub const ALL: [Category; 8] = [
        Category::Prop,
        Category::Path,
        Category::Volume,
        Category::Clue,
        Category::Controller,
        Category::Area,
        Category::Pool,
        Category::Scent,
    ];

    /// Code stored in instance type registry rows
    pub fn type_code(self) -> u32 {
        match self {
            Category::Prop => 0,
            Category::Path => 1,
            Category::Volume => 2,
            Category::Clue => 3,
            Category::Controller => 4,
            Category::Scent => 5,
            Category::Area => 6,
            Category::Pool => 7,
        }
    }

    pub fn from_type_code(code: u32) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.type_code() == code)
    }

    /// Index of this category's (offset, count) pair in a zone record
    pub fn zone_slot(self) -> usize {
        match self {
            Category::Prop => 0,
            Category::Path => 1,
            Category::Volume => 2,
            Category::Clue => 3,
            Category::Controller => 4,
            Category::Area => 5,
            Category::Pool => 6,
            Category::Scent => 7,
        }
    }

    pub fn data_section(self) -> u32 {
        match self {
            Category::Prop => ids::PROP_DATA,
            Category::Path => ids::PATH_DATA,
            Category::Volume => ids::VOLUME_TRANSFORM,
            Category::Clue => ids::CLUE_INFO,
            Category::Controller => ids::CONTROLLER_DATA,
            Category::Area => ids::AREA_DATA,
            Category::Pool => ids::POOL_DATA,
            Category::Scent => ids::SCENT_DATA,
        }
    }

    pub fn metadata_section(self) -> u32 {
        match self {
            Category::Prop => ids::PROP_METADATA,
            Category::Path => ids::PATH_METADATA,
            Category::Volume => ids::VOLUME_METADATA,
            Category::Clue => ids::CLUE_METADATA,
            Category::Controller => ids::CONTROLLER_METADATA,
            Category::Area => ids::AREA_METADATA,
            Category::Pool => ids::POOL_METADATA,
            Category::Scent => ids::SCENT_METADATA,
        }
    }

    pub fn data_size(self) -> usize {
        match self {
            Category::Prop => prop::DATA_SIZE,
            Category::Controller => controller::DATA_SIZE,
            Category::Volume => volume::DATA_SIZE,
            _ => 16,
        }
    }

    /// Record file suffix, `<stem>.<suffix>.json`
    pub fn suffix(self) -> &'static str {
        match self {
            Category::Prop => "prop",
            Category::Path => "path",
            Category::Volume => "volume",
            Category::Clue => "clue",
            Category::Controller => "controller",
            Category::Area => "area",
            Category::Pool => "pool",
            Category::Scent => "scent",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "moby" => Some(Category::Prop),
            "pod" => Some(Category::Pool),
            other => Category::ALL.into_iter().find(|c| c.suffix() == other),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Edge to another instance, resolved through the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub tuid: u64,
    /// Explicit registry type code
    pub type_code: Option<u32>,
}

impl Reference {
    pub fn new(tuid: u64) -> Self {
        Reference {
            tuid,
            type_code: None,
        }
    }

    pub fn typed(tuid: u64, type_code: u32) -> Self {
        Reference {
            tuid,
            type_code: Some(type_code),
        }
    }
}

/// Fields shared by every category's metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHeader {
    pub tuid: u64,
    pub name: String,
    pub zone: u16,
    pub padding: u16,
}

impl EntityHeader {
    pub fn new(tuid: u64, name: impl Into<String>, zone: u16) -> Self {
        EntityHeader {
            tuid,
            name: name.into(),
            zone,
            padding: 0,
        }
    }

    fn decode(r: &mut ByteReader<'_>, view: &DecodeView<'_>, report: &mut Report) -> Result<Self> {
        let tuid = r.u64()?;
        let name_address = r.u32()?;
        let zone = r.u16()?;
        let padding = r.u16()?;
        let name = view.name_at(name_address, tuid, report);
        Ok(EntityHeader {
            tuid,
            name,
            zone,
            padding,
        })
    }

    fn encode(&self) -> ByteWriter {
        let mut w = ByteWriter::with_capacity(METADATA_SIZE);
        w.put_u64(self.tuid)
            .put_u32(0)
            .put_u16(self.zone)
            .put_u16(self.padding);
        w
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("name".into(), json!(self.name));
        map.insert("tuid".into(), tuid_value(self.tuid));
        map.insert("zone".into(), json!(self.zone));
        if self.padding != 0 {
            map.insert("metadata_padding".into(), hex_value(&self.padding.to_be_bytes()));
        }
    }

    fn read_fields(r: &mut FieldReader<'_>, default_name: &str) -> Self {
        EntityHeader {
            tuid: r.tuid("tuid"),
            name: r.string("name", default_name),
            zone: r.u16("zone", 0),
            padding: u16::from_be_bytes(r.bytes("metadata_padding", [0; 2])),
        }
    }

    /// Label used in warnings
    pub fn label(&self) -> String {
        format!("{} ({:#x})", self.name, self.tuid)
    }
}

/// Payloads produced while encoding one category
#[derive(Debug)]
pub struct CategoryOutput {
    pub data: SectionPayload,
    /// Points or reference list section
    pub aux: Option<SectionPayload>,
}

/// Binary and record form of one category
pub trait EntityCodec: Sized {
    const CATEGORY: Category;

    fn header(&self) -> &EntityHeader;

    fn header_mut(&mut self) -> &mut EntityHeader;

    /// Decode one data record
    fn decode(
        header: EntityHeader,
        data: &[u8],
        view: &DecodeView<'_>,
        report: &mut Report,
    ) -> Result<Self>;

    /// Append one data record, plus any auxiliary bytes, to `out`
    fn encode(&self, out: &mut CategoryOutput, ctx: &mut EncodeContext);

    /// Auxiliary section this category writes into
    fn aux_section() -> Option<u32> {
        None
    }

    /// Outgoing references with the type code implied by their slot
    fn references(&self) -> Vec<(Reference, Option<u32>)> {
        Vec::new()
    }

    fn write_fields(&self, map: &mut Map<String, Value>);

    fn read_fields(header: EntityHeader, r: &mut FieldReader<'_>) -> Self;
}

/// Decode every record of one category.
///
/// A category with only one of its two sections present is skipped and reported.
pub fn decode_category<T: EntityCodec>(view: &DecodeView<'_>, report: &mut Report) -> Vec<T> {
    let category = T::CATEGORY;
    let data = view.container.section_bytes(category.data_section());
    let meta = view.container.section_bytes(category.metadata_section());
    let (data, meta) = match (data, meta) {
        (Some(data), Some(meta)) => (data, meta),
        (None, None) => return Vec::new(),
        (data, _) => {
            let missing = if data.is_none() {
                category.data_section()
            } else {
                category.metadata_section()
            };
            report.push(Warning::MissingSection {
                category: category.suffix(),
                section_id: missing,
            });
            return Vec::new();
        }
    };

    let size = category.data_size();
    let data_count = data.len() / size;
    let meta_count = meta.len() / METADATA_SIZE;
    if data_count != meta_count {
        report.push(Warning::CountMismatch {
            context: format!("{} sections", category),
            detail: format!(
                "{} data records but {} metadata records, decoding {}",
                data_count,
                meta_count,
                data_count.min(meta_count)
            ),
        });
    }

    let mut out = Vec::with_capacity(data_count.min(meta_count));
    for i in 0..data_count.min(meta_count) {
        let mut r = ByteReader::at(meta, i * METADATA_SIZE);
        let decoded = EntityHeader::decode(&mut r, view, report)
            .and_then(|header| T::decode(header, &data[i * size..(i + 1) * size], view, report));
        match decoded {
            Ok(entity) => out.push(entity),
            Err(e) => report.push(Warning::SkippedRecord {
                path: format!("{} #{}", category, i),
                reason: e.to_string(),
            }),
        }
    }
    out
}

/// Encode one category's data, metadata and auxiliary payloads
pub fn encode_category<T: EntityCodec>(
    items: &[&T],
    name_offsets: &[u32],
    ctx: &mut EncodeContext,
) -> Vec<SectionPayload> {
    let category = T::CATEGORY;
    let mut out = CategoryOutput {
        data: SectionPayload::multi(category.data_section(), category.data_size() as u32),
        aux: T::aux_section().map(SectionPayload::single),
    };
    let mut meta = SectionPayload::multi(category.metadata_section(), METADATA_SIZE as u32);

    for (item, name_offset) in items.iter().zip(name_offsets) {
        meta.push_record(item.header().encode(), [Patch::new(8, ids::NAMES, *name_offset)]);
        item.encode(&mut out, ctx);
    }

    let mut payloads = vec![out.data, meta];
    payloads.extend(out.aux);
    payloads
}

/// Closed union of all categories
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Prop(Prop),
    Path(Path),
    Volume(Volume),
    Clue(Clue),
    Controller(Controller),
    Area(Area),
    Pool(Pool),
    Scent(Scent),
}

macro_rules! each_entity {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Entity::Prop($inner) => $body,
            Entity::Path($inner) => $body,
            Entity::Volume($inner) => $body,
            Entity::Clue($inner) => $body,
            Entity::Controller($inner) => $body,
            Entity::Area($inner) => $body,
            Entity::Pool($inner) => $body,
            Entity::Scent($inner) => $body,
        }
    };
}

impl Entity {
    pub fn category(&self) -> Category {
        match self {
            Entity::Prop(_) => Category::Prop,
            Entity::Path(_) => Category::Path,
            Entity::Volume(_) => Category::Volume,
            Entity::Clue(_) => Category::Clue,
            Entity::Controller(_) => Category::Controller,
            Entity::Area(_) => Category::Area,
            Entity::Pool(_) => Category::Pool,
            Entity::Scent(_) => Category::Scent,
        }
    }

    pub fn header(&self) -> &EntityHeader {
        each_entity!(self, e => e.header())
    }

    pub fn header_mut(&mut self) -> &mut EntityHeader {
        each_entity!(self, e => e.header_mut())
    }

    pub fn tuid(&self) -> u64 {
        self.header().tuid
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn zone(&self) -> u16 {
        self.header().zone
    }

    pub fn references(&self) -> Vec<(Reference, Option<u32>)> {
        each_entity!(self, e => e.references())
    }

    pub fn subfile(&self) -> Option<&Subfile> {
        match self {
            Entity::Prop(p) => p.subfile.as_ref(),
            Entity::Controller(c) => c.subfile.as_ref(),
            Entity::Clue(c) => c.subfile.as_ref(),
            _ => None,
        }
    }

    pub fn set_subfile(&mut self, subfile: Option<Subfile>) {
        match self {
            Entity::Prop(p) => p.subfile = subfile,
            Entity::Controller(c) => c.subfile = subfile,
            Entity::Clue(c) => c.subfile = subfile,
            _ => {}
        }
    }

    /// Interchange record, without the sub-blob
    pub fn to_record(&self) -> Value {
        let mut map = Map::new();
        self.header().write_fields(&mut map);
        each_entity!(self, e => e.write_fields(&mut map));
        Value::Object(map)
    }

    /// Build an entity from a record of a known category
    pub fn from_record(category: Category, fields: &Map<String, Value>, source: &str, report: &mut Report) -> Entity {
        let mut r = FieldReader::new(fields, source, report);
        let default_name = format!("{}_unnamed", category);
        let header = EntityHeader::read_fields(&mut r, &default_name);
        match category {
            Category::Prop => Entity::Prop(Prop::read_fields(header, &mut r)),
            Category::Path => Entity::Path(Path::read_fields(header, &mut r)),
            Category::Volume => Entity::Volume(Volume::read_fields(header, &mut r)),
            Category::Clue => Entity::Clue(Clue::read_fields(header, &mut r)),
            Category::Controller => Entity::Controller(Controller::read_fields(header, &mut r)),
            Category::Area => Entity::Area(Area::read_fields(header, &mut r)),
            Category::Pool => Entity::Pool(Pool::read_fields(header, &mut r)),
            Category::Scent => Entity::Scent(Scent::read_fields(header, &mut r)),
        }
    }
}

/// Resolve a list of registry addresses read from an offsets section
pub(crate) fn decode_reference_list(
    list_address: u32,
    count: usize,
    owner: &EntityHeader,
    view: &DecodeView<'_>,
    report: &mut Report,
) -> Vec<Reference> {
    if count == 0 {
        return Vec::new();
    }
    if list_address == 0 {
        report.push(Warning::BadAddress {
            entity: owner.label(),
            address: 0,
            detail: format!("null list for {} references", count),
        });
        return Vec::new();
    }
    let mut r = ByteReader::at(view.container.data(), list_address as usize);
    let mut refs = Vec::with_capacity(count);
    for i in 0..count {
        let Ok(address) = r.u32() else {
            report.push(Warning::BadAddress {
                entity: owner.label(),
                address: list_address,
                detail: format!("list truncated after {} of {} references", i, count),
            });
            break;
        };
        if let Some(reference) = view.reference_at(address, owner, report) {
            refs.push(reference);
        }
    }
    refs
}

/// Append a reference list to an offsets payload, returning its start offset
pub(crate) fn encode_reference_list(
    refs: &[Reference],
    owner: &EntityHeader,
    offsets: &mut SectionPayload,
    ctx: &mut EncodeContext,
) -> u32 {
    let start = offsets.len() as u32;
    for reference in refs {
        match ctx.resolve(owner, reference) {
            Some(entry) => offsets.push_pointer(ids::INSTANCE_TYPES, entry),
            None => offsets.data.extend_from_slice(&[0; 4]),
        }
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_tables() {
        assert_eq!(Category::Scent.type_code(), 5);
        assert_eq!(Category::Scent.zone_slot(), 7);
        assert_eq!(Category::Area.type_code(), 6);
        assert_eq!(Category::Area.zone_slot(), 5);
        assert_eq!(Category::from_type_code(7), Some(Category::Pool));
        assert_eq!(Category::from_type_code(8), None);
        assert_eq!(Category::Volume.data_section(), ids::VOLUME_TRANSFORM);
        assert_eq!(Category::Prop.data_size(), 80);
    }

    #[test]
    fn test_suffixes() {
        for category in Category::ALL {
            assert_eq!(Category::from_suffix(category.suffix()), Some(category));
        }
        assert_eq!(Category::from_suffix("moby"), Some(Category::Prop));
        assert_eq!(Category::from_suffix("pod"), Some(Category::Pool));
        assert_eq!(Category::from_suffix("json"), None);
    }

    #[test]
    fn test_header_record_fields() {
        let mut header = EntityHeader::new(0xABC, "Crate", 3);
        header.padding = 0x0102;
        let mut map = Map::new();
        header.write_fields(&mut map);
        assert_eq!(map["tuid"], json!("0x0000000000000ABC"));
        assert_eq!(map["metadata_padding"], json!("0102"));

        let mut report = Report::new();
        let mut r = FieldReader::new(&map, "crate.prop.json", &mut report);
        assert_eq!(EntityHeader::read_fields(&mut r, "x"), header);
        assert!(report.is_clean());
    }
}
