//! Interchange record fields
//!
//! Records are flat JSON objects edited by hand. Reading is lenient: a
//! field that is present but unparsable falls back to its documented
//! default and the fallback is reported. Absent fields take the default
//! silently, except the TUID which every record must carry.

use crate::entity::Reference;
use crate::report::{Report, Warning};
use serde_json::{json, Map, Value};
use std::fmt::Display;

pub const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// TUID fallback when a record has none
pub const NO_TUID: u64 = u64::MAX;

/// Parse an integer given as a JSON number, `0x` hex string, decimal string or bare hex string
pub fn parse_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).ok()
            } else {
                s.parse::<u64>()
                    .ok()
                    .or_else(|| u64::from_str_radix(s, 16).ok())
            }
        }
        _ => None,
    }
}

/// Parse a float given as a number, a numeric string or a `0x` bit pattern
pub fn parse_float(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(bits) => u32::from_str_radix(bits, 16).ok().map(f32::from_bits),
                None => s.parse::<f32>().ok(),
            }
        }
        _ => None,
    }
}

pub fn tuid_value(tuid: u64) -> Value {
    Value::String(format!("0x{:016X}", tuid))
}

/// Finite floats as numbers, anything else as its exact bit pattern
pub fn float_value(value: f32) -> Value {
    if value.is_finite() {
        json!(value as f64)
    } else {
        Value::String(format!("0x{:08X}", value.to_bits()))
    }
}

pub fn vec3_value(v: [f32; 3]) -> Value {
    json!({ "x": float_value(v[0]), "y": float_value(v[1]), "z": float_value(v[2]) })
}

pub fn hex_value(bytes: &[u8]) -> Value {
    Value::String(hex::encode_upper(bytes))
}

pub fn references_value(refs: &[Reference]) -> Value {
    Value::Array(
        refs.iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert("tuid".into(), tuid_value(r.tuid));
                if let Some(code) = r.type_code {
                    obj.insert("type".into(), json!(code));
                }
                Value::Object(obj)
            })
            .collect(),
    )
}

/// Serde adapter writing TUIDs as hex strings and reading any accepted form
pub mod tuid_serde {
    use super::parse_int;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tuid: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:016X}", tuid))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        parse_int(&value).ok_or_else(|| D::Error::custom(format!("invalid tuid: {}", value)))
    }
}

/// Lenient typed access to one record's fields
pub struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    record: &'a str,
    report: &'a mut Report,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a Map<String, Value>, record: &'a str, report: &'a mut Report) -> Self {
        FieldReader {
            fields,
            record,
            report,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Report a fallback decided by the caller
    pub fn report_malformed(&mut self, field: &str, fallback: impl Display) {
        self.malformed(field, fallback);
    }

    fn malformed(&mut self, field: &str, fallback: impl Display) {
        self.report.push(Warning::MalformedField {
            record: self.record.to_string(),
            field: field.to_string(),
            fallback: fallback.to_string(),
        });
    }

    pub fn string(&mut self, key: &str, default: &str) -> String {
        match self.get(key) {
            None => default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                self.malformed(key, format!("\"{}\"", default));
                default.to_string()
            }
        }
    }

    pub fn tuid(&mut self, key: &str) -> u64 {
        match self.get(key).map(parse_int) {
            Some(Some(tuid)) => tuid,
            _ => {
                self.malformed(key, format!("{:#x}", NO_TUID));
                NO_TUID
            }
        }
    }

    pub fn u64_or(&mut self, key: &str, default: u64) -> u64 {
        match self.get(key).map(parse_int) {
            None => default,
            Some(Some(v)) => v,
            Some(None) => {
                self.malformed(key, default);
                default
            }
        }
    }

    pub fn u32(&mut self, key: &str, default: u32) -> u32 {
        let raw = self.u64_or(key, default as u64);
        u32::try_from(raw).unwrap_or_else(|_| {
            self.malformed(key, default);
            default
        })
    }

    pub fn u16(&mut self, key: &str, default: u16) -> u16 {
        let raw = self.u64_or(key, default as u64);
        u16::try_from(raw).unwrap_or_else(|_| {
            self.malformed(key, default);
            default
        })
    }

    /// Optional integer that is only meaningful when present
    pub fn optional_u32(&mut self, key: &str) -> Option<u32> {
        self.get(key)?;
        Some(self.u32(key, 0))
    }

    pub fn f32(&mut self, key: &str, default: f32) -> f32 {
        match self.get(key).map(parse_float) {
            None => default,
            Some(Some(v)) => v,
            Some(None) => {
                self.malformed(key, default);
                default
            }
        }
    }

    /// `{x, y, z}` object or a three element array
    pub fn vec3(&mut self, key: &str, default: [f32; 3]) -> [f32; 3] {
        let parsed = match self.get(key) {
            None => return default,
            Some(Value::Object(obj)) => ["x", "y", "z"]
                .iter()
                .zip(default)
                .map(|(axis, fallback)| obj.get(*axis).map_or(Some(fallback), parse_float))
                .collect::<Option<Vec<f32>>>(),
            Some(Value::Array(items)) if items.len() == 3 => {
                items.iter().map(parse_float).collect::<Option<Vec<f32>>>()
            }
            Some(_) => None,
        };
        match parsed {
            Some(v) => [v[0], v[1], v[2]],
            None => {
                self.malformed(key, format!("{:?}", default));
                default
            }
        }
    }

    /// Fixed-width hex byte string
    pub fn bytes<const N: usize>(&mut self, key: &str, default: [u8; N]) -> [u8; N] {
        let parsed = match self.get(key) {
            None => return default,
            Some(Value::String(s)) => hex::decode(s.trim())
                .ok()
                .and_then(|bytes| <[u8; N]>::try_from(bytes).ok()),
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            self.malformed(key, hex::encode_upper(default));
            default
        })
    }

    /// Row-major 4x4 matrix, as nested rows or 16 flat values
    pub fn matrix(&mut self, key: &str) -> [[f32; 4]; 4] {
        let Some(value) = self.get(key) else {
            return IDENTITY;
        };
        let flat: Option<Vec<f32>> = match value {
            Value::Array(rows) if rows.len() == 4 && rows.iter().all(Value::is_array) => rows
                .iter()
                .filter_map(Value::as_array)
                .flat_map(|row| {
                    let ok = row.len() == 4;
                    row.iter().map(move |v| if ok { parse_float(v) } else { None })
                })
                .collect(),
            Value::Array(items) if items.len() == 16 => items.iter().map(parse_float).collect(),
            _ => None,
        };
        match flat {
            Some(values) if values.len() == 16 => {
                let mut m = IDENTITY;
                for (i, v) in values.into_iter().enumerate() {
                    m[i / 4][i % 4] = v;
                }
                m
            }
            _ => {
                self.malformed(key, "identity matrix");
                IDENTITY
            }
        }
    }

    pub fn array(&mut self, key: &str) -> Vec<&'a Value> {
        match self.get(key) {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => {
                self.malformed(key, "empty list");
                Vec::new()
            }
        }
    }

    /// `[{tuid, type?}, ...]`; entries without a usable TUID are dropped and reported
    pub fn references(&mut self, key: &str) -> Vec<Reference> {
        let mut refs = Vec::new();
        for (i, item) in self.array(key).into_iter().enumerate() {
            let tuid = item.get("tuid").and_then(parse_int).or_else(|| parse_int(item));
            let type_code = item
                .get("type")
                .and_then(parse_int)
                .and_then(|code| u32::try_from(code).ok());
            match tuid {
                Some(tuid) => refs.push(Reference { tuid, type_code }),
                None => self.malformed(&format!("{}[{}]", key, i), "entry dropped"),
            }
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_on<'a>(value: &'a Value, report: &'a mut Report) -> FieldReader<'a> {
        FieldReader::new(value.as_object().unwrap(), "test.prop.json", report)
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int(&json!(17)), Some(17));
        assert_eq!(parse_int(&json!("0x11")), Some(17));
        assert_eq!(parse_int(&json!("17")), Some(17));
        assert_eq!(parse_int(&json!("1F")), Some(31));
        assert_eq!(parse_int(&json!("zz")), None);
        assert_eq!(parse_int(&json!(-1)), None);
    }

    #[test]
    fn test_float_bits_roundtrip() {
        let nan = f32::from_bits(0x7FC0_0001);
        let v = float_value(nan);
        assert_eq!(v, json!("0x7FC00001"));
        assert_eq!(parse_float(&v).unwrap().to_bits(), 0x7FC0_0001);
        assert_eq!(parse_float(&float_value(-0.25)), Some(-0.25));
    }

    #[test]
    fn test_malformed_fields_fall_back_and_report() {
        let value = json!({
            "tuid": "not-a-number",
            "scale": "big",
            "zone": 70000,
            "flags": "XYZ",
            "position": {"x": 1.0, "y": "oops", "z": 3.0},
        });
        let mut report = Report::new();
        let mut r = reader_on(&value, &mut report);
        assert_eq!(r.tuid("tuid"), NO_TUID);
        assert_eq!(r.f32("scale", 1.0), 1.0);
        assert_eq!(r.u16("zone", 0), 0);
        assert_eq!(r.bytes::<8>("flags", [0; 8]), [0; 8]);
        assert_eq!(r.vec3("position", [0.0; 3]), [0.0; 3]);
        assert_eq!(report.len(), 5);
    }

    #[test]
    fn test_absent_fields_are_silent() {
        let value = json!({ "tuid": 5 });
        let mut report = Report::new();
        let mut r = reader_on(&value, &mut report);
        assert_eq!(r.f32("update_dist", -1.0), -1.0);
        assert_eq!(r.matrix("transform_matrix"), IDENTITY);
        assert!(r.references("instance_references").is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn test_matrix_forms() {
        let value = json!({
            "nested": [[2, 0, 0, 0], [0, 2, 0, 0], [0, 0, 2, 0], [5, 6, 7, 1]],
            "flat": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 9, 9, 9, 1],
            "bad": [[1, 2], [3]],
        });
        let mut report = Report::new();
        let mut r = reader_on(&value, &mut report);
        assert_eq!(r.matrix("nested")[3], [5.0, 6.0, 7.0, 1.0]);
        assert_eq!(r.matrix("flat")[3][0], 9.0);
        assert_eq!(r.matrix("bad"), IDENTITY);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_references() {
        let value = json!({
            "instance_references": [{"tuid": "0x1", "type": 0}, {"tuid": 2}, {"type": 3}]
        });
        let mut report = Report::new();
        let mut r = reader_on(&value, &mut report);
        let refs = r.references("instance_references");
        assert_eq!(
            refs,
            vec![
                Reference { tuid: 1, type_code: Some(0) },
                Reference { tuid: 2, type_code: None },
            ]
        );
        assert_eq!(report.len(), 1);
    }
}
