//! Extraction manifest
//!
//! Written once by extract and read verbatim by repack. It carries what the
//! records alone cannot: region and zone identity, the order records are fed
//! back to the encoder, and the registry and name orders observed in the
//! source container.
//!
//! # Examples
//!
//! ```
//! use ighw_rs::core::manifest::WorkspaceManifest;
//! use ighw_rs::core::header::Version;
//!
//! let manifest = WorkspaceManifest::new("sewers", Version::REPACK);
//! assert_eq!(manifest.region, "sewers");
//! assert!(manifest.zones.is_empty());
//! ```

use crate::error::{IghwError, Result};
use crate::header::Version;
use crate::registry::InstanceTypeEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Workspace manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceManifest {
    /// Layout revision of the workspace itself
    pub format_version: u32,

    /// Creation timestamp (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Version of the extracted container
    pub source_version: Version,

    pub region: String,

    /// Zones in record order
    #[serde(default)]
    pub zones: Vec<ManifestZone>,

    /// Registry rows in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_types: Vec<InstanceTypeEntry>,

    /// Entity TUIDs in name pool order
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "tuid_list")]
    pub name_order: Vec<u64>,

    /// Records per category suffix
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, usize>,
}

/// One zone folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestZone {
    pub index: u16,
    pub name: String,
    #[serde(default)]
    pub tail: [u16; 4],

    /// Folder created for entities whose zone had no record in the source
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthesized: bool,

    /// Record paths relative to the workspace root, `/` separated
    #[serde(default)]
    pub records: Vec<String>,
}

impl WorkspaceManifest {
    /// File name at the workspace root
    pub const FILE_NAME: &'static str = "manifest.json";

    /// Current workspace layout revision
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(region: impl Into<String>, source_version: Version) -> Self {
        WorkspaceManifest {
            format_version: Self::FORMAT_VERSION,
            created: Some(chrono::Utc::now().to_rfc3339()),
            source_version,
            region: region.into(),
            zones: Vec::new(),
            instance_types: Vec::new(),
            name_order: Vec::new(),
            counts: BTreeMap::new(),
        }
    }

    pub fn with_instance_types(mut self, entries: Vec<InstanceTypeEntry>) -> Self {
        self.instance_types = entries;
        self
    }

    pub fn with_name_order(mut self, order: Vec<u64>) -> Self {
        self.name_order = order;
        self
    }

    pub fn add_zone(mut self, zone: ManifestZone) -> Self {
        self.zones.push(zone);
        self
    }

    /// Count one more record of a category
    pub fn count_record(&mut self, suffix: &str) {
        *self.counts.entry(suffix.to_string()).or_insert(0) += 1;
    }

    pub fn record_count(&self) -> usize {
        self.zones.iter().map(|z| z.records.len()).sum()
    }

    /// Reject manifests this build cannot read
    pub fn validate(&self) -> Result<()> {
        if self.format_version > Self::FORMAT_VERSION {
            return Err(IghwError::InvalidWorkspace(format!(
                "manifest format {} is newer than supported {}",
                self.format_version,
                Self::FORMAT_VERSION
            )));
        }
        for zone in &self.zones {
            for record in &zone.records {
                if record.starts_with('/') || record.split('/').any(|part| part == "..") {
                    return Err(IghwError::InvalidWorkspace(format!(
                        "record path `{}` escapes the workspace",
                        record
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: WorkspaceManifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load `manifest.json` from a workspace root
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let path = root.as_ref().join(Self::FILE_NAME);
        if !path.is_file() {
            return Err(IghwError::ManifestNotFound(path));
        }
        Self::from_json(&std::fs::read_to_string(&path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, root: P) -> Result<()> {
        std::fs::write(root.as_ref().join(Self::FILE_NAME), self.to_json()?)?;
        Ok(())
    }
}

impl ManifestZone {
    pub fn new(index: u16, name: impl Into<String>, tail: [u16; 4]) -> Self {
        ManifestZone {
            index,
            name: name.into(),
            tail,
            synthesized: false,
            records: Vec::new(),
        }
    }
}

// TUID lists as hex strings, parsed as leniently as record TUIDs
mod tuid_list {
    use crate::record::parse_int;
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tuids: &[u64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(tuids.len()))?;
        for tuid in tuids {
            seq.serialize_element(&format!("0x{:016X}", tuid))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
        let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
        values
            .iter()
            .map(|v| parse_int(v).ok_or_else(|| D::Error::custom(format!("invalid tuid: {}", v))))
            .collect()
    }
}
