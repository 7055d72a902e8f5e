//! # ighw-rs - IGHW level container codec
//!
//! `ighw-rs` reads and writes IGHW level containers: big-endian files made
//! of a header, a section table, typed section payloads and a trailing
//! pointer table listing every absolute address written into the file.
//!
//! - **Decode** a container into a [`Level`]: zones, the eight entity
//!   categories, their sub-blobs and the recorded registry and name orders
//! - **Encode** a level back, byte-identical for containers this crate wrote
//! - **Extract / repack** through an on-disk workspace of JSON records
//!
//! Nothing fails on a dangling reference or a bad record field; those are
//! downgraded and collected in a [`Report`]. Only format errors are fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ighw_rs::{Codec, Result};
//!
//! # fn main() -> Result<()> {
//! let codec = Codec::new();
//!
//! // Container to workspace
//! let (manifest, report) = codec.extract("level.dat", "level_files")?;
//! println!("{} records, {} warnings", manifest.record_count(), report.len());
//!
//! // Workspace back to container
//! let report = codec.repack("level_files", "level_out.dat")?;
//! assert!(report.unresolved_references().next().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## In memory
//!
//! ```rust
//! use ighw_rs::{Codec, Entity, EntityHeader, Level, Prop, Region, Zone};
//!
//! # fn main() -> ighw_rs::Result<()> {
//! let mut region = Region::new("docks");
//! region.zones.push(Zone::new(0, "pier"));
//! let mut level = Level::new(region);
//! level.push(Entity::Prop(Prop::new(EntityHeader::new(0x1, "Crate", 0))));
//!
//! let codec = Codec::new();
//! let (bytes, _) = codec.encode(&level)?;
//! let (decoded, report) = codec.decode(&bytes)?;
//! assert_eq!(decoded.entities[0].name(), "Crate");
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use crate::core::{
    config, cursor, decode, encode, entity, error, header, io, layout, level, manifest, names,
    patch, record, registry, report, section, subfile, zone,
};

// Re-export core types that users need
pub use crate::core::{
    config::{CodecConfig, RegistryFallback},
    entity::{
        Area, Category, Clue, Controller, Entity, EntityHeader, Path as PathEntity, PathPoint,
        Pool, Prop, Reference, Scent, Volume,
    },
    error::{IghwError, Result},
    header::{Header, Version},
    layout::Assembled,
    level::Level,
    manifest::{ManifestZone, WorkspaceManifest},
    registry::InstanceTypeEntry,
    report::{Report, Warning},
    section::{Container, SectionEntry},
    subfile::{PoolKind, Subfile},
    zone::{Region, Zone},
};

use std::path::Path;
use tracing::{debug, info};

/// High-level codec entry point
///
/// Holds a [`CodecConfig`] and exposes the container and workspace
/// operations. Every call builds its own accumulators, so one `Codec` can be
/// shared freely.
///
/// # Examples
///
/// ```rust,no_run
/// use ighw_rs::{Codec, CodecConfig, RegistryFallback};
///
/// # fn main() -> ighw_rs::Result<()> {
/// let codec = Codec::with_config(
///     CodecConfig::new()
///         .canonical()
///         .with_registry_fallback(RegistryFallback::Sorted),
/// );
/// let report = codec.repack("edited_level", "level.dat")?;
/// for warning in report.warnings() {
///     eprintln!("{}", warning);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Codec { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decode container bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<(Level, Report)> {
        decode::decode_level(bytes)
    }

    /// Encode a level into container bytes
    pub fn encode(&self, level: &Level) -> Result<(Vec<u8>, Report)> {
        let (assembled, report) = encode::encode_level(level, &self.config)?;
        Ok((assembled.bytes, report))
    }

    /// Decode a container file
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<(Level, Report)> {
        debug!("Reading container {}", path.as_ref().display());
        self.decode(&io::read_container(path)?)
    }

    /// Encode a level into a container file
    pub fn encode_file<P: AsRef<Path>>(&self, level: &Level, path: P) -> Result<Report> {
        let (bytes, report) = self.encode(level)?;
        io::write_container(&path, &bytes)?;
        info!("Wrote {} ({} bytes)", path.as_ref().display(), bytes.len());
        Ok(report)
    }

    /// Decode a container into a workspace folder
    pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        outdir: Q,
    ) -> Result<(WorkspaceManifest, Report)> {
        let (level, report) = self.decode_file(input)?;
        let manifest = io::write_workspace(&level, outdir)?;
        Ok((manifest, report))
    }

    /// Encode a workspace folder into a container
    pub fn repack<P: AsRef<Path>, Q: AsRef<Path>>(&self, dir: P, output: Q) -> Result<Report> {
        let mut report = Report::new();
        let level = io::read_workspace(dir, &mut report)?;
        report.extend(self.encode_file(&level, output)?);
        Ok(report)
    }
}

/// Bytes of a container with no sections
pub fn empty_container(version: Version) -> Vec<u8> {
    Header::empty(version).to_bytes()
}

/// Write a container with no sections
pub fn mkheader<P: AsRef<Path>>(path: P, version: Version) -> Result<()> {
    io::write_container(&path, &empty_container(version))?;
    info!("Wrote empty IGHW {} header to {}", version, path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_container_parses() -> Result<()> {
        let bytes = empty_container(Version::EMPTY);
        assert_eq!(bytes.len(), 0x20);
        let container = Container::parse(&bytes)?;
        assert_eq!(container.header.section_count, 0);
        assert_eq!(container.header.pointer_table_offset, 0x20);
        assert_eq!(container.header.pointer_count, 0);
        Ok(())
    }

    #[test]
    fn test_empty_container_decodes_to_empty_level() -> Result<()> {
        let (level, _) = Codec::new().decode(&empty_container(Version::new(1, 3)))?;
        assert!(level.entities.is_empty());
        assert_eq!(level.version, Version::new(1, 3));
        Ok(())
    }
}
