//! Container files and extraction workspaces on disk
//!
//! A workspace is a folder tree of JSON records plus a [`WorkspaceManifest`]:
//!
//! ```text
//! <root>/manifest.json
//! <root>/<region>/<zone>/<stem>.<category>.json
//! <root>/<region>/<zone>/<stem>_CLASS.host.dat
//! <root>/<region>/<zone>/<stem>_CLASS.local.dat
//! ```

use crate::entity::{Category, Entity};
use crate::error::{IghwError, Result};
use crate::header::Version;
use crate::level::Level;
use crate::manifest::{ManifestZone, WorkspaceManifest};
use crate::report::{Report, Warning};
use crate::subfile::{PoolKind, Subfile};
use crate::zone::{Region, Zone};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD_EXTENSION: &str = "json";
const SUBFILE_MARKER: &str = "_CLASS";

/// Read a whole container file
pub fn read_container<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Write a whole container file, creating parent folders
pub fn write_container<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// File-system safe form of an entity or zone name
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unnamed".to_string(),
        _ => cleaned,
    }
}

/// Hands out names unique within one folder, `_N` suffixed on collision
#[derive(Debug, Default)]
struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_lowercase()) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn subfile_path(dir: &Path, stem: &str, pool: PoolKind) -> PathBuf {
    dir.join(format!("{}{}.{}.dat", stem, SUBFILE_MARKER, pool.tag()))
}

/// Split `<stem>.<suffix>.json` into stem and category
pub fn parse_record_name(file_name: &str) -> Option<(&str, Option<Category>)> {
    let base = file_name.strip_suffix(".json")?;
    let (stem, suffix) = base.rsplit_once('.')?;
    Some((stem, Category::from_suffix(suffix)))
}

fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write a decoded level as a workspace under `root`
pub fn write_workspace<P: AsRef<Path>>(level: &Level, root: P) -> Result<WorkspaceManifest> {
    let root = root.as_ref();
    let region_dir = sanitize_name(&level.region.name);
    fs::create_dir_all(root.join(&region_dir))?;

    let mut manifest = WorkspaceManifest::new(level.region.name.clone(), level.version)
        .with_instance_types(level.instance_order.clone())
        .with_name_order(level.name_order.clone());

    // Zone folders: recorded zones first, then any zone only entities mention.
    let mut folders = UniqueNames::default();
    let mut zone_slots: HashMap<u16, (usize, PathBuf, UniqueNames)> = HashMap::new();
    let mut add_zone = |manifest: &mut WorkspaceManifest, zone: ManifestZone| {
        let dir = root.join(&region_dir).join(folders.claim(&sanitize_name(&zone.name)));
        zone_slots
            .entry(zone.index)
            .or_insert((manifest.zones.len(), dir, UniqueNames::default()));
        manifest.zones.push(zone);
    };
    for zone in &level.region.zones {
        add_zone(&mut manifest, ManifestZone::new(zone.index, zone.name.clone(), zone.tail));
    }
    let mut missing: Vec<u16> = level
        .entities
        .iter()
        .map(Entity::zone)
        .filter(|z| level.region.zone(*z).is_none())
        .collect();
    missing.sort_unstable();
    missing.dedup();
    for index in missing {
        let mut zone = ManifestZone::new(index, Zone::placeholder_name(index), [0; 4]);
        zone.synthesized = true;
        add_zone(&mut manifest, zone);
    }

    for entity in &level.entities {
        let Some((position, dir, stems)) = zone_slots.get_mut(&entity.zone()) else {
            continue;
        };
        fs::create_dir_all(&*dir)?;
        let stem = stems.claim(&sanitize_name(entity.name()));
        let suffix = entity.category().suffix();
        let path = dir.join(format!("{}.{}.{}", stem, suffix, RECORD_EXTENSION));
        fs::write(&path, serde_json::to_string_pretty(&entity.to_record())?)?;
        if let Some(subfile) = entity.subfile() {
            fs::write(subfile_path(dir, &stem, subfile.pool), &subfile.bytes)?;
        }
        manifest.zones[*position].records.push(relative(root, &path));
        manifest.count_record(suffix);
    }

    manifest.save(root)?;
    info!(
        "Wrote workspace {} with {} records in {} zones",
        root.display(),
        manifest.record_count(),
        manifest.zones.len()
    );
    Ok(manifest)
}

/// Sub-blob stored next to a record, if any
fn read_subfile(dir: &Path, stem: &str) -> Result<Option<Subfile>> {
    for pool in [PoolKind::Host, PoolKind::Local] {
        let path = subfile_path(dir, stem, pool);
        if path.is_file() {
            return Ok(Some(Subfile::new(pool, fs::read(path)?)));
        }
    }
    Ok(None)
}

/// Load one record file, or report why it was skipped
fn read_record(path: &Path, label: &str, report: &mut Report) -> Result<Option<Entity>> {
    let skip = |report: &mut Report, reason: String| {
        report.push(Warning::SkippedRecord {
            path: label.to_string(),
            reason,
        });
        Ok(None)
    };

    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let Some((stem, category)) = parse_record_name(&file_name) else {
        return skip(report, "not a `<name>.<category>.json` record".into());
    };
    let Some(category) = category else {
        return skip(report, "unknown category suffix".into());
    };
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return skip(report, "file is missing".into())
        }
        Err(e) => return Err(e.into()),
    };
    let fields = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return skip(report, "record is not a JSON object".into()),
        Err(e) => return skip(report, format!("invalid JSON: {}", e)),
    };

    let mut entity = Entity::from_record(category, &fields, label, report);
    let dir = path.parent().unwrap_or(Path::new(""));
    entity.set_subfile(read_subfile(dir, stem)?);
    Ok(Some(entity))
}

fn read_with_manifest(root: &Path, manifest: WorkspaceManifest, report: &mut Report) -> Result<Level> {
    let zones = manifest
        .zones
        .iter()
        .filter(|z| !z.synthesized)
        .map(|z| Zone {
            index: z.index,
            name: z.name.clone(),
            tail: z.tail,
        })
        .collect();
    let mut level = Level::new(Region {
        name: manifest.region.clone(),
        zones,
    });
    level.version = manifest.source_version;

    for zone in &manifest.zones {
        for record in &zone.records {
            let path = root.join(record);
            if let Some(entity) = read_record(&path, record, report)? {
                level.push(entity);
            }
        }
    }
    report_unlisted(root, &manifest, report)?;
    level.instance_order = manifest.instance_types;
    level.name_order = manifest.name_order;
    Ok(level)
}

/// Warn about record files in zone folders that the manifest does not list
fn report_unlisted(root: &Path, manifest: &WorkspaceManifest, report: &mut Report) -> Result<()> {
    let listed: HashSet<&str> = manifest
        .zones
        .iter()
        .flat_map(|z| z.records.iter().map(String::as_str))
        .collect();
    let folders: BTreeSet<PathBuf> = listed
        .iter()
        .filter_map(|record| root.join(record).parent().map(Path::to_path_buf))
        .filter(|dir| dir.is_dir())
        .collect();
    for dir in folders {
        for path in sorted_entries(&dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let label = relative(root, &path);
            if !listed.contains(label.as_str()) {
                report.push(Warning::SkippedRecord {
                    path: label,
                    reason: format!("not listed in {}", WorkspaceManifest::FILE_NAME),
                });
            }
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Rebuild a level from folder structure alone
fn read_by_walking(root: &Path, report: &mut Report) -> Result<Level> {
    let region_dirs: Vec<PathBuf> = sorted_entries(root)?.into_iter().filter(|p| p.is_dir()).collect();
    let Some(first) = region_dirs.first() else {
        return Err(IghwError::InvalidWorkspace(format!(
            "{} has neither a manifest nor a region folder",
            root.display()
        )));
    };
    let name = first.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut level = Level::new(Region::new(name));
    level.version = Version::REPACK;

    let mut zones: BTreeMap<u16, Zone> = BTreeMap::new();
    let mut ordinal: u16 = 0;
    for region_dir in &region_dirs {
        for zone_dir in sorted_entries(region_dir)?.into_iter().filter(|p| p.is_dir()) {
            let zone_name = zone_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let mut index = None;
            for path in sorted_entries(&zone_dir)? {
                if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                    continue;
                }
                let label = relative(root, &path);
                if let Some(entity) = read_record(&path, &label, report)? {
                    index.get_or_insert(entity.zone());
                    level.push(entity);
                }
            }
            let index = index.unwrap_or(ordinal);
            zones.entry(index).or_insert_with(|| Zone::new(index, zone_name));
            ordinal = ordinal.max(index).saturating_add(1);
        }
    }
    level.region.zones = zones.into_values().collect();
    debug!("walked {} zones without a manifest", level.region.zones.len());
    Ok(level)
}

/// Load a workspace, from its manifest when there is one
pub fn read_workspace<P: AsRef<Path>>(root: P, report: &mut Report) -> Result<Level> {
    let root = root.as_ref();
    let level = match WorkspaceManifest::load(root) {
        Ok(manifest) => read_with_manifest(root, manifest, report)?,
        Err(IghwError::ManifestNotFound(path)) => {
            info!("No {} found, walking the workspace", path.display());
            read_by_walking(root, report)?
        }
        Err(e) => return Err(e),
    };
    info!(
        "Read {} records for region {}",
        level.entities.len(),
        level.region.name
    );
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Prop};
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Big Crate/left\\top"), "Big_Crate_left_top");
        assert_eq!(sanitize_name(""), "unnamed");
        assert_eq!(sanitize_name(".."), "unnamed");
    }

    #[test]
    fn test_unique_names() {
        let mut names = UniqueNames::default();
        assert_eq!(names.claim("Crate"), "Crate");
        assert_eq!(names.claim("Crate"), "Crate_1");
        assert_eq!(names.claim("crate"), "crate_2");
    }

    #[test]
    fn test_parse_record_name() {
        assert_eq!(parse_record_name("a.b.prop.json"), Some(("a.b", Some(Category::Prop))));
        assert_eq!(parse_record_name("x.moby.json"), Some(("x", Some(Category::Prop))));
        assert_eq!(parse_record_name("x.what.json"), Some(("x", None)));
        assert_eq!(parse_record_name("x.json"), None);
    }

    #[test]
    fn test_bad_record_is_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.prop.json");
        fs::write(&path, "{ not json")?;
        let mut report = Report::new();
        assert!(read_record(&path, "broken", &mut report)?.is_none());
        assert!(matches!(report.warnings()[0], Warning::SkippedRecord { .. }));
        Ok(())
    }

    #[test]
    fn test_write_container_creates_parents() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out/level.dat");
        write_container(&path, b"IGHW")?;
        assert_eq!(read_container(&path)?, b"IGHW");
        Ok(())
    }

    #[test]
    fn test_same_name_gets_distinct_stems() -> Result<()> {
        let dir = TempDir::new()?;
        let mut level = Level::new(Region::new("r"));
        level.region.zones.push(Zone::new(0, "z"));
        level.push(Entity::Prop(Prop::new(EntityHeader::new(1, "Crate", 0))));
        level.push(Entity::Prop(Prop::new(EntityHeader::new(2, "Crate", 0))));

        let manifest = write_workspace(&level, dir.path())?;
        assert_eq!(
            manifest.zones[0].records,
            vec!["r/z/Crate.prop.json", "r/z/Crate_1.prop.json"]
        );
        Ok(())
    }
}
