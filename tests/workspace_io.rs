//! Extract / repack through an on-disk workspace

use ighw_rs::core::io::{read_workspace, write_workspace};
use ighw_rs::{
    Clue, Codec, Controller, Entity, EntityHeader, Level, Pool, PoolKind, Prop, Reference, Region,
    Report, Scent, Subfile, Volume, Warning, WorkspaceManifest, Zone,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn level() -> Level {
    let mut region = Region::new("old town");
    let mut square = Zone::new(0, "square");
    square.tail = [7, 0, 0, 9];
    region.zones.push(square);
    region.zones.push(Zone::new(2, "tower/top"));
    let mut level = Level::new(region);

    let mut barrel = Prop::new(EntityHeader::new(0x100, "Barrel", 2));
    barrel.position = [0.1, -3.75, 1e-3];
    barrel.subfile = Some(Subfile::new(PoolKind::Local, b"IGHW-ish".to_vec()));
    level.push(Entity::Prop(barrel));
    let mut twin = Prop::new(EntityHeader::new(0x101, "Barrel", 2));
    twin.subfile = Some(Subfile::new(PoolKind::Local, b"IGHW-ish".to_vec()));
    level.push(Entity::Prop(twin));

    let mut door = Controller::new(EntityHeader::new(0x200, "Door", 0));
    door.subfile = Some(Subfile::new(PoolKind::Host, vec![1, 2, 3, 4]));
    level.push(Entity::Controller(door));

    level.push(Entity::Volume(Volume::new(EntityHeader::new(0x300, "Zone Trigger", 0))));
    let mut clue = Clue::new(EntityHeader::new(0x400, "Bell", 0));
    clue.volume = Some(Reference::new(0x300));
    level.push(Entity::Clue(clue));

    let mut pool = Pool::new(EntityHeader::new(0x500, "Barrels", 2));
    pool.references = vec![Reference::new(0x100), Reference::new(0x101)];
    level.push(Entity::Pool(pool));
    let mut scent = Scent::new(EntityHeader::new(0x600, "Bell Scent", 0));
    scent.references = vec![Reference::new(0x400)];
    level.push(Entity::Scent(scent));
    level
}

fn write_source(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("level.dat");
    let (bytes, _) = Codec::new().encode(&level()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_extract_repack_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path());
    let workspace = dir.path().join("ws");
    let output = dir.path().join("out.dat");

    let codec = Codec::new();
    let (manifest, report) = codec.extract(&source, &workspace).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(manifest.record_count(), 7);

    let report = codec.repack(&workspace, &output).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(fs::read(&source).unwrap(), fs::read(&output).unwrap());
}

#[test]
fn test_workspace_layout() {
    let dir = TempDir::new().unwrap();
    let manifest = write_workspace(&level(), dir.path()).unwrap();

    let tower = dir.path().join("old_town/tower_top");
    assert!(tower.join("Barrel.prop.json").is_file());
    assert!(tower.join("Barrel_1.prop.json").is_file());
    assert!(tower.join("Barrel_CLASS.local.dat").is_file());
    assert!(tower.join("Barrel_1_CLASS.local.dat").is_file());
    assert!(dir.path().join("old_town/square/Door_CLASS.host.dat").is_file());

    let loaded = WorkspaceManifest::load(dir.path()).unwrap();
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.zones[0].tail, [7, 0, 0, 9]);
    assert_eq!(loaded.counts["prop"], 2);
}

#[test]
fn test_records_are_readable_json() {
    let dir = TempDir::new().unwrap();
    write_workspace(&level(), dir.path()).unwrap();

    let text = fs::read_to_string(dir.path().join("old_town/tower_top/Barrels.pool.json")).unwrap();
    let record: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(record["name"], "Barrels");
    assert_eq!(record["tuid"], "0x0000000000000500");
    assert_eq!(record["zone"], 2);
}

#[test]
fn test_malformed_field_falls_back() {
    let dir = TempDir::new().unwrap();
    write_workspace(&level(), dir.path()).unwrap();
    let path = dir.path().join("old_town/tower_top/Barrel.prop.json");
    let mut record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    record["scale"] = serde_json::json!("not a number");
    fs::write(&path, record.to_string()).unwrap();

    let mut report = Report::new();
    let level = read_workspace(dir.path(), &mut report).unwrap();
    assert!(report
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::MalformedField { field, .. } if field == "scale")));
    assert_eq!(level.entities.len(), 7);
}

#[test]
fn test_broken_record_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_workspace(&level(), dir.path()).unwrap();
    fs::write(dir.path().join("old_town/square/Door.controller.json"), "{").unwrap();

    let mut report = Report::new();
    let level = read_workspace(dir.path(), &mut report).unwrap();
    assert_eq!(level.entities.len(), 6);
    assert!(matches!(report.warnings()[0], Warning::SkippedRecord { .. }));
}

#[test]
fn test_repack_without_manifest() {
    let dir = TempDir::new().unwrap();
    write_workspace(&level(), dir.path()).unwrap();
    fs::remove_file(dir.path().join(WorkspaceManifest::FILE_NAME)).unwrap();

    let mut report = Report::new();
    let walked = read_workspace(dir.path(), &mut report).unwrap();
    assert_eq!(walked.region.name, "old_town");
    assert_eq!(walked.entities.len(), 7);
    let indices: Vec<u16> = walked.region.zones.iter().map(|z| z.index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert!(walked.instance_order.is_empty());

    let barrel = walked.find(0x100).unwrap();
    assert_eq!(barrel.subfile().map(|s| s.pool), Some(PoolKind::Local));

    let output = dir.path().join("walked.dat");
    let report = Codec::new().encode_file(&walked, &output).unwrap();
    assert_eq!(report.unresolved_references().count(), 0);
    let (decoded, _) = Codec::new().decode_file(&output).unwrap();
    assert_eq!(decoded.entities.len(), 7);
}

#[test]
fn test_missing_workspace_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut report = Report::new();
    assert!(read_workspace(dir.path(), &mut report).is_err());
}

#[test]
fn test_mkheader_writes_empty_container() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.dat");
    ighw_rs::mkheader(&path, ighw_rs::Version::EMPTY).unwrap();
    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"IGHW");
    assert_eq!(bytes.len(), 0x20);
    let (level, _) = Codec::new().decode(&bytes).unwrap();
    assert!(level.entities.is_empty());
}

#[test]
fn test_unlisted_record_is_reported() {
    let dir = TempDir::new().unwrap();
    write_workspace(&level(), dir.path()).unwrap();
    let square = dir.path().join("old_town/square");
    fs::copy(square.join("Door.controller.json"), square.join("Gate.controller.json")).unwrap();

    let mut report = Report::new();
    let level = read_workspace(dir.path(), &mut report).unwrap();
    assert_eq!(level.entities.len(), 7);
    assert!(matches!(
        report.warnings(),
        [Warning::SkippedRecord { path, .. }] if path == "old_town/square/Gate.controller.json"
    ));
}
