//! Codec internals
//!
//! Bottom-up: byte cursors, header and section table, the per-run
//! accumulators (names, sub-blob pools, instance type registry), entity
//! codecs, zones, then the layout assembler and the two entry points
//! [`decode::decode_level`] and [`encode::encode_level`].

pub mod config;
pub mod cursor;
pub mod decode;
pub mod encode;
pub mod entity;
pub mod error;
pub mod header;
pub mod io;
pub mod layout;
pub mod level;
pub mod manifest;
pub mod names;
pub mod patch;
pub mod record;
pub mod registry;
pub mod report;
pub mod section;
pub mod subfile;
pub mod zone;
