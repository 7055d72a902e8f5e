//! Non-fatal diagnostics
//!
//! Decode and encode never stop for a dangling reference or a bad record
//! field. They substitute a zero pointer or a default and push a [`Warning`]
//! here; every push is also logged through `tracing`.

use thiserror::Error;
use tracing::warn;

/// One downgrade that happened during a run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    #[error("{entity} ({source_tuid:#018x}) references {target_tuid:#018x}, which is not in the instance type registry; pointer left as zero")]
    UnresolvedReference {
        entity: String,
        source_tuid: u64,
        target_tuid: u64,
    },

    #[error("patch at section {source_section:#x}+{at:#x} targets section {target_section:#x}, which is missing or empty; pointer left as zero")]
    UnresolvedPatch {
        source_section: u32,
        at: u32,
        target_section: u32,
    },

    #[error("{category} skipped: section {section_id:#x} is missing")]
    MissingSection {
        category: &'static str,
        section_id: u32,
    },

    #[error("{context}: {detail}")]
    CountMismatch { context: String, detail: String },

    #[error("{record}: field `{field}` is malformed, using {fallback}")]
    MalformedField {
        record: String,
        field: String,
        fallback: String,
    },

    #[error("record {path} skipped: {reason}")]
    SkippedRecord { path: String, reason: String },

    #[error("zone {index} has entities but no zone record; added as `{name}` with a zero tail")]
    SynthesizedZone { index: u16, name: String },

    #[error("{entity}: address {address:#x} does not point at valid data ({detail})")]
    BadAddress {
        entity: String,
        address: u32,
        detail: String,
    },
}

/// Collected warnings of one decode, encode, extract or repack run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    warnings: Vec<Warning>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning
    pub fn push(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Report) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn unresolved_references(&self) -> impl Iterator<Item = &Warning> {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::UnresolvedReference { .. }))
    }
}
