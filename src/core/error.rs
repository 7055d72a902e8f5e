use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions. Anything recoverable goes into a [`crate::core::report::Report`] instead.
#[derive(Error, Debug)]
pub enum IghwError {
    #[error("Invalid magic number in header: {0:02X?}")]
    InvalidMagic([u8; 4]),

    #[error("Unexpected end of data: needed {needed} bytes at offset {offset:#x}, have {available}")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Section {id:#x} at {offset:#x} (+{length:#x}) extends past end of file ({file_len:#x})")]
    SectionOutOfBounds {
        id: u32,
        offset: u32,
        length: u64,
        file_len: usize,
    },

    #[error("Section {id:#x} holds {count} items, more than the 24-bit count field allows")]
    ItemCountOverflow { id: u32, count: usize },

    #[error("Layout exceeds the 32-bit address space at section {id:#x}")]
    LayoutOverflow { id: u32 },

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid workspace: {0}")]
    InvalidWorkspace(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, IghwError>;
