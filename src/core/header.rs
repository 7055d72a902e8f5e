use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{IghwError, Result};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"IGHW";
pub const LEGACY_HEADER_SIZE: usize = 0x10;
pub const MODERN_HEADER_SIZE: usize = 0x20;
pub const SECTION_ENTRY_SIZE: usize = 0x10;

/// Reserved tail of a modern header
pub const SENTINEL: [u8; 8] = [0xDE, 0xAD, 0xDE, 0xAD, 0xDE, 0xAD, 0xDE, 0xAD];

/// Container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    /// Version written by rebuilds
    pub const REPACK: Version = Version { major: 1, minor: 1 };

    /// Version written by `mkheader` when none is given
    pub const EMPTY: Version = Version { major: 1, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Version { major, minor }
    }

    pub fn is_legacy(&self) -> bool {
        self.major == 0
    }

    pub fn header_form(&self) -> HeaderForm {
        if self.is_legacy() {
            HeaderForm::Legacy
        } else {
            HeaderForm::Modern
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::REPACK
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    /// 16-byte header, 16-bit section count, no pointer table fields
    Legacy,
    /// 32-byte header with pointer table location and sentinel tail
    Modern,
}

impl HeaderForm {
    pub fn size(&self) -> usize {
        match self {
            HeaderForm::Legacy => LEGACY_HEADER_SIZE,
            HeaderForm::Modern => MODERN_HEADER_SIZE,
        }
    }
}

/// IGHW container header
///
/// ```text
/// 0x00  magic "IGHW"
/// 0x04  u16 major, u16 minor
/// 0x08  section count (u16 legacy, u32 modern)
/// 0x0C  u32 header length          (modern only)
/// 0x10  u32 pointer table offset   (modern only)
/// 0x14  u32 pointer count          (modern only)
/// 0x18  DE AD DE AD DE AD DE AD    (modern only)
/// ```
///
/// The section table starts right after the header: 0x10 or 0x20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub section_count: u32,
    /// Header plus section table, modern only
    pub header_length: u32,
    pub pointer_table_offset: u32,
    pub pointer_count: u32,
}

impl Header {
    /// Modern header for `section_count` sections, pointer table unknown yet
    pub fn new(version: Version, section_count: u32) -> Self {
        Header {
            version,
            section_count,
            header_length: (MODERN_HEADER_SIZE + SECTION_ENTRY_SIZE * section_count as usize)
                as u32,
            pointer_table_offset: 0,
            pointer_count: 0,
        }
    }

    /// Header of a container with no sections
    pub fn empty(version: Version) -> Self {
        let mut header = Header::new(version, 0);
        if version.is_legacy() {
            header.header_length = LEGACY_HEADER_SIZE as u32;
        } else {
            header.pointer_table_offset = MODERN_HEADER_SIZE as u32;
        }
        header
    }

    pub fn form(&self) -> HeaderForm {
        self.version.header_form()
    }

    /// Offset of the first section table entry
    pub fn section_table_offset(&self) -> usize {
        self.form().size()
    }

    /// Parse a header, selecting the form from the major version
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let magic: [u8; 4] = r.array()?;
        if magic != MAGIC {
            return Err(IghwError::InvalidMagic(magic));
        }
        let version = Version::new(r.u16()?, r.u16()?);

        if version.is_legacy() {
            let section_count = r.u16()? as u32;
            r.skip(6)?;
            return Ok(Header {
                version,
                section_count,
                header_length: (LEGACY_HEADER_SIZE + SECTION_ENTRY_SIZE * section_count as usize)
                    as u32,
                pointer_table_offset: 0,
                pointer_count: 0,
            });
        }

        let section_count = r.u32()?;
        let header_length = r.u32()?;
        let pointer_table_offset = r.u32()?;
        let pointer_count = r.u32()?;
        r.skip(SENTINEL.len())?;

        Ok(Header {
            version,
            section_count,
            header_length,
            pointer_table_offset,
            pointer_count,
        })
    }

    /// Serialize in the form selected by the version
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(MODERN_HEADER_SIZE);
        w.put_bytes(&MAGIC)
            .put_u16(self.version.major)
            .put_u16(self.version.minor);
        match self.form() {
            HeaderForm::Legacy => {
                w.put_u16(self.section_count as u16).put_zeros(6);
            }
            HeaderForm::Modern => {
                w.put_u32(self.section_count)
                    .put_u32(self.header_length)
                    .put_u32(self.pointer_table_offset)
                    .put_u32(self.pointer_count)
                    .put_bytes(&SENTINEL);
            }
        }
        w.into_inner()
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::empty(Version::EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_header_roundtrip() {
        let mut header = Header::new(Version::REPACK, 3);
        header.pointer_table_offset = 0x400;
        header.pointer_count = 12;

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), MODERN_HEADER_SIZE);
        assert_eq!(&bytes[0x18..0x20], &SENTINEL);
        assert_eq!(header.header_length, 0x20 + 3 * 16);

        let parsed = Header::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.section_table_offset(), 0x20);
    }

    #[test]
    fn test_legacy_header_parse() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"IGHW");
        bytes.extend_from_slice(&[0, 0, 0, 2]);
        bytes.extend_from_slice(&[0, 5]);
        bytes.extend_from_slice(&[0xFF; 6]);

        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.form(), HeaderForm::Legacy);
        assert_eq!(header.section_count, 5);
        assert_eq!(header.section_table_offset(), 0x10);
        assert_eq!(header.pointer_count, 0);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = Header::default().to_bytes();
        bytes[0] = b'X';
        let result = Header::from_bytes(&bytes);
        assert!(matches!(result, Err(IghwError::InvalidMagic(_))));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = Header::default().to_bytes();
        let result = Header::from_bytes(&bytes[..12]);
        assert!(matches!(result, Err(IghwError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_empty_headers() {
        let modern = Header::empty(Version::EMPTY);
        assert_eq!(modern.pointer_table_offset, 0x20);
        assert_eq!(modern.header_length, 0x20);

        let legacy = Header::empty(Version::new(0, 2));
        let bytes = legacy.to_bytes();
        assert_eq!(bytes.len(), LEGACY_HEADER_SIZE);
        assert_eq!(Header::from_bytes(&bytes).unwrap().section_count, 0);
    }
}
