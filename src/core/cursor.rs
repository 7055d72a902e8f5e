//! Big-endian byte access
//!
//! Every integer in an IGHW container is big-endian. [`ByteReader`] is a
//! bounds-checked view used by decode; [`ByteWriter`] builds section payloads.

use crate::error::{IghwError, Result};

/// Bounds-checked big-endian reader over a byte slice
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Reader positioned at `offset`
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        ByteReader { data, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(IghwError::UnexpectedEof {
                offset: self.pos,
                needed: count,
                available: self.remaining(),
            }),
        }
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    pub fn vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    /// Raw bytes of the NUL-terminated string at the cursor, terminator excluded
    ///
    /// A missing terminator reads to the end of the slice.
    pub fn cstr_bytes(&mut self) -> Result<&'a [u8]> {
        if self.pos > self.data.len() {
            return Err(IghwError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
                available: 0,
            });
        }
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|b| *b == 0).unwrap_or(rest.len());
        self.pos += (len + 1).min(rest.len());
        Ok(&rest[..len])
    }
}

/// Read a big-endian u32 at an absolute offset
pub fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    ByteReader::at(data, offset).u32()
}

/// Read a big-endian u64 at an absolute offset
pub fn u64_at(data: &[u8], offset: usize) -> Result<u64> {
    ByteReader::at(data, offset).u64()
}

/// Fixed-width name field: bytes up to the first NUL, lossy UTF-8
pub fn fixed_str(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// Growable big-endian writer
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_f32(&mut self, value: f32) -> &mut Self {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_vec3(&mut self, value: [f32; 3]) -> &mut Self {
        for v in value {
            self.put_f32(v);
        }
        self
    }

    pub fn put_zeros(&mut self, count: usize) -> &mut Self {
        self.buf.resize(self.buf.len() + count, 0);
        self
    }

    /// Name field of exactly `width` bytes, truncated and NUL padded
    pub fn put_fixed_str(&mut self, text: &str, width: usize) -> &mut Self {
        let bytes = text.as_bytes();
        let len = bytes.len().min(width);
        self.put_bytes(&bytes[..len]);
        self.put_zeros(width - len)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Overwrite a big-endian u32 in place. Callers guarantee `offset + 4 <= buf.len()`.
pub fn write_u32_at(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x3F, 0x80, 0x00, 0x00];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u16().unwrap(), 1);
        assert_eq!(r.u32().unwrap(), 2);
        assert_eq!(r.f32().unwrap(), 1.0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read_is_eof() {
        let data = [0u8; 3];
        let err = ByteReader::new(&data).u32().unwrap_err();
        assert!(matches!(
            err,
            IghwError::UnexpectedEof {
                needed: 4,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_cstr_stops_at_nul() {
        let data = b"Crate\0Barrel\0";
        let mut r = ByteReader::new(data);
        assert_eq!(r.cstr_bytes().unwrap(), b"Crate");
        assert_eq!(r.position(), 6);
        assert_eq!(r.cstr_bytes().unwrap(), b"Barrel");
    }

    #[test]
    fn test_cstr_without_terminator() {
        let mut r = ByteReader::new(b"abc");
        assert_eq!(r.cstr_bytes().unwrap(), b"abc");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_cstr_bytes_keeps_invalid_utf8() {
        let mut r = ByteReader::new(b"ab\xFFc\0d");
        assert_eq!(r.cstr_bytes().unwrap(), b"ab\xFFc");
        assert_eq!(r.position(), 5);
    }

    #[test]
    fn test_writer_fixed_str() {
        let mut w = ByteWriter::new();
        w.put_fixed_str("zone", 8).put_u16(0xBEEF);
        assert_eq!(w.as_slice(), b"zone\0\0\0\0\xBE\xEF");
        assert_eq!(fixed_str(&w.as_slice()[..8]), "zone");
    }

    #[test]
    fn test_write_u32_at() {
        let mut buf = vec![0u8; 8];
        write_u32_at(&mut buf, 4, 0x0102_0304);
        assert_eq!(u32_at(&buf, 4).unwrap(), 0x0102_0304);
    }
}
