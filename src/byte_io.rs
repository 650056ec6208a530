//! Endian-aware cursor reader and buffer writer used by the PIPA and HIP codecs.
//!
//! Every read failure is reported as [`Error::Format`]; both formats treat a short
//! buffer as a malformed file rather than an I/O problem.

use byteorder::{ByteOrder, ReadBytesExt};
use std::io::{Cursor, Read};
use std::marker::PhantomData;

use crate::error::{Error, Result};

pub struct Reader<'a, E: ByteOrder> {
    cursor: Cursor<&'a [u8]>,
    _order: PhantomData<E>,
}

impl<'a, E: ByteOrder> Reader<'a, E> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            _order: PhantomData,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| eof("u8"))
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.cursor.read_i16::<E>().map_err(|_| eof("int16"))
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<E>().map_err(|_| eof("int32"))
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<E>().map_err(|_| eof("uint32"))
    }

    pub fn tag(&mut self) -> Result<[u8; 4]> {
        let mut tag = [0u8; 4];
        self.cursor.read_exact(&mut tag).map_err(|_| eof("4-byte tag"))?;
        Ok(tag)
    }

    /// Borrow the next `len` bytes without copying.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::format(format!(
                "unexpected end of data: need {} bytes at offset {}, {} left",
                len,
                self.position(),
                self.remaining()
            )));
        }
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    /// Read a NUL-terminated UTF-8 string. The terminator is consumed.
    pub fn cstr(&mut self) -> Result<String> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let rest = &data[self.position()..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::format("unterminated string"))?;
        let raw = self.bytes(len)?;
        self.skip(1)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::format(format!("string is not valid UTF-8: {}", e)))
    }
}

fn eof(what: &str) -> Error {
    Error::format(format!("unexpected end of data while reading {}", what))
}

pub struct Writer<E: ByteOrder> {
    buf: Vec<u8>,
    _order: PhantomData<E>,
}

impl<E: ByteOrder> Default for Writer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> Writer<E> {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            _order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn i16(&mut self, v: i16) {
        let mut b = [0u8; 2];
        E::write_i16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        E::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        E::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn fill(&mut self, byte: u8, count: usize) {
        self.buf.resize(self.buf.len() + count, byte);
    }

    /// Write `s` followed by a single NUL. Strings with interior NULs are rejected.
    pub fn cstr(&mut self, s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(Error::EmbeddedNul(s.to_string()));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    /// Overwrite a previously written u32 (used to back-patch block sizes).
    pub fn patch_u32(&mut self, at: usize, v: u32) {
        E::write_u32(&mut self.buf[at..at + 4], v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};

    #[test]
    fn test_endianness() {
        let mut w = Writer::<LittleEndian>::new();
        w.i16(-2);
        w.u32(0x0102_0304);
        assert_eq!(w.into_inner(), vec![0xFE, 0xFF, 0x04, 0x03, 0x02, 0x01]);

        let mut w = Writer::<BigEndian>::new();
        w.u32(0x0102_0304);
        assert_eq!(w.into_inner(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_cstr() {
        let mut w = Writer::<LittleEndian>::new();
        w.cstr("abc").unwrap();
        w.cstr("").unwrap();
        let data = w.into_inner();
        assert_eq!(data, b"abc\0\0");

        let mut r = Reader::<LittleEndian>::new(&data);
        assert_eq!(r.cstr().unwrap(), "abc");
        assert_eq!(r.cstr().unwrap(), "");
        assert!(r.is_empty());
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let mut w = Writer::<LittleEndian>::new();
        assert!(matches!(w.cstr("a\0b"), Err(Error::EmbeddedNul(_))));
    }

    #[test]
    fn test_short_reads_are_format_errors() {
        let mut r = Reader::<LittleEndian>::new(&[1, 2, 3]);
        assert!(matches!(r.i32(), Err(Error::Format(_))));
        let mut r = Reader::<LittleEndian>::new(b"no terminator");
        assert!(matches!(r.cstr(), Err(Error::Format(_))));
        let mut r = Reader::<LittleEndian>::new(&[0; 2]);
        assert!(r.bytes(3).is_err());
        assert_eq!(r.bytes(2).unwrap(), &[0, 0]);
    }
}
