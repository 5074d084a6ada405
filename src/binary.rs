//! Little-endian typed cursors over byte buffers
//!
//! The on-disk format is little-endian throughout, so neither cursor takes
//! an endianness option.

use crate::error::{CompoundError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Typed reader over a borrowed byte slice.
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader {
            cursor: Cursor::new(data),
        }
    }

    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.cursor.set_position(offset as u64);
    }

    fn out_of_range(&self, len: usize) -> CompoundError {
        CompoundError::OutOfRange {
            offset: self.cursor.position(),
            len,
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.out_of_range(1))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| self.out_of_range(2))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.out_of_range(4))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.out_of_range(4))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| self.out_of_range(8))
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let data = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        if start + len > data.len() {
            return Err(self.out_of_range(len));
        }
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }
}

/// Typed writer over a growable byte buffer.
///
/// Writing past the current end extends the buffer (zero-filling any gap);
/// re-positioning with [`set_offset`](BinaryWriter::set_offset) allows
/// patching earlier fields.
#[derive(Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
    offset: usize,
}

impl BinaryWriter {
    pub fn new() -> Self {
        BinaryWriter::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BinaryWriter {
            buf: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.offset + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
