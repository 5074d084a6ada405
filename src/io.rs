//! Byte-image adapter
//!
//! The document engine reads and writes one seekable byte image through
//! absolute offsets. Anything that can honor the four operations below can
//! back a document; in-memory buffers and plain files are provided.

use crate::error::{CompoundError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// A seekable byte source/sink addressed by absolute offset.
///
/// Reads beyond the current end fail with `OutOfRange`; writes beyond the
/// end extend the image, zero-filling any gap. Each call is atomic with
/// respect to the image; no other buffering is promised.
pub trait ByteImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;
    fn len(&mut self) -> Result<u64>;
    fn truncate(&mut self, len: u64) -> Result<()>;

    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl ByteImage for std::io::Cursor<Vec<u8>> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.get_ref();
        let end = offset as usize + buf.len();
        if end > data.len() {
            return Err(CompoundError::OutOfRange {
                offset,
                len: buf.len(),
            });
        }
        buf.copy_from_slice(&data[offset as usize..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let buf = self.get_mut();
        let end = offset as usize + data.len();
        if end > buf.len() {
            buf.resize(end, 0);
        }
        buf[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.get_mut().truncate(len as usize);
        Ok(())
    }
}

impl ByteImage for File {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CompoundError::OutOfRange {
                    offset,
                    len: buf.len(),
                }
            } else {
                CompoundError::Io(e)
            }
        })
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)?;
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.set_len(len)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_cursor_read_write_round_trip() {
        let mut image = Cursor::new(Vec::new());
        image.write_at(0, b"hello").unwrap();
        image.write_at(3, b"p!").unwrap();

        let mut buf = [0u8; 5];
        image.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"help!");
    }

    #[test]
    fn test_cursor_write_past_end_zero_fills() {
        let mut image = Cursor::new(Vec::new());
        image.write_at(4, &[0xAA]).unwrap();
        assert_eq!(image.len().unwrap(), 5);

        let mut buf = [0xFFu8; 5];
        image.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0xAA]);
    }

    #[test]
    fn test_cursor_read_past_end_fails() {
        let mut image = Cursor::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        assert!(matches!(
            image.read_at(0, &mut buf),
            Err(CompoundError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_file_image_round_trip() {
        let file = tempfile::tempfile().unwrap();
        let mut image = file;
        image.write_at(512, &[0xAB; 16]).unwrap();

        let mut buf = [0u8; 16];
        image.read_at(512, &mut buf).unwrap();
        assert_eq!(buf, [0xAB; 16]);
        assert_eq!(image.len().unwrap(), 528);

        image.truncate(512).unwrap();
        assert_eq!(image.len().unwrap(), 512);
        assert!(matches!(
            image.read_at(512, &mut buf),
            Err(CompoundError::OutOfRange { .. })
        ));
    }
}
