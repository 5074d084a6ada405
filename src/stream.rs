//! Byte streams over user streams
//!
//! Both stream kinds borrow the document mutably for their whole lifetime,
//! which pins the single-owner resource model at compile time: streams
//! cannot outlive the document and cannot overlap each other.
//!
//! The two on-disk routings (big sectors through the SAT, short sectors
//! through the SSAT) are a flag on the stream, not separate types; the
//! chain was materialized when the stream was opened.

use crate::directory::DirectoryId;
use crate::document::CompoundDocument;
use crate::error::Result;
use crate::io::ByteImage;
use crate::sector::SectorId;
use std::io::{self, Read, Seek, SeekFrom, Write};

fn to_io_error(err: crate::error::CompoundError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Read-only, seekable view of one user stream.
pub struct ReadStream<'a, I: ByteImage> {
    doc: &'a mut CompoundDocument<I>,
    chain: Vec<SectorId>,
    short: bool,
    unit: u64,
    size: u64,
    pos: u64,
}

impl<'a, I: ByteImage> ReadStream<'a, I> {
    pub(crate) fn new(
        doc: &'a mut CompoundDocument<I>,
        chain: Vec<SectorId>,
        short: bool,
        size: u64,
    ) -> Self {
        let unit = if short {
            doc.short_sector_size()
        } else {
            doc.sector_size()
        } as u64;
        ReadStream {
            doc,
            chain,
            short,
            unit,
            size,
            pos: 0,
        }
    }

    /// Total stream length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl<I: ByteImage> Read for ReadStream<'_, I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;

        while written < buf.len() && self.pos < self.size {
            let index = (self.pos / self.unit) as usize;
            let within = (self.pos % self.unit) as usize;
            let sector = self.chain[index];

            let bytes = if self.short {
                self.doc.read_short_sector(sector)
            } else {
                self.doc.read_sector(sector)
            }
            .map_err(to_io_error)?;

            let take = (self.unit as usize - within)
                .min(buf.len() - written)
                .min((self.size - self.pos) as usize);
            buf[written..written + take].copy_from_slice(&bytes[within..within + take]);
            written += take;
            self.pos += take as u64;
        }

        Ok(written)
    }
}

impl<I: ByteImage> Seek for ReadStream<'_, I> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.size as i64 + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Write-only sink for one user stream.
///
/// Bytes are buffered in memory; the sector layout decision (short versus
/// big chain, by the standard-stream threshold) needs the final length and
/// so happens at [`close`](WriteStream::close). Dropping an unclosed stream
/// commits on a best-effort basis, discarding any error; call `close` to
/// observe failures.
pub struct WriteStream<'a, I: ByteImage> {
    doc: &'a mut CompoundDocument<I>,
    entry_id: DirectoryId,
    buffer: Vec<u8>,
    committed: bool,
}

impl<'a, I: ByteImage> WriteStream<'a, I> {
    pub(crate) fn new(doc: &'a mut CompoundDocument<I>, entry_id: DirectoryId) -> Self {
        WriteStream {
            doc,
            entry_id,
            buffer: Vec::new(),
            committed: false,
        }
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Allocate the chain, write the payload and persist the entry.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        let data = std::mem::take(&mut self.buffer);
        self.doc.write_user_stream(self.entry_id, &data)
    }
}

impl<I: ByteImage> Write for WriteStream<'_, I> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<I: ByteImage> Drop for WriteStream<'_, I> {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}
