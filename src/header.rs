//! 512-byte file header codec
//!
//! The header is the first 512 bytes of the image. It carries the format
//! signature, the two sector-size powers, the heads of the directory, SSAT
//! and DIFAT chains, and the first 109 master SAT entries inline. All
//! multi-byte fields are little-endian.

use crate::binary::{BinaryReader, BinaryWriter};
use crate::error::{CompoundError, Result};
use crate::sector::{SectorId, END_OF_CHAIN, FREE_SECTOR};

/// File signature, `D0 CF 11 E0 A1 B1 1A E1`.
pub const MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Little-endian byte-order marker as it appears on disk.
pub const BYTE_ORDER_MARK: [u8; 2] = [0xFE, 0xFF];

/// The header always occupies one 512-byte block, independent of the sector
/// size; sector 0 starts immediately after it.
pub const HEADER_SIZE: usize = 512;

/// Number of master SAT entries stored inline in the header.
pub const MSAT_INLINE_ENTRIES: usize = 109;

const VERSION_MAJOR: u16 = 3;
const VERSION_MINOR: u16 = 0x003E;

/// Decoded file header.
///
/// Reserved runs and the CLSID are preserved verbatim so that decoding and
/// re-encoding a foreign header is byte-identical.
#[derive(Debug, Clone)]
pub struct Header {
    pub clsid: [u8; 16],
    pub minor_version: u16,
    pub major_version: u16,
    pub sector_size_power: u16,
    pub short_sector_size_power: u16,
    pub reserved: [u8; 6],
    /// Directory sector count; zero for the V3 layout written here.
    pub num_directory_sectors: u32,
    /// Number of SAT sectors, which is also the length of the MSAT.
    pub num_sat_sectors: u32,
    pub directory_start: SectorId,
    pub transaction_signature: u32,
    /// Streams shorter than this live in short sectors.
    pub min_standard_stream_size: u32,
    pub ssat_start: SectorId,
    /// Number of SSAT sectors.
    pub num_short_sectors: u32,
    /// Head of the DIFAT overflow chain, `END_OF_CHAIN` while unused.
    pub extra_msat_start: SectorId,
    /// Number of DIFAT overflow sectors.
    pub num_msat_sectors: u32,
    /// First 109 master SAT entries; unused slots are `FREE_SECTOR`.
    pub msat: [SectorId; MSAT_INLINE_ENTRIES],
}

impl Header {
    /// Header for a freshly created V3 document: 512-byte sectors, 64-byte
    /// short sectors, 4096-byte short-stream threshold, no chains yet.
    pub fn new() -> Self {
        Header {
            clsid: [0; 16],
            minor_version: VERSION_MINOR,
            major_version: VERSION_MAJOR,
            sector_size_power: 9,
            short_sector_size_power: 6,
            reserved: [0; 6],
            num_directory_sectors: 0,
            num_sat_sectors: 0,
            directory_start: END_OF_CHAIN,
            transaction_signature: 0,
            min_standard_stream_size: 4096,
            ssat_start: END_OF_CHAIN,
            num_short_sectors: 0,
            extra_msat_start: END_OF_CHAIN,
            num_msat_sectors: 0,
            msat: [FREE_SECTOR; MSAT_INLINE_ENTRIES],
        }
    }

    pub fn sector_size(&self) -> usize {
        1usize << self.sector_size_power
    }

    pub fn short_sector_size(&self) -> usize {
        1usize << self.short_sector_size_power
    }

    /// Serialize into exactly [`HEADER_SIZE`] bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(HEADER_SIZE);
        writer.write_bytes(&MAGIC);
        writer.write_bytes(&self.clsid);
        writer.write_u16(self.minor_version);
        writer.write_u16(self.major_version);
        writer.write_bytes(&BYTE_ORDER_MARK);
        writer.write_u16(self.sector_size_power);
        writer.write_u16(self.short_sector_size_power);
        writer.write_bytes(&self.reserved);
        writer.write_u32(self.num_directory_sectors);
        writer.write_u32(self.num_sat_sectors);
        writer.write_i32(self.directory_start);
        writer.write_u32(self.transaction_signature);
        writer.write_u32(self.min_standard_stream_size);
        writer.write_i32(self.ssat_start);
        writer.write_u32(self.num_short_sectors);
        writer.write_i32(self.extra_msat_start);
        writer.write_u32(self.num_msat_sectors);
        for &entry in &self.msat {
            writer.write_i32(entry);
        }
        debug_assert_eq!(writer.len(), HEADER_SIZE);
        writer.into_vec()
    }

    /// Parse a header, verifying the signature and byte-order mark.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CompoundError::NotCompoundDocument);
        }

        let mut reader = BinaryReader::new(bytes);
        if reader.read_bytes(8)? != MAGIC {
            return Err(CompoundError::NotCompoundDocument);
        }

        let mut header = Header::new();
        header.clsid.copy_from_slice(reader.read_bytes(16)?);
        header.minor_version = reader.read_u16()?;
        header.major_version = reader.read_u16()?;
        if reader.read_bytes(2)? != BYTE_ORDER_MARK {
            return Err(CompoundError::NotCompoundDocument);
        }
        header.sector_size_power = reader.read_u16()?;
        header.short_sector_size_power = reader.read_u16()?;
        // Powers above 15 cannot come from a real writer and would overflow
        // sector arithmetic.
        if header.sector_size_power > 15 || header.short_sector_size_power > 15 {
            return Err(CompoundError::NotCompoundDocument);
        }
        header.reserved.copy_from_slice(reader.read_bytes(6)?);
        header.num_directory_sectors = reader.read_u32()?;
        header.num_sat_sectors = reader.read_u32()?;
        header.directory_start = reader.read_i32()?;
        header.transaction_signature = reader.read_u32()?;
        header.min_standard_stream_size = reader.read_u32()?;
        header.ssat_start = reader.read_i32()?;
        header.num_short_sectors = reader.read_u32()?;
        header.extra_msat_start = reader.read_i32()?;
        header.num_msat_sectors = reader.read_u32()?;
        for entry in header.msat.iter_mut() {
            *entry = reader.read_i32()?;
        }

        Ok(header)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
