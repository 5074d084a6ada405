//! Directory entries
//!
//! The directory is a stream of fixed 128-byte records, one per storage or
//! stream node. `prev`/`next`/`child` double as the red-black tree links of
//! each storage's child tree (see [`crate::tree`]).

use crate::binary::{BinaryReader, BinaryWriter};
use crate::error::{CompoundError, Result};
use crate::sector::{SectorId, END_OF_CHAIN};
use std::char::{decode_utf16, REPLACEMENT_CHARACTER};

/// Signed 32-bit directory entry identifier; entry 0 is the root storage.
pub type DirectoryId = i32;

/// Absent directory link (`prev`/`next`/`child` with no target).
pub const NO_ENTRY: DirectoryId = -1;

/// On-disk size of one directory entry.
pub const ENTRY_SIZE: usize = 128;

/// Names hold at most 31 UTF-16 code units plus the terminator.
pub const MAX_NAME_UNITS: usize = 31;

/// Directory node kind.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryType {
    Empty = 0,
    UserStorage = 1,
    UserStream = 2,
    LockBytes = 3,
    Property = 4,
    RootStorage = 5,
}

impl EntryType {
    /// Parse an entry type byte. Unknown values are treated as `Empty` so a
    /// foreign image with vendor extensions still loads.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => EntryType::UserStorage,
            2 => EntryType::UserStream,
            3 => EntryType::LockBytes,
            4 => EntryType::Property,
            5 => EntryType::RootStorage,
            0 => EntryType::Empty,
            other => {
                tracing::warn!("unknown directory entry type {}, treating as empty", other);
                EntryType::Empty
            }
        }
    }
}

/// Node color for the red-black child tree.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryColor {
    Red = 0,
    Black = 1,
}

impl EntryColor {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => EntryColor::Red,
            _ => EntryColor::Black,
        }
    }
}

/// One 128-byte directory record.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub color: EntryColor,
    /// Left child in the parent storage's tree.
    pub prev: DirectoryId,
    /// Right child in the parent storage's tree.
    pub next: DirectoryId,
    /// Root of this storage's own child tree.
    pub child: DirectoryId,
    pub clsid: [u8; 16],
    pub state_bits: u32,
    pub created: u64,
    pub modified: u64,
    /// First sector of the stream chain; the mini-stream container for the
    /// root storage.
    pub start: SectorId,
    pub size: u64,
}

impl DirectoryEntry {
    /// An unused slot, the state every slot of a fresh directory sector has.
    pub fn empty() -> Self {
        DirectoryEntry {
            name: String::new(),
            entry_type: EntryType::Empty,
            color: EntryColor::Black,
            prev: NO_ENTRY,
            next: NO_ENTRY,
            child: NO_ENTRY,
            clsid: [0; 16],
            state_bits: 0,
            created: 0,
            modified: 0,
            start: END_OF_CHAIN,
            size: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry_type == EntryType::Empty
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self.entry_type,
            EntryType::UserStorage | EntryType::RootStorage
        )
    }

    /// Serialize into exactly [`ENTRY_SIZE`] bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let units: Vec<u16> = self.name.encode_utf16().collect();
        if units.len() > MAX_NAME_UNITS {
            return Err(CompoundError::InvalidName {
                name: self.name.clone(),
                reason: "name is longer than 31 UTF-16 code units",
            });
        }

        let mut writer = BinaryWriter::with_capacity(ENTRY_SIZE);
        for &unit in &units {
            writer.write_u16(unit);
        }
        // terminator plus zero padding out to the fixed 64-byte field
        for _ in units.len()..32 {
            writer.write_u16(0);
        }
        let name_length = if self.name.is_empty() {
            0
        } else {
            (units.len() as u16 + 1) * 2
        };
        writer.write_u16(name_length);
        writer.write_u8(self.entry_type as u8);
        writer.write_u8(self.color as u8);
        writer.write_i32(self.prev);
        writer.write_i32(self.next);
        writer.write_i32(self.child);
        writer.write_bytes(&self.clsid);
        writer.write_u32(self.state_bits);
        writer.write_u64(self.created);
        writer.write_u64(self.modified);
        writer.write_i32(self.start);
        writer.write_u64(self.size);
        debug_assert_eq!(writer.len(), ENTRY_SIZE);
        Ok(writer.into_vec())
    }

    /// Parse one 128-byte record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let mut units = [0u16; 32];
        for unit in units.iter_mut() {
            *unit = reader.read_u16()?;
        }
        let name_length = reader.read_u16()?;

        // name_length counts bytes including the terminator
        let name = if name_length >= 2 {
            let count = ((name_length / 2) as usize - 1).min(MAX_NAME_UNITS);
            decode_utf16(units[..count].iter().copied())
                .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
                .collect()
        } else {
            String::new()
        };

        let entry_type = EntryType::from_u8(reader.read_u8()?);
        let color = EntryColor::from_u8(reader.read_u8()?);
        let prev = reader.read_i32()?;
        let next = reader.read_i32()?;
        let child = reader.read_i32()?;
        let mut clsid = [0u8; 16];
        clsid.copy_from_slice(reader.read_bytes(16)?);
        let state_bits = reader.read_u32()?;
        let created = reader.read_u64()?;
        let modified = reader.read_u64()?;
        let start = reader.read_i32()?;
        let size = reader.read_u64()?;

        Ok(DirectoryEntry {
            name,
            entry_type,
            color,
            prev,
            next,
            child,
            clsid,
            state_bits,
            created,
            modified,
            start,
            size,
        })
    }
}

/// Check a single entry name: 1 to 31 UTF-16 code units, none of `/ \ : !`.
pub fn validate_name(name: &str) -> Result<()> {
    let units = name.encode_utf16().count();
    if units == 0 {
        return Err(CompoundError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if units > MAX_NAME_UNITS {
        return Err(CompoundError::InvalidName {
            name: name.to_string(),
            reason: "name is longer than 31 UTF-16 code units",
        });
    }
    if name.contains(['/', '\\', ':', '!']) {
        return Err(CompoundError::InvalidName {
            name: name.to_string(),
            reason: "name contains a forbidden character",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry_layout() {
        let bytes = DirectoryEntry::empty().encode().unwrap();
        assert_eq!(bytes.len(), ENTRY_SIZE);
        // name field and length are all zero
        assert!(bytes[..66].iter().all(|&b| b == 0));
        // prev/next/child are -1
        assert_eq!(&bytes[68..72], &[0xFF; 4]);
        assert_eq!(&bytes[72..76], &[0xFF; 4]);
        assert_eq!(&bytes[76..80], &[0xFF; 4]);
    }

    #[test]
    fn test_round_trip_user_stream() {
        let mut entry = DirectoryEntry::empty();
        entry.name = "EncryptedPackage".to_string();
        entry.entry_type = EntryType::UserStream;
        entry.color = EntryColor::Red;
        entry.prev = 3;
        entry.next = NO_ENTRY;
        entry.start = 17;
        entry.size = 65;
        entry.state_bits = 0x1234;
        entry.created = 42;

        let decoded = DirectoryEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded.name, "EncryptedPackage");
        assert_eq!(decoded.entry_type, EntryType::UserStream);
        assert_eq!(decoded.color, EntryColor::Red);
        assert_eq!(decoded.prev, 3);
        assert_eq!(decoded.next, NO_ENTRY);
        assert_eq!(decoded.start, 17);
        assert_eq!(decoded.size, 65);
        assert_eq!(decoded.state_bits, 0x1234);
        assert_eq!(decoded.created, 42);
    }

    #[test]
    fn test_name_length_counts_terminator() {
        let mut entry = DirectoryEntry::empty();
        entry.name = "Root Entry".to_string();
        entry.entry_type = EntryType::RootStorage;
        let bytes = entry.encode().unwrap();

        // "Root Entry" is 10 units; stored length is (10 + 1) * 2 bytes
        assert_eq!(u16::from_le_bytes([bytes[64], bytes[65]]), 22);
        // UTF-16LE 'R'
        assert_eq!(bytes[0], b'R');
        assert_eq!(bytes[1], 0);
    }

    #[test]
    fn test_non_ascii_name_round_trip() {
        let mut entry = DirectoryEntry::empty();
        entry.name = "données".to_string();
        entry.entry_type = EntryType::UserStream;
        let decoded = DirectoryEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded.name, "données");
    }

    #[test]
    fn test_validate_name_rules() {
        assert!(validate_name("EncryptedPackage").is_ok());
        assert!(validate_name("Root Entry").is_ok());
        assert!(validate_name(&"x".repeat(31)).is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(32)).is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("a:b").is_err());
        assert!(validate_name("a!b").is_err());
    }

    #[test]
    fn test_is_storage_covers_both_storage_kinds() {
        let mut entry = DirectoryEntry::empty();
        assert!(!entry.is_storage());
        entry.entry_type = EntryType::UserStorage;
        assert!(entry.is_storage());
        entry.entry_type = EntryType::RootStorage;
        assert!(entry.is_storage());
        entry.entry_type = EntryType::UserStream;
        assert!(!entry.is_storage());
    }

    #[test]
    fn test_unknown_type_reads_as_empty() {
        let mut bytes = DirectoryEntry::empty().encode().unwrap();
        bytes[66] = 9;
        let decoded = DirectoryEntry::decode(&bytes).unwrap();
        assert_eq!(decoded.entry_type, EntryType::Empty);
    }
}
