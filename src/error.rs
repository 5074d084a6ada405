use crate::directory::DirectoryId;
use crate::sector::SectorId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompoundError {
    #[error("not a compound document (bad signature or byte-order mark)")]
    NotCompoundDocument,

    #[error("corrupt sector chain starting at sector {start}: {reason}")]
    CorruptChain { start: SectorId, reason: &'static str },

    #[error("no entry at {path}")]
    NotFound { path: String },

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("directory id {0} is out of bounds")]
    InvalidDirectoryId(DirectoryId),

    #[error("read of {len} bytes at offset {offset} is beyond the end of the image")]
    OutOfRange { offset: u64, len: usize },

    #[error("master sector allocation table is full (109 SAT sectors)")]
    MasterTableFull,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CompoundError>;
