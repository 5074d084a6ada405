//! Compound document facade
//!
//! Owns the byte image and every in-memory structure decoded from it: the
//! header, the master SAT, both allocation tables, the directory array and
//! the transient parent maps. All mutations go through here so that the five
//! interdependent persistent structures stay consistent.

use crate::directory::{self, DirectoryEntry, DirectoryId, EntryType, ENTRY_SIZE, NO_ENTRY};
use crate::error::{CompoundError, Result};
use crate::header::{Header, HEADER_SIZE, MSAT_INLINE_ENTRIES};
use crate::io::ByteImage;
use crate::sector::{self, AllocTable, SectorId, END_OF_CHAIN, SAT_SECTOR};
use crate::stream::{ReadStream, WriteStream};
use crate::tree::{self, TreeMut};
use std::collections::HashMap;

/// A compound document over one exclusively-owned byte image.
pub struct CompoundDocument<I: ByteImage> {
    image: I,
    header: Header,
    /// Sector ids of every SAT slab, in slab order.
    msat: Vec<SectorId>,
    sat: AllocTable,
    ssat: AllocTable,
    entries: Vec<DirectoryEntry>,
    /// Transient tree parents, rebuilt on load; not part of the format.
    parent: HashMap<DirectoryId, DirectoryId>,
    /// Enclosing storage of each live entry.
    parent_storage: HashMap<DirectoryId, DirectoryId>,
}

impl<I: ByteImage> CompoundDocument<I> {
    /// Start a fresh container on `image`: a default V3 header followed by
    /// the root storage entry.
    pub fn create(image: I) -> Result<Self> {
        let mut doc = CompoundDocument {
            image,
            header: Header::new(),
            msat: Vec::new(),
            sat: AllocTable::new(),
            ssat: AllocTable::new(),
            entries: Vec::new(),
            parent: HashMap::new(),
            parent_storage: HashMap::new(),
        };
        doc.write_header()?;
        doc.insert_entry("Root Entry", EntryType::RootStorage, 0)?;
        Ok(doc)
    }

    /// Parse an existing container from `image`.
    pub fn open(image: I) -> Result<Self> {
        let mut doc = CompoundDocument {
            image,
            header: Header::new(),
            msat: Vec::new(),
            sat: AllocTable::new(),
            ssat: AllocTable::new(),
            entries: Vec::new(),
            parent: HashMap::new(),
            parent_storage: HashMap::new(),
        };

        let mut header_bytes = vec![0u8; HEADER_SIZE];
        match doc.image.read_at(0, &mut header_bytes) {
            Err(CompoundError::OutOfRange { .. }) => {
                return Err(CompoundError::NotCompoundDocument)
            }
            other => other?,
        }
        doc.header = Header::decode(&header_bytes)?;

        doc.read_msat()?;
        doc.read_sat()?;
        doc.read_ssat()?;
        doc.read_directory()?;

        tracing::debug!(
            sectors = doc.sat.len(),
            entries = doc.entries.len(),
            "opened compound document"
        );
        Ok(doc)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Release the underlying byte image.
    pub fn into_inner(self) -> I {
        self.image
    }

    /// Whether `path` resolves to a live entry of the given kind.
    pub fn contains(&self, path: &str, kind: EntryType) -> bool {
        matches!(
            self.try_resolve(path),
            Ok(Some(id)) if self.entries[id as usize].entry_type == kind
        )
    }

    /// Every live entry below the root as `(absolute path, kind)`, storages
    /// included, in-order within each storage.
    pub fn list(&self) -> impl Iterator<Item = (String, EntryType)> {
        let mut result = Vec::new();
        let mut stack: Vec<(DirectoryId, String)> = vec![(0, String::new())];

        while let Some((storage_id, prefix)) = stack.pop() {
            for child in tree::in_order(&self.entries, storage_id) {
                let entry = &self.entries[child as usize];
                let path = format!("{}/{}", prefix, entry.name);
                if entry.entry_type == EntryType::UserStorage {
                    stack.push((child, path.clone()));
                }
                result.push((path, entry.entry_type));
            }
        }

        result.into_iter()
    }

    /// Open the user stream at `path` for reading.
    ///
    /// The stream is `Read + Seek` over `[0, size)` and borrows the document
    /// for its whole lifetime.
    pub fn open_read_stream(&mut self, path: &str) -> Result<ReadStream<'_, I>> {
        let id = self.try_resolve(path)?.ok_or_else(|| CompoundError::NotFound {
            path: path.to_string(),
        })?;
        let entry = &self.entries[id as usize];
        if entry.entry_type != EntryType::UserStream {
            return Err(CompoundError::NotFound {
                path: path.to_string(),
            });
        }

        let size = entry.size;
        let start = entry.start;
        let short = size < u64::from(self.header.min_standard_stream_size);
        let chain = if short {
            self.ssat.follow(start)?
        } else {
            self.sat.follow(start)?
        };

        let unit = if short {
            self.header.short_sector_size()
        } else {
            self.header.sector_size()
        } as u64;
        if (chain.len() as u64) < (size + unit - 1) / unit {
            return Err(CompoundError::CorruptChain {
                start,
                reason: "stream chain is shorter than the stream size",
            });
        }

        Ok(ReadStream::new(self, chain, short, size))
    }

    /// Open the user stream at `path` for writing, creating it (and any
    /// missing intermediate storages) if necessary.
    ///
    /// The returned sink buffers everything written to it; the payload is
    /// laid out into sectors when the stream is closed or dropped.
    pub fn open_write_stream(&mut self, path: &str) -> Result<WriteStream<'_, I>> {
        let (parent, name) = self.resolve_parent_storage(path)?;
        let entry_id = match tree::lookup(&self.entries, parent, &name) {
            Some(id) => {
                if self.entries[id as usize].entry_type != EntryType::UserStream {
                    return Err(CompoundError::InvalidName {
                        name: path.to_string(),
                        reason: "an entry with this name exists and is not a stream",
                    });
                }
                id
            }
            None => self.insert_entry(&name, EntryType::UserStream, parent)?,
        };
        Ok(WriteStream::new(self, entry_id))
    }

    /// Insert the storage at `path`, creating missing intermediates. A
    /// storage that already exists is left untouched.
    pub fn create_storage(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent_storage(path)?;
        match tree::lookup(&self.entries, parent, &name) {
            Some(id) if self.entries[id as usize].entry_type == EntryType::UserStorage => Ok(()),
            Some(_) => Err(CompoundError::InvalidName {
                name: path.to_string(),
                reason: "an entry with this name exists and is not a storage",
            }),
            None => {
                self.insert_entry(&name, EntryType::UserStorage, parent)?;
                Ok(())
            }
        }
    }

    // ---- geometry -------------------------------------------------------

    pub(crate) fn sector_size(&self) -> usize {
        self.header.sector_size()
    }

    pub(crate) fn short_sector_size(&self) -> usize {
        self.header.short_sector_size()
    }

    /// Sector data starts immediately after the 512-byte header. Marker ids
    /// coming from a corrupt table are not addressable.
    fn sector_offset(&self, id: SectorId) -> Result<u64> {
        if id < 0 {
            return Err(CompoundError::CorruptChain {
                start: id,
                reason: "sector id is not addressable",
            });
        }
        Ok(HEADER_SIZE as u64 + id as u64 * self.sector_size() as u64)
    }

    // ---- raw sector I/O -------------------------------------------------

    pub(crate) fn read_sector(&mut self, id: SectorId) -> Result<Vec<u8>> {
        let offset = self.sector_offset(id)?;
        let mut buf = vec![0u8; self.sector_size()];
        self.image.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Write one sector's worth, zero-filling past `data`.
    fn write_sector(&mut self, id: SectorId, data: &[u8]) -> Result<()> {
        let size = self.sector_size();
        debug_assert!(data.len() <= size);
        let mut buf = vec![0u8; size];
        buf[..data.len()].copy_from_slice(data);
        let offset = self.sector_offset(id)?;
        self.image.write_at(offset, &buf)
    }

    /// Absolute offset of a short sector inside the mini-stream container.
    fn short_sector_location(&self, id: SectorId) -> Result<u64> {
        let ratio = self.sector_size() / self.short_sector_size();
        let container_start = self.entries[0].start;
        let container = self.sat.follow(container_start)?;
        let big = container
            .get(id as usize / ratio)
            .copied()
            .ok_or(CompoundError::CorruptChain {
                start: container_start,
                reason: "mini-stream container is shorter than the short sector index",
            })?;
        Ok(self.sector_offset(big)? + (id as usize % ratio * self.short_sector_size()) as u64)
    }

    pub(crate) fn read_short_sector(&mut self, id: SectorId) -> Result<Vec<u8>> {
        let offset = self.short_sector_location(id)?;
        let mut buf = vec![0u8; self.short_sector_size()];
        self.image.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    fn write_short_sector(&mut self, id: SectorId, data: &[u8]) -> Result<()> {
        let size = self.short_sector_size();
        debug_assert!(data.len() <= size);
        let mut buf = vec![0u8; size];
        buf[..data.len()].copy_from_slice(data);
        let offset = self.short_sector_location(id)?;
        self.image.write_at(offset, &buf)
    }

    // ---- table persistence ----------------------------------------------

    fn write_header(&mut self) -> Result<()> {
        let bytes = self.header.encode();
        self.image.write_at(0, &bytes)
    }

    /// Persist every SAT slab into the sector its MSAT entry names.
    fn write_sat(&mut self) -> Result<()> {
        let per_sector = self.sector_size() / 4;
        let msat = self.msat.clone();
        for (slab, sat_sector) in msat.into_iter().enumerate() {
            let bytes = sector::encode_table_slab(
                &self.sat.entries()[slab * per_sector..(slab + 1) * per_sector],
            );
            self.write_sector(sat_sector, &bytes)?;
        }
        Ok(())
    }

    /// Persist the SSAT by walking its chain through the SAT.
    fn write_ssat(&mut self) -> Result<()> {
        let per_sector = self.sector_size() / 4;
        let chain = self.sat.follow(self.header.ssat_start)?;
        for (slab, ssat_sector) in chain.into_iter().enumerate() {
            let bytes = sector::encode_table_slab(
                &self.ssat.entries()[slab * per_sector..(slab + 1) * per_sector],
            );
            self.write_sector(ssat_sector, &bytes)?;
        }
        Ok(())
    }

    // ---- allocation -----------------------------------------------------

    /// Claim one free big sector, growing the SAT by a slab if none is left.
    /// The sector is marked `END_OF_CHAIN` and zero-filled on disk.
    fn allocate_sector(&mut self) -> Result<SectorId> {
        let per_sector = self.sector_size() / 4;

        if self.sat.first_free().is_none() {
            let slab = self.msat.len();
            if slab >= MSAT_INLINE_ENTRIES {
                return Err(CompoundError::MasterTableFull);
            }
            // the new slab covers ids starting at the current table length,
            // and the first of those holds the slab itself
            let sat_sector = self.sat.len() as SectorId;
            tracing::debug!(slab, sector = sat_sector, "extending sector allocation table");
            self.msat.push(sat_sector);
            self.header.msat[slab] = sat_sector;
            self.header.num_sat_sectors = self.msat.len() as u32;
            self.sat.extend_free(per_sector);
            self.sat.set(sat_sector, SAT_SECTOR);
            let bytes = sector::encode_table_slab(
                &self.sat.entries()[slab * per_sector..(slab + 1) * per_sector],
            );
            self.write_sector(sat_sector, &bytes)?;
            self.write_header()?;
        }

        let next_free = match self.sat.first_free() {
            Some(id) => id,
            None => return Err(CompoundError::MasterTableFull),
        };
        self.sat.set(next_free, END_OF_CHAIN);
        self.write_sat()?;
        self.write_sector(next_free, &[])?;
        Ok(next_free)
    }

    /// Allocate `count` big sectors linked into one chain, in order.
    fn allocate_sectors(&mut self, count: usize) -> Result<Vec<SectorId>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut chain = Vec::with_capacity(count);
        let mut current = self.allocate_sector()?;
        for _ in 1..count {
            chain.push(current);
            let next = self.allocate_sector()?;
            self.sat.set(current, next);
            current = next;
        }
        chain.push(current);
        self.write_sat()?;
        Ok(chain)
    }

    /// Claim one free short sector, growing the SSAT and the mini-stream
    /// container as needed.
    fn allocate_short_sector(&mut self) -> Result<SectorId> {
        let per_sector = self.sector_size() / 4;

        if self.ssat.first_free().is_none() {
            let slab_sector = self.allocate_sector()?;
            tracing::debug!(sector = slab_sector, "extending short-sector allocation table");
            self.header.num_short_sectors += 1;
            if self.header.ssat_start < 0 {
                self.header.ssat_start = slab_sector;
            } else {
                let chain = self.sat.follow(self.header.ssat_start)?;
                self.sat.set(chain[chain.len() - 1], slab_sector);
                self.write_sat()?;
            }
            self.write_header()?;

            let old_len = self.ssat.len();
            self.ssat.extend_free(per_sector);
            let bytes = sector::encode_table_slab(&self.ssat.entries()[old_len..]);
            self.write_sector(slab_sector, &bytes)?;
        }

        let next_free = match self.ssat.first_free() {
            Some(id) => id,
            None => return Err(CompoundError::MasterTableFull),
        };
        self.ssat.set(next_free, END_OF_CHAIN);
        self.write_ssat()?;

        self.ensure_container_capacity(next_free)?;
        Ok(next_free)
    }

    /// Allocate `count` short sectors linked into one chain, in order.
    fn allocate_short_sectors(&mut self, count: usize) -> Result<Vec<SectorId>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut chain = Vec::with_capacity(count);
        let mut current = self.allocate_short_sector()?;
        for _ in 1..count {
            chain.push(current);
            let next = self.allocate_short_sector()?;
            self.ssat.set(current, next);
            current = next;
        }
        chain.push(current);
        self.write_ssat()?;
        Ok(chain)
    }

    /// Grow the mini-stream container (the root entry's chain) until it
    /// covers `short_id`, and keep the root's size field in step.
    fn ensure_container_capacity(&mut self, short_id: SectorId) -> Result<()> {
        let ratio = self.sector_size() / self.short_sector_size();
        let required = short_id as usize / ratio + 1;

        if self.entries[0].start < 0 {
            let first = self.allocate_sector()?;
            tracing::debug!(sector = first, "allocated mini-stream container");
            self.entries[0].start = first;
        }

        let mut chain = self.sat.follow(self.entries[0].start)?;
        let mut grew = false;
        while required > chain.len() {
            let next = self.allocate_sector()?;
            self.sat.set(chain[chain.len() - 1], next);
            chain.push(next);
            grew = true;
        }
        if grew {
            self.write_sat()?;
        }

        self.entries[0].size = (chain.len() * self.sector_size()) as u64;
        self.write_entry(0)
    }

    // ---- directory store ------------------------------------------------

    /// First `Empty` slot, growing the directory by one sector of fresh
    /// empty entries when none is left.
    fn next_empty_entry(&mut self) -> Result<DirectoryId> {
        if let Some(position) = self.entries.iter().position(|e| e.is_empty()) {
            return Ok(position as DirectoryId);
        }

        let per_sector = self.sector_size() / ENTRY_SIZE;
        let new_sector = self.allocate_sector()?;
        if self.header.directory_start < 0 {
            self.header.directory_start = new_sector;
        } else {
            let chain = self.sat.follow(self.header.directory_start)?;
            self.sat.set(chain[chain.len() - 1], new_sector);
            self.write_sat()?;
        }
        self.write_header()?;
        tracing::debug!(sector = new_sector, entries = per_sector, "growing directory");

        let first = self.entries.len() as DirectoryId;
        for _ in 0..per_sector {
            self.entries.push(DirectoryEntry::empty());
        }
        for id in first..first + per_sector as DirectoryId {
            self.write_entry(id)?;
        }
        Ok(first)
    }

    /// Persist one directory entry in place.
    fn write_entry(&mut self, id: DirectoryId) -> Result<()> {
        let per_sector = self.sector_size() / ENTRY_SIZE;
        let chain = self.sat.follow(self.header.directory_start)?;
        let sector = chain
            .get(id as usize / per_sector)
            .copied()
            .ok_or(CompoundError::InvalidDirectoryId(id))?;
        let entry = self
            .entries
            .get(id as usize)
            .ok_or(CompoundError::InvalidDirectoryId(id))?;
        let bytes = entry.encode()?;
        let offset = self.sector_offset(sector)? + (id as usize % per_sector * ENTRY_SIZE) as u64;
        self.image.write_at(offset, &bytes)
    }

    /// Persist the whole directory. Insertion rebalancing can touch links
    /// and colors anywhere in the parent's tree, so everything is rewritten.
    fn write_directory(&mut self) -> Result<()> {
        for id in 0..self.entries.len() as DirectoryId {
            self.write_entry(id)?;
        }
        Ok(())
    }

    /// Claim an empty entry, name it, and link it into the child tree of
    /// `storage_id`.
    fn insert_entry(
        &mut self,
        name: &str,
        entry_type: EntryType,
        storage_id: DirectoryId,
    ) -> Result<DirectoryId> {
        directory::validate_name(name)?;

        let entry_id = self.next_empty_entry()?;
        {
            let entry = &mut self.entries[entry_id as usize];
            entry.name = name.to_string();
            entry.entry_type = entry_type;
        }
        TreeMut::new(&mut self.entries, &mut self.parent, &mut self.parent_storage)
            .insert(entry_id, storage_id);
        self.write_directory()?;
        Ok(entry_id)
    }

    // ---- write payload --------------------------------------------------

    /// Lay a buffered payload out into sectors and point the entry at it.
    /// Short sectors are used below the standard-stream threshold.
    pub(crate) fn write_user_stream(&mut self, entry_id: DirectoryId, data: &[u8]) -> Result<()> {
        let start = if data.is_empty() {
            END_OF_CHAIN
        } else if (data.len() as u64) < u64::from(self.header.min_standard_stream_size) {
            let unit = self.short_sector_size();
            let chain = self.allocate_short_sectors((data.len() + unit - 1) / unit)?;
            for (index, &id) in chain.iter().enumerate() {
                let end = ((index + 1) * unit).min(data.len());
                self.write_short_sector(id, &data[index * unit..end])?;
            }
            chain[0]
        } else {
            let unit = self.sector_size();
            let chain = self.allocate_sectors((data.len() + unit - 1) / unit)?;
            for (index, &id) in chain.iter().enumerate() {
                let end = ((index + 1) * unit).min(data.len());
                self.write_sector(id, &data[index * unit..end])?;
            }
            chain[0]
        };

        let entry = &mut self.entries[entry_id as usize];
        entry.start = start;
        entry.size = data.len() as u64;
        self.write_entry(entry_id)?;
        self.write_header()
    }

    // ---- path resolution ------------------------------------------------

    fn split_path<'p>(path: &'p str) -> Result<Vec<&'p str>> {
        let trimmed = path
            .strip_prefix('/')
            .ok_or_else(|| CompoundError::InvalidName {
                name: path.to_string(),
                reason: "paths are absolute and start with '/'",
            })?;
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(trimmed.split('/').collect())
    }

    /// Resolve an absolute path by walking each storage's child tree.
    fn try_resolve(&self, path: &str) -> Result<Option<DirectoryId>> {
        if path == "/" || path == "/Root Entry" {
            return Ok(Some(0));
        }

        let segments = Self::split_path(path)?;
        if segments.is_empty() {
            return Ok(Some(0));
        }

        let mut current: DirectoryId = 0;
        let (storages, name) = segments.split_at(segments.len() - 1);
        for segment in storages {
            match tree::lookup(&self.entries, current, segment) {
                Some(id) if self.entries[id as usize].is_storage() => current = id,
                _ => return Ok(None),
            }
        }
        Ok(tree::lookup(&self.entries, current, name[0]))
    }

    /// Resolve the parent storage of `path` for insertion, creating missing
    /// intermediate storages. Returns the storage id and the final segment.
    fn resolve_parent_storage(&mut self, path: &str) -> Result<(DirectoryId, String)> {
        let segments = Self::split_path(path)?;
        let Some((name, storages)) = segments.split_last() else {
            return Err(CompoundError::InvalidName {
                name: path.to_string(),
                reason: "path names the root storage",
            });
        };

        let mut current: DirectoryId = 0;
        for segment in storages {
            current = match tree::lookup(&self.entries, current, segment) {
                Some(id) => {
                    if !self.entries[id as usize].is_storage() {
                        return Err(CompoundError::InvalidName {
                            name: path.to_string(),
                            reason: "path traverses an entry that is not a storage",
                        });
                    }
                    id
                }
                None => self.insert_entry(segment, EntryType::UserStorage, current)?,
            };
        }
        Ok((current, name.to_string()))
    }

    // ---- load path ------------------------------------------------------

    /// Rebuild the master SAT: up to 109 inline entries, the rest through
    /// the DIFAT overflow chain (each overflow sector holds
    /// `sector_size/4 - 1` entries plus a trailing next-sector link).
    fn read_msat(&mut self) -> Result<()> {
        let total = self.header.num_sat_sectors as usize;
        self.msat.clear();
        for index in 0..total.min(MSAT_INLINE_ENTRIES) {
            self.msat.push(self.header.msat[index]);
        }

        if total > MSAT_INLINE_ENTRIES {
            let per_sector = self.sector_size() / 4 - 1;
            let mut difat = self.header.extra_msat_start;
            let mut hops = 0usize;
            while self.msat.len() < total {
                if difat < 0 {
                    return Err(CompoundError::CorruptChain {
                        start: self.header.extra_msat_start,
                        reason: "master table overflow chain ended early",
                    });
                }
                hops += 1;
                if hops > total / per_sector + 2 {
                    return Err(CompoundError::CorruptChain {
                        start: self.header.extra_msat_start,
                        reason: "master table overflow chain contains a cycle",
                    });
                }
                let bytes = self.read_sector(difat)?;
                let slab = sector::decode_table_slab(&bytes)?;
                for &entry in &slab[..per_sector] {
                    if self.msat.len() < total {
                        self.msat.push(entry);
                    }
                }
                difat = slab[per_sector];
            }
        }
        Ok(())
    }

    /// Concatenate the SAT slabs referenced by the MSAT.
    fn read_sat(&mut self) -> Result<()> {
        let msat = self.msat.clone();
        let mut entries = Vec::with_capacity(msat.len() * (self.sector_size() / 4));
        for sat_sector in msat {
            let bytes = self.read_sector(sat_sector)?;
            entries.extend(sector::decode_table_slab(&bytes)?);
        }
        self.sat = AllocTable::from_entries(entries);
        Ok(())
    }

    /// Concatenate the SSAT slabs by following its chain through the SAT.
    fn read_ssat(&mut self) -> Result<()> {
        let chain = self.sat.follow(self.header.ssat_start)?;
        let mut entries = Vec::with_capacity(chain.len() * (self.sector_size() / 4));
        for ssat_sector in chain {
            let bytes = self.read_sector(ssat_sector)?;
            entries.extend(sector::decode_table_slab(&bytes)?);
        }
        self.ssat = AllocTable::from_entries(entries);
        Ok(())
    }

    /// Deserialize every directory entry and rebuild the transient parent
    /// maps by walking each storage's tree with explicit stacks.
    fn read_directory(&mut self) -> Result<()> {
        let per_sector = self.sector_size() / ENTRY_SIZE;
        let chain = self.sat.follow(self.header.directory_start)?;

        self.entries.clear();
        for dir_sector in chain {
            let bytes = self.read_sector(dir_sector)?;
            for index in 0..per_sector {
                self.entries.push(DirectoryEntry::decode(
                    &bytes[index * ENTRY_SIZE..(index + 1) * ENTRY_SIZE],
                )?);
            }
        }

        if self
            .entries
            .first()
            .map_or(true, |e| e.entry_type != EntryType::RootStorage)
        {
            // a container without its root storage is not usable at all
            return Err(CompoundError::NotCompoundDocument);
        }

        self.rebuild_parents()
    }

    fn check_entry_id(&self, id: DirectoryId) -> Result<()> {
        if id as usize >= self.entries.len() {
            Err(CompoundError::InvalidDirectoryId(id))
        } else {
            Ok(())
        }
    }

    fn rebuild_parents(&mut self) -> Result<()> {
        self.parent.clear();
        self.parent_storage.clear();
        self.parent_storage.insert(0, 0);

        let mut storage_stack: Vec<DirectoryId> = vec![0];
        let mut visited = 0usize;

        while let Some(storage_id) = storage_stack.pop() {
            let root = self.entries[storage_id as usize].child;
            if root < 0 {
                continue;
            }
            self.check_entry_id(root)?;
            self.parent.insert(root, NO_ENTRY);

            let mut node_stack = vec![root];
            while let Some(id) = node_stack.pop() {
                visited += 1;
                if visited > self.entries.len() {
                    return Err(CompoundError::CorruptChain {
                        start: self.header.directory_start,
                        reason: "directory sibling links contain a cycle",
                    });
                }

                self.parent_storage.insert(id, storage_id);
                let entry = &self.entries[id as usize];
                if entry.entry_type == EntryType::UserStorage {
                    storage_stack.push(id);
                }

                let (left, right) = (entry.prev, entry.next);
                if left >= 0 {
                    self.check_entry_id(left)?;
                    self.parent.insert(left, id);
                    node_stack.push(left);
                }
                if right >= 0 {
                    self.check_entry_id(right)?;
                    self.parent.insert(right, id);
                    node_stack.push(right);
                }
            }
        }
        Ok(())
    }
}
