//! On-disk format checks against raw image bytes
//!
//! These tests go behind the public API and assert the exact byte layout a
//! fresh container must have, plus rejection of images that are not
//! compound documents at all.

use compound_rs::{CompoundDocument, CompoundError};
use std::io::{Cursor, Write};

const MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const END_OF_CHAIN: i32 = -2;
const SAT_SECTOR: i32 = -3;

fn read_i32(image: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(image[offset..offset + 4].try_into().unwrap())
}

fn read_u16(image: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(image[offset..offset + 2].try_into().unwrap())
}

fn fresh_image() -> Vec<u8> {
    let doc = CompoundDocument::create(Cursor::new(Vec::new())).unwrap();
    doc.into_inner().into_inner()
}

#[test]
fn test_header_constants() {
    let image = fresh_image();
    assert_eq!(&image[..8], &MAGIC);
    assert_eq!(&image[28..30], &[0xFE, 0xFF]); // byte-order mark
    assert_eq!(read_u16(&image, 30), 9); // sector size power
    assert_eq!(read_u16(&image, 32), 6); // short sector size power
    assert_eq!(read_i32(&image, 56), 4096); // standard-stream threshold
}

#[test]
fn test_empty_document_layout() {
    let image = fresh_image();

    // one SAT slab recorded in the header
    let num_sat_sectors = read_i32(&image, 44);
    assert_eq!(num_sat_sectors, 1);
    let sat_sector = read_i32(&image, 76); // MSAT[0]
    assert_eq!(sat_sector, 0);

    // the slab marks itself SAT_SECTOR and the directory sector follows
    let slab_offset = 512 + sat_sector as usize * 512;
    assert_eq!(read_i32(&image, slab_offset), SAT_SECTOR);

    let directory_start = read_i32(&image, 48);
    assert_eq!(directory_start, 1);
    assert_eq!(
        read_i32(&image, slab_offset + directory_start as usize * 4),
        END_OF_CHAIN
    );

    // exactly one directory sector: four 128-byte entries
    let dir_offset = 512 + directory_start as usize * 512;
    assert_eq!(image.len(), dir_offset + 512);

    // entry 0 is the root storage named "Root Entry"
    assert_eq!(image[dir_offset + 66], 5);
    assert_eq!(read_u16(&image, dir_offset + 64), 22); // name length in bytes
    assert_eq!(image[dir_offset], b'R');
    assert_eq!(image[dir_offset + 1], 0);

    // the remaining three entries are empty
    for index in 1..4 {
        assert_eq!(image[dir_offset + index * 128 + 66], 0);
    }
}

#[test]
fn test_sat_self_reference_for_all_msat_entries() {
    let mut doc = CompoundDocument::create(Cursor::new(Vec::new())).unwrap();
    let mut stream = doc.open_write_stream("/filler").unwrap();
    stream.write_all(&vec![0x55u8; 80_000]).unwrap();
    stream.close().unwrap();
    let image = doc.into_inner().into_inner();

    let num_sat_sectors = read_i32(&image, 44);
    assert!(num_sat_sectors >= 2, "80 KiB must spill into a second slab");

    for index in 0..num_sat_sectors as usize {
        let sat_sector = read_i32(&image, 76 + index * 4);
        assert!(sat_sector >= 0);
        // locate the slab that covers this sector id and check its slot
        let covering_slab = read_i32(&image, 76 + (sat_sector as usize / 128) * 4);
        let slot = 512 + covering_slab as usize * 512 + (sat_sector as usize % 128) * 4;
        assert_eq!(read_i32(&image, slot), SAT_SECTOR);
    }
}

#[test]
fn test_zero_buffer_is_rejected() {
    let result = CompoundDocument::open(Cursor::new(vec![0u8; 1024]));
    assert!(matches!(result, Err(CompoundError::NotCompoundDocument)));
}

#[test]
fn test_truncated_buffer_is_rejected() {
    let result = CompoundDocument::open(Cursor::new(vec![0u8; 100]));
    assert!(matches!(result, Err(CompoundError::NotCompoundDocument)));
}

#[test]
fn test_corrupted_magic_is_rejected() {
    let mut image = fresh_image();
    image[0] = b'X';
    let result = CompoundDocument::open(Cursor::new(image));
    assert!(matches!(result, Err(CompoundError::NotCompoundDocument)));
}

#[test]
fn test_directory_chain_cycle_is_rejected() {
    let mut image = fresh_image();
    // point the directory sector's SAT slot back at itself
    let directory_start = read_i32(&image, 48) as usize;
    let slot = 512 + directory_start * 4;
    image[slot..slot + 4].copy_from_slice(&(directory_start as i32).to_le_bytes());

    let result = CompoundDocument::open(Cursor::new(image));
    assert!(matches!(result, Err(CompoundError::CorruptChain { .. })));
}
