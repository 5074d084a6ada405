//! Write-then-reopen round trips through the public API

use compound_rs::{CompoundDocument, EntryType};
use std::io::{Cursor, Read, Write};

fn write_streams(pairs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut doc = CompoundDocument::create(Cursor::new(Vec::new())).unwrap();
    for (path, data) in pairs {
        let mut stream = doc.open_write_stream(path).unwrap();
        stream.write_all(data).unwrap();
        stream.close().unwrap();
    }
    doc.into_inner().into_inner()
}

fn read_back(image: Vec<u8>, path: &str) -> Vec<u8> {
    let mut doc = CompoundDocument::open(Cursor::new(image)).unwrap();
    let mut data = Vec::new();
    doc.open_read_stream(path)
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    data
}

fn read_i32(image: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(image[offset..offset + 4].try_into().unwrap())
}

#[test]
fn test_short_stream_round_trip() {
    let image = write_streams(&[("/EncryptedPackage", vec![0xAB; 65])]);

    // 65 < 4096, so the payload went through the short-sector path
    assert!(read_i32(&image, 60) >= 0, "SSAT chain must exist");
    assert!(read_i32(&image, 64) >= 1, "at least one SSAT sector");

    let mut doc = CompoundDocument::open(Cursor::new(image)).unwrap();
    assert!(doc.contains("/EncryptedPackage", EntryType::UserStream));

    let mut data = Vec::new();
    doc.open_read_stream("/EncryptedPackage")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    assert_eq!(data, vec![0xAB; 65]);
}

#[test]
fn test_big_stream_round_trip() {
    let payload: Vec<u8> = (0..8192u32).map(|i| (i % 255 + 1) as u8).collect();
    let image = write_streams(&[("/Big", payload.clone())]);

    assert_eq!(read_back(image, "/Big"), payload);
}

#[test]
fn test_many_streams_round_trip_identity() {
    let pairs: Vec<(&str, Vec<u8>)> = vec![
        ("/EncryptedPackage", vec![0xAB; 65]),
        ("/EncryptionInfo", (0u8..200).collect()),
        ("/Big", vec![0x01; 8192]),
        ("/S1/data", b"nested payload".to_vec()),
        ("/S1/deep/leaf", vec![0xEE; 5000]),
        ("/empty", Vec::new()),
    ];
    let image = write_streams(&pairs);

    let mut doc = CompoundDocument::open(Cursor::new(image)).unwrap();
    for (path, expected) in &pairs {
        assert!(
            doc.contains(path, EntryType::UserStream),
            "missing {}",
            path
        );
        let mut data = Vec::new();
        doc.open_read_stream(path)
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(&data, expected, "payload mismatch at {}", path);
    }
}

#[test]
fn test_threshold_boundary_sizes() {
    // one byte under, exactly at, and one byte over the 4096 threshold
    for size in [4095usize, 4096, 4097] {
        let payload = vec![0xC3u8; size];
        let image = write_streams(&[("/edge", payload.clone())]);
        assert_eq!(read_back(image, "/edge"), payload, "size {}", size);
    }
}

#[test]
fn test_sector_boundary_sizes() {
    for size in [63usize, 64, 65, 511, 512, 513, 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
        let image = write_streams(&[("/edge", payload.clone())]);
        assert_eq!(read_back(image, "/edge"), payload, "size {}", size);
    }
}

#[test]
fn test_rewritten_stream_reads_latest_payload() {
    let mut doc = CompoundDocument::create(Cursor::new(Vec::new())).unwrap();
    for payload in [vec![1u8; 100], vec![2u8; 6000], vec![3u8; 50]] {
        let mut stream = doc.open_write_stream("/versioned").unwrap();
        stream.write_all(&payload).unwrap();
        stream.close().unwrap();
    }
    let image = doc.into_inner().into_inner();

    assert_eq!(read_back(image, "/versioned"), vec![3u8; 50]);
}

#[test]
fn test_file_backed_round_trip() {
    let mut file = tempfile::tempfile().unwrap();

    {
        let mut doc = CompoundDocument::create(file).unwrap();
        let mut stream = doc.open_write_stream("/on-disk").unwrap();
        stream.write_all(b"persisted through a real file").unwrap();
        stream.close().unwrap();
        file = doc.into_inner();
    }

    let mut doc = CompoundDocument::open(file).unwrap();
    let mut data = Vec::new();
    doc.open_read_stream("/on-disk")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    assert_eq!(data, b"persisted through a real file");
}
