//! Archive corruption detection tests
//!
//! These tests damage archives on disk and check that reading fails loudly:
//! - Any single-bit flip in a frame (header or body) is detected
//! - Truncated data files are reported, not silently shortened
//! - A wrong passphrase fails authentication
//! - Damage in a later data file is detected after earlier files replay
//! - Missing data files disagree with the manifest and fail the read

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tsvault_core::{BackupMetadata, CephObject, Container, EtcdRecords, Error, KeyValue};
use tsvault_durability::{ArchiveKey, FrameCodec, ShardConfig, ShardReader, ShardWriter};

fn key() -> ArchiveKey {
    ArchiveKey::derive_with_rounds("corruption", 8)
}

fn object(i: usize) -> Container {
    Container::CephObject(CephObject {
        pool: "p1".into(),
        namespace: "ns".into(),
        name: format!("obj{}", i),
        content: format!("content of object {}", i).into_bytes(),
        xattrs: vec![KeyValue::new("a", b"b".to_vec())],
        ..Default::default()
    })
}

fn write_archive(dir: &Path, containers: &[Container], max_file_size: u64) -> u32 {
    let config = ShardConfig::new().with_max_file_size(max_file_size);
    let mut writer = ShardWriter::new(dir, FrameCodec::new(&key()), config).unwrap();
    for container in containers {
        writer.write(container).unwrap();
    }
    let meta = BackupMetadata::from_timestamps(writer.file_count(), Vec::new());
    writer.write_meta(&Container::BackupMetadata(meta)).unwrap();
    writer.finish().unwrap().file_count
}

fn read_archive(dir: &Path, key: &ArchiveKey) -> Result<Vec<Container>, Error> {
    ShardReader::open(dir, FrameCodec::new(key))?.collect()
}

#[test]
fn test_every_bit_flip_in_single_frame_detected() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write_archive(dir, &[object(0)], 1024 * 1024);

    let path = dir.join("ARCHIVE00000.bin");
    let original = fs::read(&path).unwrap();
    assert_eq!(read_archive(dir, &key()).unwrap().len(), 1);

    for byte in 0..original.len() {
        for bit in 0..8 {
            let mut corrupted = original.clone();
            corrupted[byte] ^= 1 << bit;
            fs::write(&path, &corrupted).unwrap();

            let err = read_archive(dir, &key())
                .expect_err(&format!("flip at byte {} bit {} went undetected", byte, bit));
            assert!(
                err.is_integrity(),
                "flip at byte {} bit {} gave non-integrity error {:?}",
                byte,
                bit,
                err
            );
        }
    }
}

#[test]
fn test_truncated_data_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write_archive(dir, &[object(0), object(1)], 1024 * 1024);

    let path = dir.join("ARCHIVE00000.bin");
    let original = fs::read(&path).unwrap();
    // Both frames have the same length, so the midpoint is a frame boundary.
    let half = original.len() / 2;
    for cut in [1, 16, 31, half + 7, original.len() - 20, original.len() - 1] {
        fs::write(&path, &original[..cut]).unwrap();
        let err = read_archive(dir, &key()).unwrap_err();
        assert!(matches!(err, Error::Format(_)), "cut at {} gave {:?}", cut, err);
    }
}

#[test]
fn test_wrong_passphrase() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write_archive(dir, &[object(0)], 1024 * 1024);

    let err = read_archive(dir, &ArchiveKey::derive_with_rounds("not it", 8)).unwrap_err();
    assert!(matches!(err, Error::Authentication));
}

#[test]
fn test_damage_in_later_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let containers: Vec<Container> = (0..30).map(object).collect();
    let file_count = write_archive(dir, &containers, 1024);
    assert!(file_count >= 2);

    let path = dir.join("ARCHIVE00001.bin");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let mut reader = ShardReader::open(dir, FrameCodec::new(&key())).unwrap();
    let mut replayed = 0;
    let err = loop {
        match reader.next_container() {
            Ok(Some(_)) => replayed += 1,
            Ok(None) => panic!("damage went undetected"),
            Err(e) => break e,
        }
    };
    assert!(replayed > 0);
    assert!(matches!(err, Error::Authentication));
}

#[test]
fn test_missing_middle_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let containers: Vec<Container> = (0..30).map(object).collect();
    let file_count = write_archive(dir, &containers, 1024);
    assert!(file_count >= 3);

    fs::remove_file(dir.join("ARCHIVE00001.bin")).unwrap();
    let err = read_archive(dir, &key()).unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
}

#[test]
fn test_missing_last_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let containers: Vec<Container> = (0..30).map(object).collect();
    let file_count = write_archive(dir, &containers, 1024);
    assert!(file_count >= 2);

    fs::remove_file(dir.join(format!("ARCHIVE{:05}.bin", file_count - 1))).unwrap();
    let err = read_archive(dir, &key()).unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
}

#[test]
fn test_missing_first_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write_archive(dir, &[object(0)], 1024 * 1024);

    fs::remove_file(dir.join("ARCHIVE00000.bin")).unwrap();
    let err = read_archive(dir, &key()).unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
}

#[test]
fn test_mixed_containers_survive() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let containers = vec![
        Container::EtcdRecords(EtcdRecords::new(vec![KeyValue::new("k", Vec::new())])),
        object(1),
        Container::EtcdRecords(EtcdRecords::default()),
    ];
    write_archive(dir, &containers, 1024 * 1024);
    assert_eq!(read_archive(dir, &key()).unwrap(), containers);
}
