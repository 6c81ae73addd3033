//! On-disk archive format tests
//!
//! Reads archive files byte by byte, without the archive reader, to pin the
//! layout other tools depend on.

use std::path::Path;
use tempfile::TempDir;
use tsvault::{
    create_backup, ArchiveKey, ArchivePaths, BackupConfig, BackupOptions, ContainerType,
    KeyValue, MemoryKvStore, MemoryObjectStore, ObjectKey,
};
use tsvault_durability::{FrameHeader, FRAME_HEADER_SIZE, FRAME_SENTINEL};

/// Every frame header in a file, in order.
fn headers(path: &Path) -> Vec<FrameHeader> {
    let bytes = std::fs::read(path).unwrap();
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&bytes[offset..offset + FRAME_HEADER_SIZE]);
        assert_eq!(raw[..4], FRAME_SENTINEL);
        let header = FrameHeader::from_bytes(&raw).unwrap();
        offset += FRAME_HEADER_SIZE + header.ciphertext_len as usize;
        out.push(header);
    }
    assert_eq!(offset, bytes.len(), "trailing bytes in {}", path.display());
    out
}

fn counter(header: &FrameHeader) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&header.nonce[8..]);
    u64::from_be_bytes(raw)
}

#[test]
fn test_frames_and_nonces_on_disk() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("backup.dir");
    let objects = MemoryObjectStore::with_pools(["p1"]);
    for i in 0..3 {
        objects
            .put_object(
                &ObjectKey::new("p1", "", format!("o{}", i)),
                b"payload",
                &[KeyValue::new("x", b"y".to_vec())],
                &[],
            )
            .unwrap();
    }
    let kv = MemoryKvStore::with_rows([("/a", b"1".to_vec())]);
    let key = ArchiveKey::derive_with_rounds("pw", 8);
    create_backup(
        &key,
        &BackupOptions::new(&dir)
            .with_object_store(&objects)
            .with_kv_store(&kv)
            .with_config(BackupConfig::for_testing()),
    )
    .unwrap();

    let paths = ArchivePaths::from_root(&dir);
    assert!(dir.join("ARCHIVE00000.bin").exists());
    assert!(dir.join("METADATA.bin").exists());
    assert!(!paths.data_file(1).exists());
    assert_eq!(std::fs::read_to_string(dir.join("pools.txt")).unwrap(), "p1\n");

    let data = headers(&paths.data_file(0));
    let types: Vec<u32> = data.iter().map(|h| h.frame_type).collect();
    assert_eq!(
        types,
        vec![
            ContainerType::CephObject.code(),
            ContainerType::CephObject.code(),
            ContainerType::CephObject.code(),
            ContainerType::EtcdRecords.code(),
        ]
    );

    let meta = headers(&paths.metadata());
    assert_eq!(meta.len(), 1);
    assert_eq!(meta[0].frame_type, ContainerType::BackupMetadata.code());

    // One random prefix per run, counter starting at 1 and never reused.
    let all: Vec<&FrameHeader> = data.iter().chain(meta.iter()).collect();
    let prefix = &all[0].nonce[..8];
    for (i, header) in all.iter().enumerate() {
        assert_eq!(&header.nonce[..8], prefix);
        assert_eq!(counter(header), i as u64 + 1);
    }
}

#[test]
fn test_type_codes() {
    assert_eq!(ContainerType::EtcdRecords.code(), 10);
    assert_eq!(ContainerType::CephObject.code(), 20);
    assert_eq!(ContainerType::BackupMetadata.code(), 30);
}
