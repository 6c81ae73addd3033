//! End-to-end backup, restore, clear and inspect tests
//!
//! Every test backs up a store, then reads the archive back through the
//! public engine API and compares against the source.

use std::path::Path;
use tempfile::TempDir;
use tsvault_core::{
    Error, KeyValue, KvStore, LocalKvStore, LocalObjectStore, MemoryKvStore, MemoryObjectStore,
    ObjectKey, ObjectStore, PoolHandle,
};
use tsvault_durability::{read_metadata, ArchiveKey, ArchivePaths, FrameCodec, ShardConfig};
use tsvault_engine::{
    clear_stores, create_backup, inspect_archive, restore_backup, BackupConfig, BackupOptions,
    PoolMap, PoolSelection, RestoreOptions,
};

fn test_key() -> ArchiveKey {
    ArchiveKey::derive_with_rounds("correct horse", 16)
}

/// Deterministic incompressible bytes.
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

/// Source store: pool p1 with namespaced objects, large omaps and a few
/// objects big enough to force several data files.
fn populated_source() -> (MemoryObjectStore, Vec<ObjectKey>) {
    let store = MemoryObjectStore::with_pools(["p1", "p2"]);
    let mut keys = Vec::new();
    for i in 0..20u64 {
        let ns = if i % 3 == 0 { "" } else { "tenant" };
        let key = ObjectKey::new("p1", ns, format!("obj-{}", i));
        let content = if i % 7 == 0 {
            noise(i, 40 * 1024)
        } else {
            format!("content {}", i).into_bytes()
        };
        let xattrs = vec![KeyValue::new("owner", format!("u{}", i).into_bytes())];
        let omap: Vec<KeyValue> = (0..i % 8)
            .map(|j| KeyValue::new(format!("m{:02}", j), vec![j as u8; 3]))
            .collect();
        store.put_object(&key, &content, &xattrs, &omap).unwrap();
        keys.push(key);
    }
    (store, keys)
}

fn populated_kv(rows: usize) -> MemoryKvStore {
    MemoryKvStore::with_rows((0..rows).map(|i| (format!("/registry/item{:03}", i), noise(i as u64, 8))))
}

fn archive_dir(tmp: &TempDir, name: &str) -> std::path::PathBuf {
    tmp.path().join(name)
}

fn backup(
    dir: &Path,
    store: &MemoryObjectStore,
    kv: Option<&MemoryKvStore>,
    pools: PoolSelection,
) -> tsvault_engine::BackupReport {
    let mut options = BackupOptions::new(dir)
        .with_object_store(store)
        .with_pools(pools)
        .with_config(BackupConfig::for_testing());
    if let Some(kv) = kv {
        options = options.with_kv_store(kv);
    }
    create_backup(&test_key(), &options).unwrap()
}

#[test]
fn test_backup_restore_into_other_pool() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "full");
    let (source, keys) = populated_source();
    let kv = populated_kv(11);

    let report = backup(&dir, &source, Some(&kv), PoolSelection::only(["p1"]));
    assert_eq!(report.pools, vec!["p1"]);
    assert_eq!(report.objects_written, 20);
    assert_eq!(report.kv_rows, 11);
    assert_eq!(report.kv_batches, 3);
    assert!(report.file_count > 1, "expected rollover, got {:?}", report);

    let paths = ArchivePaths::from_root(&dir);
    assert_eq!(
        std::fs::read_to_string(paths.pool_list()).unwrap(),
        "p1\n"
    );
    let files = paths.list_data_files().unwrap();
    assert_eq!(files, (0..report.file_count).collect::<Vec<_>>());

    let target = MemoryObjectStore::with_pools(["p2"]);
    let target_kv = MemoryKvStore::new();
    let restored = restore_backup(
        &test_key(),
        &RestoreOptions::new(&dir)
            .with_object_store(&target)
            .with_kv_store(&target_kv)
            .with_pool_map(PoolMap::parse(&["p1:p2"]).unwrap()),
    )
    .unwrap();
    assert_eq!(restored.objects_restored, 20);
    assert_eq!(restored.objects_skipped, 0);
    assert_eq!(restored.kv_rows_restored, 11);

    for key in &keys {
        let original = source.object(key).unwrap();
        let copy = target
            .object(&ObjectKey::new("p2", &key.namespace, &key.name))
            .unwrap();
        assert_eq!(copy.content, original.content, "{}", key);
        assert_eq!(copy.xattrs, original.xattrs, "{}", key);
        assert_eq!(copy.omap, original.omap, "{}", key);
    }
    assert_eq!(target_kv.get_all("").unwrap(), kv.get_all("").unwrap());
}

#[test]
fn test_incremental_skips_unchanged_objects() {
    let tmp = TempDir::new().unwrap();
    let (source, keys) = populated_source();
    let base = archive_dir(&tmp, "base");
    backup(&base, &source, None, PoolSelection::only(["p1"]));

    let changed = &keys[4];
    source
        .put_object(changed, b"rewritten", &[], &[])
        .unwrap();
    let reads_before = source.content_reads();

    let next = archive_dir(&tmp, "next");
    let report = create_backup(
        &test_key(),
        &BackupOptions::new(&next)
            .with_object_store(&source)
            .with_pools(PoolSelection::only(["p1"]))
            .incremental_over(&base)
            .with_config(BackupConfig::for_testing()),
    )
    .unwrap();
    assert_eq!(report.objects_written, 1);
    assert_eq!(report.objects_unchanged, 19);
    assert_eq!(source.content_reads() - reads_before, 1);

    // The new manifest only records what this run fetched.
    let metadata = read_metadata(&next, &FrameCodec::new(&test_key())).unwrap();
    assert_eq!(metadata.timestamps.len(), 1);
    assert_eq!(&metadata.timestamps[0].key, changed);

    let summary = inspect_archive(&test_key(), &next).unwrap();
    assert_eq!(summary.objects, 1);
}

#[test]
fn test_incremental_with_wrong_passphrase_fails_before_writing() {
    let tmp = TempDir::new().unwrap();
    let (source, _) = populated_source();
    let base = archive_dir(&tmp, "base");
    backup(&base, &source, None, PoolSelection::all());

    let next = archive_dir(&tmp, "next");
    let err = create_backup(
        &ArchiveKey::derive_with_rounds("wrong", 16),
        &BackupOptions::new(&next)
            .with_object_store(&source)
            .incremental_over(&base)
            .with_config(BackupConfig::for_testing()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Authentication));
    assert!(!next.exists());
}

#[test]
fn test_unmapped_pools_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let (source, _) = populated_source();
    for i in 0..4 {
        source
            .put_object(&ObjectKey::new("p2", "", format!("other-{}", i)), b"x", &[], &[])
            .unwrap();
    }
    backup(&dir, &source, None, PoolSelection::all());

    let target = MemoryObjectStore::with_pools(["restored"]);
    let report = restore_backup(
        &test_key(),
        &RestoreOptions::new(&dir)
            .with_object_store(&target)
            .with_pool_map(PoolMap::parse(&["p2:restored"]).unwrap()),
    )
    .unwrap();
    assert_eq!(report.objects_restored, 4);
    assert_eq!(report.objects_skipped, 20);
    assert_eq!(target.object_count("restored"), 4);
}

#[test]
fn test_oversized_object_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let store = MemoryObjectStore::with_pools(["p1"]);
    for i in 0..60 {
        let len = if i == 37 { 65 } else { 10 };
        store
            .put_object(&ObjectKey::new("p1", "", format!("o{:02}", i)), &vec![1u8; len], &[], &[])
            .unwrap();
    }

    let err = create_backup(
        &test_key(),
        &BackupOptions::new(&dir)
            .with_object_store(&store)
            .with_config(BackupConfig::for_testing().with_max_object_size(64)),
    )
    .unwrap_err();
    match err {
        Error::ObjectTooLarge { key, size, limit } => {
            assert_eq!(key.name, "o37");
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("unexpected error {:?}", other),
    }
    // No manifest: the archive is unusable as an incremental base.
    assert!(!ArchivePaths::from_root(&dir).has_metadata());
}

#[test]
fn test_object_of_exactly_the_limit_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let store = MemoryObjectStore::with_pools(["p1"]);
    store
        .put_object(&ObjectKey::new("p1", "", "edge"), &[7u8; 64], &[], &[])
        .unwrap();
    let report = create_backup(
        &test_key(),
        &BackupOptions::new(&dir)
            .with_object_store(&store)
            .with_config(BackupConfig::for_testing().with_max_object_size(64)),
    )
    .unwrap();
    assert_eq!(report.objects_written, 1);
}

#[test]
fn test_incomplete_kv_listing_fails() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let kv = populated_kv(5).with_listing_limit(2);
    let err = create_backup(
        &test_key(),
        &BackupOptions::new(&dir)
            .with_kv_store(&kv)
            .with_config(BackupConfig::for_testing()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::KvListingIncomplete { returned: 2 }));
    assert!(ArchivePaths::from_root(&dir).list_data_files().unwrap().is_empty());
}

#[test]
fn test_output_dir_must_be_empty() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("stray"), b"x").unwrap();
    let kv = populated_kv(1);
    let err = create_backup(
        &test_key(),
        &BackupOptions::new(tmp.path()).with_kv_store(&kv),
    )
    .unwrap_err();
    assert!(matches!(err, Error::OutputNotEmpty(_)));
}

#[test]
fn test_kv_only_archive_is_readable() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let kv = populated_kv(0);
    let report = create_backup(
        &test_key(),
        &BackupOptions::new(&dir)
            .with_kv_store(&kv)
            .with_config(BackupConfig::for_testing()),
    )
    .unwrap();
    assert_eq!(report.file_count, 0);
    assert!(!ArchivePaths::from_root(&dir).pool_list().exists());

    let summary = inspect_archive(&test_key(), &dir).unwrap();
    assert_eq!(summary.objects, 0);
    assert_eq!(summary.kv_rows, 0);
    assert_eq!(summary.manifest.unwrap().file_count, 0);
}

#[test]
fn test_restore_with_wrong_passphrase() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let (source, _) = populated_source();
    backup(&dir, &source, None, PoolSelection::all());

    let target = MemoryObjectStore::with_pools(["p1"]);
    let err = restore_backup(
        &ArchiveKey::derive_with_rounds("nope", 16),
        &RestoreOptions::new(&dir)
            .with_object_store(&target)
            .with_pool_map(PoolMap::default().with("p1", "p1")),
    )
    .unwrap_err();
    assert!(err.is_integrity());
    assert_eq!(target.object_count("p1"), 0);
}

#[test]
fn test_missing_data_file_fails_inspect_and_restore() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let source = MemoryObjectStore::with_pools(["p1"]);
    source
        .put_object(
            &ObjectKey::new("p1", "", "obj1"),
            b"hello",
            &[KeyValue::new("a", b"b".to_vec())],
            &[],
        )
        .unwrap();
    backup(&dir, &source, None, PoolSelection::all());
    std::fs::remove_file(ArchivePaths::from_root(&dir).data_file(0)).unwrap();

    let err = inspect_archive(&test_key(), &dir).unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);

    let target = MemoryObjectStore::with_pools(["p2"]);
    let err = restore_backup(
        &test_key(),
        &RestoreOptions::new(&dir)
            .with_object_store(&target)
            .with_pool_map(PoolMap::default().with("p1", "p2")),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
    assert_eq!(target.object_count("p2"), 0);
}

#[test]
fn test_clear_then_restore_round_trip() {
    let tmp = TempDir::new().unwrap();
    let dir = archive_dir(&tmp, "a");
    let (source, keys) = populated_source();
    let kv = populated_kv(6);
    backup(&dir, &source, Some(&kv), PoolSelection::only(["p1"]));

    let cleared = clear_stores(Some(&source), Some(&kv), &["p1".to_string()]).unwrap();
    assert_eq!(cleared.objects_deleted, 20);
    assert_eq!(cleared.kv_rows_deleted, 6);
    assert_eq!(source.object_count("p1"), 0);

    restore_backup(
        &test_key(),
        &RestoreOptions::new(&dir)
            .with_object_store(&source)
            .with_kv_store(&kv)
            .with_pool_map(PoolMap::default().with("p1", "p1")),
    )
    .unwrap();
    assert_eq!(source.object_count("p1"), keys.len());
    assert_eq!(kv.len(), 6);
}

#[test]
fn test_local_stores_round_trip() {
    let tmp = TempDir::new().unwrap();
    let source = LocalObjectStore::open(tmp.path().join("src")).unwrap();
    source.create_pool("data").unwrap();
    let handle = source.open_pool("data").unwrap();
    handle.write_full("", "plain", b"hello").unwrap();
    handle.set_xattr("ns", "attrs", "k", b"v").unwrap();
    handle
        .set_omap("ns", "attrs", &[KeyValue::new("a", b"1".to_vec())])
        .unwrap();
    let kv = LocalKvStore::open(tmp.path().join("kv.bin")).unwrap();
    kv.put("/x", b"y", std::time::Duration::from_secs(1)).unwrap();

    let dir = archive_dir(&tmp, "archive");
    let report = create_backup(
        &test_key(),
        &BackupOptions::new(&dir)
            .with_object_store(&source)
            .with_kv_store(&kv)
            .with_config(
                BackupConfig::for_testing().with_shard(ShardConfig::new().with_max_file_size(4096)),
            ),
    )
    .unwrap();
    assert_eq!(report.objects_written, 2);

    let target = LocalObjectStore::open(tmp.path().join("dst")).unwrap();
    target.create_pool("data2").unwrap();
    let target_kv = LocalKvStore::open(tmp.path().join("kv2.bin")).unwrap();
    restore_backup(
        &test_key(),
        &RestoreOptions::new(&dir)
            .with_object_store(&target)
            .with_kv_store(&target_kv)
            .with_pool_map(PoolMap::default().with("data", "data2")),
    )
    .unwrap();

    let restored = target.open_pool("data2").unwrap();
    let mut buf = Vec::new();
    assert_eq!(restored.read("", "plain", &mut buf, 100).unwrap(), 5);
    assert_eq!(buf, b"hello");
    assert_eq!(
        restored.xattrs("ns", "attrs").unwrap(),
        vec![KeyValue::new("k", b"v".to_vec())]
    );
    assert_eq!(
        restored.omap_values("ns", "attrs", "", 10).unwrap(),
        vec![KeyValue::new("a", b"1".to_vec())]
    );
    assert_eq!(target_kv.get_all("").unwrap().rows.len(), 1);
}
