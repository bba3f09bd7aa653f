//! End-to-end scenarios against a real temp directory, covering the numbered scenarios from the
//! translog's testable-properties list.

use std::fs;

use translog::{
    DeleteOperation, IndexOperation, Location, OpenMode, Operation, TranslogConfig, TranslogError, VersionType,
};

fn config(dir: &std::path::Path) -> TranslogConfig {
    TranslogConfig::builder(dir.to_path_buf()).build().unwrap()
}

fn index(id: &str, source: &[u8]) -> Operation {
    Operation::Create(IndexOperation {
        id: id.to_string(),
        doc_type: "doc".to_string(),
        source: source.to_vec(),
        routing: None,
        parent: None,
        version: 1,
        timestamp: 0,
        ttl: 0,
        version_type: VersionType::Internal,
    })
}

fn delete(uid: &str) -> Operation {
    Operation::Delete(DeleteOperation {
        uid_field: "_uid".to_string(),
        uid_text: uid.to_string(),
        version: 1,
        version_type: VersionType::Internal,
    })
}

#[test]
fn s1_open_empty_append_read() {
    let dir = tempdir::TempDir::new("translog-s1").unwrap();
    let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
    assert_eq!(translog.current_generation(), 1);

    let loc = translog.add(index("a", &[0x01, 0x02])).unwrap();
    match translog.read(loc).unwrap() {
        Operation::Create(op) => assert_eq!(op.source, vec![0x01, 0x02]),
        other => panic!("unexpected operation: {other:?}"),
    }
    assert_eq!(translog.total_operations().unwrap(), 1);
}

#[test]
fn s2_commit_cycle() {
    let dir = tempdir::TempDir::new("translog-s2").unwrap();
    let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
    translog.add(index("a", &[0x01, 0x02])).unwrap();

    translog.prepare_commit().unwrap();
    assert_eq!(translog.current_generation(), 2);

    translog.add(delete("a")).unwrap();
    translog.commit().unwrap();

    assert!(!dir.path().join(translog::file_name(1)).exists());
    assert_eq!(translog.total_operations().unwrap(), 1);
}

#[test]
fn s3_recovery_replays_uncommitted_operations() {
    let dir = tempdir::TempDir::new("translog-s3").unwrap();
    {
        let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(index("a", &[0x01, 0x02])).unwrap();
        translog.close();
    }

    let translog = translog::Translog::open(config(dir.path()), OpenMode::Recover, None).unwrap();
    assert_eq!(translog.current_generation(), 2);

    let mut snapshot = translog.new_snapshot().unwrap();
    let ops: Vec<_> = (&mut snapshot).map(|r| r.unwrap()).collect();
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        Operation::Create(op) => assert_eq!(op.id, "a"),
        other => panic!("unexpected operation: {other:?}"),
    }
}

#[test]
fn s4_view_survives_prepare_commit() {
    let dir = tempdir::TempDir::new("translog-s4").unwrap();
    let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
    translog.add(index("a", &[0x01])).unwrap();

    let view = translog.new_view();
    translog.prepare_commit().unwrap();
    translog.add(index("b", &[0x02])).unwrap();

    let mut snapshot = view.snapshot();
    let ops: Vec<_> = (&mut snapshot).map(|r| r.unwrap()).collect();
    assert_eq!(ops.len(), 2);
    assert_eq!(view.min_generation(), 1);

    // The generation the view still retains must not have been deleted by a concurrent commit.
    translog.commit().unwrap();
    assert!(dir.path().join(translog::file_name(1)).exists());
    drop(view);
}

#[test]
fn s5_corrupted_record_surfaces_as_corrupted() {
    let dir = tempdir::TempDir::new("translog-s5").unwrap();
    let gen1_path;
    {
        let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(delete("a")).unwrap();
        translog.add(delete("b")).unwrap();
        gen1_path = dir.path().join(translog::file_name(1));
        translog.close();
    }

    // Flip the last byte of the file: it falls inside the final record's checksum, so the
    // record fails to decode without the file being short a single byte (a pure corruption,
    // not a truncation).
    let mut bytes = fs::read(&gen1_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&gen1_path, &bytes).unwrap();

    let translog = translog::Translog::open(config(dir.path()), OpenMode::Recover, None).unwrap();
    let mut snapshot = translog.new_snapshot().unwrap();

    assert!(snapshot.next().unwrap().is_ok());
    let err = snapshot.next().unwrap().unwrap_err();
    assert!(matches!(err, TranslogError::Corrupted { .. }));
}

#[test]
fn s6_truncated_tail_surfaces_as_truncated_after_a_clean_prefix() {
    let dir = tempdir::TempDir::new("translog-s6").unwrap();
    let gen1_path;
    {
        let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(delete("a")).unwrap();
        translog.add(delete("b")).unwrap();
        gen1_path = dir.path().join(translog::file_name(1));
        translog.close();
    }

    let bytes = fs::read(&gen1_path).unwrap();
    let torn = &bytes[..bytes.len() - 2];
    fs::write(&gen1_path, torn).unwrap();

    let translog = translog::Translog::open(config(dir.path()), OpenMode::Recover, None).unwrap();
    let mut snapshot = translog.new_snapshot().unwrap();

    assert!(snapshot.next().unwrap().is_ok());
    let err = snapshot.next().unwrap().unwrap_err();
    assert!(err.is_truncated());
}

#[test]
fn invalid_location_generation_is_rejected() {
    let dir = tempdir::TempDir::new("translog-invalid-location").unwrap();
    let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
    let bogus = Location::new(99, 0, 4);
    let err = translog.read(bogus).unwrap_err();
    assert!(matches!(err, TranslogError::InvalidLocation { .. }));
}

#[test]
fn strict_open_mode_requires_a_checkpoint() {
    let dir = tempdir::TempDir::new("translog-open-strict").unwrap();
    {
        let translog = translog::Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(index("a", &[0x01])).unwrap();
        translog.commit().unwrap();
    }

    let translog = translog::Translog::open(config(dir.path()), OpenMode::Open, None).unwrap();
    // The checkpoint names the generation that became current at the last roll (gen 2); OPEN
    // mode opens exactly that generation as history and starts a fresh one past it.
    assert_eq!(translog.current_generation(), 3);
}
