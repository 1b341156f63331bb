//! Integration tests for the transfer engine.

mod common;

use std::fs;

use common::{session, FakeFs, Node};
use pyboard_fs::{Board, FsError, FsErrorKind, CHUNK_SIZE};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

// ============================================================================
// Single Files
// ============================================================================

#[test]
fn test_put_get_round_trip_sizes() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    for len in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 17] {
        let data = pattern(len);
        let src = local.path().join(format!("src-{}.bin", len));
        let dst = local.path().join(format!("dst-{}.bin", len));
        fs::write(&src, &data).unwrap();

        let remote = format!("/f{}.bin", len);
        assert_eq!(board.put(&remote, &src).unwrap(), len as u64);
        assert_eq!(fs_.file(&remote).unwrap(), data, "remote copy of {} bytes", len);

        assert_eq!(board.get(&dst, &remote).unwrap(), len as u64);
        assert_eq!(fs::read(&dst).unwrap(), data, "local copy of {} bytes", len);
    }
}

#[test]
fn test_put_writes_in_chunks() {
    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("x.bin");
    fs::write(&src, pattern(CHUNK_SIZE + 1)).unwrap();

    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);
    board.put("/x.bin", &src).unwrap();

    assert_eq!(fs_.ops(), vec!["write /x.bin@0", "write /x.bin@512"]);
}

#[test]
fn test_put_empty_file_truncates() {
    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("empty");
    fs::write(&src, b"").unwrap();

    let fs_ = FakeFs::new();
    fs_.add_file("/old.txt", b"previous contents");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    assert_eq!(board.put("/old.txt", &src).unwrap(), 0);
    assert_eq!(fs_.file("/old.txt").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_get_exact_chunk_reads_twice() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    fs_.add_file("/x.bin", &pattern(CHUNK_SIZE));
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.get(&local.path().join("x.bin"), "/x.bin").unwrap();
    assert_eq!(fs_.ops(), vec!["read /x.bin@0", "read /x.bin@512"]);
}

#[test]
fn test_get_missing_remote() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let err = board.get(&local.path().join("x"), "/nope").unwrap_err();
    assert_eq!(err.kind(), Some(FsErrorKind::NotFound));
}

#[test]
fn test_put_missing_local() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let err = board.put("/x", &local.path().join("nope")).unwrap_err();
    assert!(matches!(err, FsError::Local { .. }), "got {:?}", err);
    assert!(fs_.ops().is_empty());
}

#[test]
fn test_cat_streams_contents() {
    let fs_ = FakeFs::new();
    let data = pattern(2 * CHUNK_SIZE + 5);
    fs_.add_file("/main.py", &data);
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let mut out = Vec::new();
    assert_eq!(board.cat("/main.py", &mut out).unwrap(), data.len() as u64);
    assert_eq!(out, data);
}

#[test]
fn test_cat_directory_fails() {
    let fs_ = FakeFs::new();
    fs_.add_dir("/lib");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let mut out = Vec::new();
    assert!(board.cat("/lib", &mut out).is_err());
    assert!(out.is_empty());
}

// ============================================================================
// Trees
// ============================================================================

fn sample_tree(fs_: &FakeFs) {
    fs_.add_dir("/proj");
    fs_.add_file("/proj/a.txt", b"alpha");
    fs_.add_dir("/proj/b");
    fs_.add_file("/proj/b/c.txt", b"gamma");
}

#[test]
fn test_download_mirrors_tree() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    sample_tree(&fs_);
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let out = local.path().join("copy");
    board.download(Some("/proj"), &out).unwrap();

    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha");
    assert!(out.join("b").is_dir());
    assert_eq!(fs::read(out.join("b").join("c.txt")).unwrap(), b"gamma");
}

#[test]
fn test_download_operation_order() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    sample_tree(&fs_);
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.download(Some("/proj"), local.path()).unwrap();
    assert_eq!(
        fs_.ops(),
        vec![
            "listdir /proj",
            "listdir /proj/b",
            "read /proj/a.txt@0",
            "read /proj/b/c.txt@0",
        ]
    );
}

#[test]
fn test_download_is_deterministic() {
    let fs_ = FakeFs::new();
    sample_tree(&fs_);
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let first = tempfile::tempdir().unwrap();
    board.download(Some("/proj"), first.path()).unwrap();
    let first_ops = fs_.ops();
    fs_.clear_ops();

    let second = tempfile::tempdir().unwrap();
    board.download(Some("/proj"), second.path()).unwrap();
    assert_eq!(fs_.ops(), first_ops);
}

#[test]
fn test_download_defaults_to_cwd() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    sample_tree(&fs_);
    fs_.set_cwd("/proj/b");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.download(None, local.path()).unwrap();
    assert_eq!(fs::read(local.path().join("c.txt")).unwrap(), b"gamma");
    assert!(!local.path().join("a.txt").exists());
}

#[test]
fn test_download_aborts_at_failing_entry() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    sample_tree(&fs_);
    fs_.add_file("/proj/z.txt", b"never reached");
    fs_.poison("/proj/b/c.txt");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    match board.download(Some("/proj"), local.path()).unwrap_err() {
        FsError::Entry { path, source } => {
            assert_eq!(path, "b/c.txt");
            assert_eq!(source.kind(), Some(FsErrorKind::Other));
        }
        other => panic!("expected Entry error, got {:?}", other),
    }
    assert!(!fs_.ops().contains(&"read /proj/z.txt@0".to_string()));
}

#[test]
fn test_download_missing_root() {
    let local = tempfile::tempdir().unwrap();
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    let err = board.download(Some("/nope"), local.path()).unwrap_err();
    assert_eq!(err.kind(), Some(FsErrorKind::NotFound));
}

fn local_tree(root: &std::path::Path) {
    fs::write(root.join("a.txt"), b"alpha").unwrap();
    fs::create_dir(root.join("b")).unwrap();
    fs::write(root.join("b").join("c.txt"), pattern(CHUNK_SIZE + 3)).unwrap();
}

#[test]
fn test_upload_mirrors_tree() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(local.path(), Some("/proj")).unwrap();

    assert_eq!(fs_.node("/proj"), Some(Node::Dir));
    assert_eq!(fs_.file("/proj/a.txt").unwrap(), b"alpha");
    assert_eq!(fs_.node("/proj/b"), Some(Node::Dir));
    assert_eq!(fs_.file("/proj/b/c.txt").unwrap(), pattern(CHUNK_SIZE + 3));
}

#[test]
fn test_upload_operation_order() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(local.path(), Some("/proj")).unwrap();
    assert_eq!(
        fs_.ops(),
        vec![
            "mkdir /proj",
            "write /proj/a.txt@0",
            "mkdir /proj/b",
            "write /proj/b/c.txt@0",
            "write /proj/b/c.txt@512",
        ]
    );
}

#[test]
fn test_upload_onto_existing_tree() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    let fs_ = FakeFs::new();
    fs_.add_dir("/proj");
    fs_.add_dir("/proj/b");
    fs_.add_file("/proj/a.txt", b"stale and longer than the new contents");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(local.path(), Some("/proj")).unwrap();
    assert_eq!(fs_.file("/proj/a.txt").unwrap(), b"alpha");
    assert_eq!(fs_.file("/proj/b/c.txt").unwrap(), pattern(CHUNK_SIZE + 3));
}

#[test]
fn test_upload_file_blocks_directory() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    let fs_ = FakeFs::new();
    fs_.add_dir("/proj");
    fs_.add_file("/proj/b", b"not a directory");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    match board.upload(local.path(), Some("/proj")).unwrap_err() {
        FsError::Entry { path, source } => {
            assert_eq!(path, "b");
            assert_eq!(source.kind(), Some(FsErrorKind::NotADirectory));
        }
        other => panic!("expected Entry error, got {:?}", other),
    }
}

#[test]
fn test_upload_defaults_to_cwd() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    let fs_ = FakeFs::new();
    fs_.add_dir("/lib");
    fs_.set_cwd("/lib");
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(local.path(), None).unwrap();
    assert_eq!(fs_.file("/lib/a.txt").unwrap(), b"alpha");
    assert_eq!(fs_.node("/lib/b"), Some(Node::Dir));
}

#[test]
fn test_upload_then_download_matches() {
    let src = tempfile::tempdir().unwrap();
    local_tree(src.path());
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(src.path(), Some("/proj")).unwrap();
    let dst = tempfile::tempdir().unwrap();
    board.download(Some("/proj"), dst.path()).unwrap();

    assert_eq!(
        pyboard_fs::walk_local(src.path()).unwrap(),
        pyboard_fs::walk_local(dst.path()).unwrap()
    );
    assert_eq!(
        fs::read(dst.path().join("b").join("c.txt")).unwrap(),
        pattern(CHUNK_SIZE + 3)
    );
}

#[cfg(unix)]
#[test]
fn test_upload_ignores_directory_symlink_cycle() {
    let local = tempfile::tempdir().unwrap();
    local_tree(local.path());
    std::os::unix::fs::symlink(".", local.path().join("loop")).unwrap();
    let fs_ = FakeFs::new();
    let mut session = session(&fs_);
    let mut raw = session.raw().unwrap();
    let mut board = Board::new(&mut raw);

    board.upload(local.path(), Some("/proj")).unwrap();
    assert_eq!(fs_.file("/proj/a.txt").unwrap(), b"alpha");
    assert_eq!(fs_.node("/proj/loop"), None);
}
