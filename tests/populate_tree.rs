//! End-to-end population of a host directory from a manifest.

use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use fspop::hostdir::HostDirFs;
use fspop::populate;

#[test]
fn populates_file_and_directory_under_root() {
    let sources = tempfile::tempdir().unwrap();
    let source = sources.path().join("x");
    fs::write(&source, "hi").unwrap();

    let target = tempfile::tempdir().unwrap();
    let manifest = format!(
        "foo\nmode=reg\nperm=644\nsource={}\n\nbar\nmode=dir\nperm=755\n",
        source.display()
    );

    let mut backend = HostDirFs::open(target.path()).unwrap();
    let summary = populate::run(&mut backend, Cursor::new(manifest)).unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 0);

    let foo = target.path().join("foo");
    assert_eq!(fs::read(&foo).unwrap(), b"hi");
    assert_eq!(
        fs::metadata(&foo).unwrap().permissions().mode() & 0o7777,
        0o644
    );

    let bar = target.path().join("bar");
    let meta = fs::metadata(&bar).unwrap();
    assert!(meta.is_dir());
    assert_eq!(meta.permissions().mode() & 0o7777, 0o755);
}

#[test]
fn populates_symlinks_and_large_files() {
    let sources = tempfile::tempdir().unwrap();
    // larger than one copy chunk so the streamer loops
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let source = sources.path().join("big");
    fs::write(&source, &payload).unwrap();

    let target = tempfile::tempdir().unwrap();
    let manifest = format!(
        "big\nmode=reg\nperm=600\nsource={}\n\nln\nmode=sym\ntarget=big\n",
        source.display()
    );

    let mut backend = HostDirFs::open(target.path()).unwrap();
    let summary = populate::run(&mut backend, Cursor::new(manifest)).unwrap();
    assert_eq!(summary.created, 2);

    assert_eq!(fs::read(target.path().join("big")).unwrap(), payload);
    assert_eq!(
        fs::read_link(target.path().join("ln")).unwrap(),
        Path::new("big")
    );
    // the link resolves inside the target tree
    assert_eq!(fs::read(target.path().join("ln")).unwrap(), payload);
}

#[test]
fn aborts_on_unknown_attribute_leaving_earlier_entries() {
    let target = tempfile::tempdir().unwrap();
    let manifest = "good\nmode=dir\nperm=700\n\nbad\nowner=root\n";

    let mut backend = HostDirFs::open(target.path()).unwrap();
    let err = populate::run(&mut backend, Cursor::new(manifest.to_string())).unwrap_err();
    assert!(err.to_string().contains("owner=root"));

    // first record was already materialized when the run aborted
    assert!(target.path().join("good").is_dir());
    assert!(!target.path().join("bad").exists());
}
