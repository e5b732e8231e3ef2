use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;
use ziplift_archive::{
    ArchiveFormat, Error, ErrorKind, ExtractOptions, ExtractProgress, TarCompress, extract,
    extract_from_reader,
};
use zip::write::SimpleFileOptions;

enum Item<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    Link(&'a str, &'a str),
}

fn zip_bytes(items: &[Item<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().unix_permissions(0o644);
    for item in items {
        match item {
            Item::Dir(name) => writer.add_directory(*name, options).unwrap(),
            Item::File(name, content) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
            Item::Link(name, target) => writer.add_symlink(*name, *target, options).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

fn write_zip(path: &Path, items: &[Item<'_>]) {
    fs::write(path, zip_bytes(items)).unwrap();
}

fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn extract_zip() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("bundle.zip");
    write_zip(
        &archive,
        &[
            Item::Dir("docs/"),
            Item::File("docs/readme.txt", b"hello"),
            Item::File("bin/tool", b"#!/bin/sh\n"),
        ],
    );

    let out = tmp.path().join("out");
    let report = extract(&archive, &out, &ExtractOptions::default()).unwrap();

    assert_eq!(report.format, ArchiveFormat::Zip);
    assert_eq!(report.entry_count(), 3);
    assert_eq!(report.file_count(), 2);
    assert_eq!(report.total_bytes, 15);
    assert_eq!(fs::read(out.join("docs/readme.txt")).unwrap(), b"hello");
    assert!(out.join("bin").is_dir());
}

#[test]
fn extract_tar_gz() {
    let tmp = tempfile::tempdir().unwrap();
    let bytes = tar_gz_bytes(&[("pkg/run.sh", b"echo hi\n"), ("pkg/data.txt", b"data")]);

    let report = extract_from_reader(Cursor::new(bytes), tmp.path(), &ExtractOptions::default())
        .unwrap();

    assert_eq!(report.format, ArchiveFormat::Tar(TarCompress::Gzip));
    assert_eq!(report.file_count(), 2);
    assert_eq!(fs::read(tmp.path().join("pkg/data.txt")).unwrap(), b"data");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(tmp.path().join("pkg/run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[test]
fn nested_archives_are_unpacked_and_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let deepest = zip_bytes(&[Item::File("y.txt", b"level two")]);
    let inner = zip_bytes(&[
        Item::File("x.txt", b"level one"),
        Item::File("more/deeper.zip", &deepest),
    ]);
    let archive = tmp.path().join("outer.zip");
    write_zip(&archive, &[Item::File("data/inner.zip", &inner)]);

    let out = tmp.path().join("out");
    let report = extract(&archive, &out, &ExtractOptions::default()).unwrap();

    assert_eq!(fs::read(out.join("data/x.txt")).unwrap(), b"level one");
    assert_eq!(fs::read(out.join("data/more/y.txt")).unwrap(), b"level two");
    assert!(!out.join("data/inner.zip").exists());
    assert!(!out.join("data/more/deeper.zip").exists());
    assert_eq!(report.nested_archives.len(), 2);

    let deepest_entry = report
        .entries
        .iter()
        .find(|e| e.original_path == Path::new("y.txt"))
        .unwrap();
    assert_eq!(deepest_entry.depth, 2);
}

#[test]
fn nested_archive_with_its_own_name() {
    let tmp = tempfile::tempdir().unwrap();
    let innermost = zip_bytes(&[Item::File("leaf.txt", b"leaf")]);
    let inner = zip_bytes(&[Item::File("inner.zip", &innermost)]);
    let archive = tmp.path().join("outer.zip");
    write_zip(&archive, &[Item::File("inner.zip", &inner)]);

    let out = tmp.path().join("out");
    extract(&archive, &out, &ExtractOptions::default()).unwrap();

    assert_eq!(fs::read(out.join("leaf.txt")).unwrap(), b"leaf");
    assert!(!out.join("inner.zip").exists());
}

#[test]
fn nesting_beyond_max_depth_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let b = zip_bytes(&[Item::File("b.txt", b"b")]);
    let a = zip_bytes(&[Item::File("b.zip", &b)]);
    let archive = tmp.path().join("outer.zip");
    write_zip(&archive, &[Item::File("a.zip", &a)]);

    let out = tmp.path().join("out");
    let result = extract(&archive, &out, &ExtractOptions::default().max_depth(1));

    match result {
        Err(Error::NestingTooDeep { archive, max_depth }) => {
            assert_eq!(max_depth, 1);
            assert!(archive.ends_with("b.zip"));
        }
        other => panic!("expected NestingTooDeep, got {other:?}"),
    }
    assert!(out.join("a.zip").exists());
    assert!(out.join("b.zip").exists());
    assert!(!out.join("b.txt").exists());
}

#[test]
fn failed_nested_archive_is_left_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("outer.zip");
    write_zip(
        &archive,
        &[
            Item::File("ok.txt", b"fine"),
            Item::File("broken.zip", b"this is not a zip archive"),
        ],
    );

    let out = tmp.path().join("out");
    let result = extract(&archive, &out, &ExtractOptions::default());

    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    assert_eq!(fs::read(out.join("ok.txt")).unwrap(), b"fine");
    assert!(out.join("broken.zip").exists());
}

#[test]
fn nested_unpacking_can_be_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    let inner = zip_bytes(&[Item::File("x.txt", b"x")]);
    let archive = tmp.path().join("outer.zip");
    write_zip(&archive, &[Item::File("inner.zip", &inner)]);

    let options = ExtractOptions::default().nested_suffixes(Vec::<String>::new());
    let report = extract(&archive, tmp.path().join("out"), &options).unwrap();

    assert!(tmp.path().join("out/inner.zip").exists());
    assert!(report.nested_archives.is_empty());
}

#[test]
fn metadata_entries_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("mac.zip");
    write_zip(
        &archive,
        &[
            Item::File("a.txt", b"a"),
            Item::Dir("__MACOSX/"),
            Item::File("__MACOSX/._a.txt", b"resource fork"),
        ],
    );

    let out = tmp.path().join("out");
    let report = extract(&archive, &out, &ExtractOptions::default()).unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.entry_count(), 1);
    assert!(!out.join("__MACOSX").exists());
}

#[test]
fn parent_traversal_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("evil.zip");
    write_zip(&archive, &[Item::File("../evil.txt", b"pwned")]);

    let out = tmp.path().join("out");
    let result = extract(&archive, &out, &ExtractOptions::default());

    assert!(matches!(result, Err(Error::PathTraversal { .. })));
    assert!(!tmp.path().join("evil.txt").exists());
}

#[test]
fn absolute_entry_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("evil.zip");
    let absolute = tmp.path().join("absolute.txt");
    let name = absolute.to_str().unwrap().to_string();
    write_zip(&archive, &[Item::File(&name, b"pwned")]);

    let result = extract(&archive, tmp.path().join("out"), &ExtractOptions::default());

    assert!(matches!(result, Err(Error::PathTraversal { .. })));
    assert!(!absolute.exists());
}

#[cfg(unix)]
#[test]
fn escaping_symlinks_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();

    let archive = tmp.path().join("relative.zip");
    write_zip(&archive, &[Item::Link("link", "../../etc")]);
    let result = extract(&archive, tmp.path().join("a"), &ExtractOptions::default());
    assert!(matches!(result, Err(Error::SymlinkEscape { .. })));

    let archive = tmp.path().join("absolute.zip");
    write_zip(&archive, &[Item::Link("link", "/etc/passwd")]);
    let result = extract(&archive, tmp.path().join("b"), &ExtractOptions::default());
    assert!(matches!(result, Err(Error::AbsoluteSymlinkTarget { .. })));
}

#[cfg(unix)]
#[test]
fn symlink_chain_cannot_leave_root() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("chain.zip");
    write_zip(
        &archive,
        &[
            Item::Dir("s/"),
            Item::Dir("s/t/"),
            Item::Link("s/t/d", ".."),
            Item::Link("e", "s/t/d/../../../x"),
        ],
    );

    let out = tmp.path().join("a/out");
    let result = extract(&archive, &out, &ExtractOptions::default());

    assert!(matches!(result, Err(Error::SymlinkEscape { .. })));
    assert!(fs::symlink_metadata(out.join("e")).is_err());

    // The first link stays, and it points at a directory inside the root.
    let real = out.join("s/t/d").canonicalize().unwrap();
    assert!(real.starts_with(out.canonicalize().unwrap()));
}

#[cfg(unix)]
#[test]
fn climbing_through_a_linked_directory_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("climb.zip");
    write_zip(
        &archive,
        &[
            Item::Dir("a/b/"),
            Item::Link("a/b/up", ".."),
            Item::Link("a/b/up/x", "../../../y"),
        ],
    );

    let out = tmp.path().join("root/out");
    let result = extract(&archive, &out, &ExtractOptions::default());

    assert!(matches!(result, Err(Error::SymlinkEscape { .. })));
    assert!(fs::symlink_metadata(out.join("a/x")).is_err());
}

#[cfg(unix)]
#[test]
fn contained_symlink_is_created() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("links.zip");
    write_zip(
        &archive,
        &[
            Item::File("lib/libfoo.so.1", b"elf"),
            Item::Link("lib/libfoo.so", "libfoo.so.1"),
        ],
    );

    let out = tmp.path().join("out");
    let report = extract(&archive, &out, &ExtractOptions::default()).unwrap();

    let link = out.join("lib/libfoo.so");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read(&link).unwrap(), b"elf");
    assert!(report.entries.iter().any(|e| e.is_symlink()));
}

#[cfg(unix)]
#[test]
fn planted_symlink_in_destination_is_not_followed() {
    let tmp = tempfile::tempdir().unwrap();
    let outside = tmp.path().join("outside");
    let out = tmp.path().join("out");
    fs::create_dir_all(&outside).unwrap();
    fs::create_dir_all(&out).unwrap();
    std::os::unix::fs::symlink(&outside, out.join("escape")).unwrap();

    let archive = tmp.path().join("planted.zip");
    write_zip(&archive, &[Item::File("escape/payload.txt", b"pwned")]);

    let result = extract(&archive, &out, &ExtractOptions::default());

    assert!(matches!(result, Err(Error::PathTraversal { .. })));
    assert!(!outside.join("payload.txt").exists());
}

fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<_> = ziplift_fs::walk_files(root)
        .map(|file| {
            let file = file.unwrap();
            let bytes = fs::read(&file.path).unwrap();
            (file.relative, bytes)
        })
        .collect();
    files.sort();
    files
}

#[test]
fn extraction_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let deepest = zip_bytes(&[Item::File("z.txt", b"deepest")]);
    let inner = zip_bytes(&[
        Item::File("x.txt", b"inner"),
        Item::File("sub/deeper.zip", &deepest),
    ]);
    let archive = tmp.path().join("outer.zip");
    write_zip(
        &archive,
        &[
            Item::Dir("a/"),
            Item::File("a/b.txt", b"outer"),
            Item::File("a/inner.zip", &inner),
            Item::File("c/d/e.txt", b"e"),
        ],
    );

    let first = tmp.path().join("o1");
    let second = tmp.path().join("o2");
    extract(&archive, &first, &ExtractOptions::default()).unwrap();
    extract(&archive, &second, &ExtractOptions::default()).unwrap();

    let files = snapshot(&first);
    assert_eq!(files, snapshot(&second));

    let names: Vec<_> = files.iter().map(|(relative, _)| relative.clone()).collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("a/b.txt"),
            PathBuf::from("a/sub/z.txt"),
            PathBuf::from("a/x.txt"),
            PathBuf::from("c/d/e.txt"),
        ]
    );
    assert!(!first.join("a/inner.zip").exists());

    // Extracting over an existing result leaves it unchanged.
    extract(&archive, &first, &ExtractOptions::default()).unwrap();
    assert_eq!(snapshot(&first), files);
}

#[test]
fn file_over_existing_directory_is_an_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("clash.zip");
    write_zip(
        &archive,
        &[Item::Dir("docs/"), Item::File("docs/keep.txt", b"keep"), Item::File("docs", b"x")],
    );

    let out = tmp.path().join("out");
    let err = extract(&archive, &out, &ExtractOptions::default()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionIo);
    match &err {
        Error::ExtractionFailed { path, .. } => assert!(path.ends_with("docs")),
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("docs"));
    assert_eq!(fs::read(out.join("docs/keep.txt")).unwrap(), b"keep");
}

#[test]
fn file_under_existing_file_is_an_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("clash.zip");
    write_zip(
        &archive,
        &[Item::File("blocker", b"plain file"), Item::File("blocker/inner.txt", b"x")],
    );

    let out = tmp.path().join("out");
    let err = extract(&archive, &out, &ExtractOptions::default()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionIo);
    match &err {
        Error::DirectoryCreationFailed { path, .. } => assert!(path.ends_with("blocker")),
        other => panic!("expected DirectoryCreationFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("blocker"));
    assert_eq!(fs::read(out.join("blocker")).unwrap(), b"plain file");
}

#[test]
fn missing_archive_is_an_open_error() {
    let tmp = tempfile::tempdir().unwrap();
    let result = extract(
        tmp.path().join("missing.zip"),
        tmp.path().join("out"),
        &ExtractOptions::default(),
    );
    assert!(matches!(result, Err(Error::ArchiveOpen { .. })));
    // The destination is prepared before the archive is opened.
    assert!(tmp.path().join("out").is_dir());
}

#[test]
fn unknown_format_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("notes.zip");
    fs::write(&archive, b"plain text pretending to be an archive").unwrap();

    let result = extract(&archive, tmp.path().join("out"), &ExtractOptions::default());
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn progress_reports_every_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("bundle.zip");
    write_zip(
        &archive,
        &[Item::File("a.txt", b"aa"), Item::File("b.txt", b"bbb")],
    );

    let calls = Arc::new(AtomicU64::new(0));
    let last_bytes = Arc::new(AtomicU64::new(0));
    let (calls_cb, bytes_cb) = (calls.clone(), last_bytes.clone());
    let options = ExtractOptions::default().on_progress(Arc::new(move |p: &ExtractProgress| {
        calls_cb.fetch_add(1, Ordering::SeqCst);
        bytes_cb.store(p.bytes, Ordering::SeqCst);
    }));

    extract(&archive, tmp.path().join("out"), &options).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(last_bytes.load(Ordering::SeqCst), 5);
}

#[test]
fn cancellation_stops_between_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("bundle.zip");
    write_zip(
        &archive,
        &[Item::File("first.txt", b"1"), Item::File("second.txt", b"2")],
    );

    let options = ExtractOptions::default();
    let token = options.cancel.clone();
    let options = options.on_progress(Arc::new(move |_: &ExtractProgress| token.cancel()));

    let out = tmp.path().join("out");
    let result = extract(&archive, &out, &options);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(out.join("first.txt").exists());
    assert!(!out.join("second.txt").exists());
}
