//! Test suite entry point
//!
//! Top-level tests cover cross-cutting edge cases; `integration` exercises
//! full combine/split scenarios per format and `property` holds the
//! proptest-based invariants.

mod integration;
mod property;

use std::path::Path;
use tempfile::TempDir;
use textarc::{ArchiveFormat, Combiner};

fn plain_combiner() -> Combiner {
    Combiner::builder().no_default_excludes().build().unwrap()
}

#[test]
fn test_unicode_paths_and_content() {
    let source = TempDir::new().unwrap();
    std::fs::create_dir(source.path().join("docs")).unwrap();
    std::fs::write(source.path().join("docs/日本語.txt"), "こんにちは世界\n").unwrap();
    std::fs::write(source.path().join("naïve.md"), "# Résumé ☃\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.json");
    let out = work.path().join("out");

    let combiner = plain_combiner();
    let report = combiner.combine(source.path(), &archive, false, None).unwrap();
    assert_eq!(report.files_processed, 2);

    combiner.split(&archive, &out).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.join("docs/日本語.txt")).unwrap(),
        "こんにちは世界\n"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("naïve.md")).unwrap(),
        "# Résumé ☃\n"
    );
}

#[test]
fn test_latin1_source_normalized_to_utf8() {
    let source = TempDir::new().unwrap();
    // "café" in latin1; not valid UTF-8 as raw bytes.
    std::fs::write(source.path().join("menu.dat"), [b'c', b'a', b'f', 0xE9]).unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    let out = work.path().join("out");

    let combiner = plain_combiner();
    combiner.combine(source.path(), &archive, false, None).unwrap();
    combiner.split(&archive, &out).unwrap();

    // Text content comes back UTF-8 regardless of source encoding.
    assert_eq!(
        std::fs::read_to_string(out.join("menu.dat")).unwrap(),
        "café"
    );
}

#[test]
fn test_deeply_nested_tree() {
    let source = TempDir::new().unwrap();
    let mut dir = source.path().to_path_buf();
    for level in 0..10 {
        dir = dir.join(format!("level{level}"));
    }
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("leaf.txt"), "deep\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.yaml");
    let out = work.path().join("out");

    let combiner = plain_combiner();
    let report = combiner.combine(source.path(), &archive, false, None).unwrap();
    assert_eq!(report.files_processed, 1);

    let split = combiner.split(&archive, &out).unwrap();
    assert_eq!(split.files_restored, 1);
    let rel: std::path::PathBuf = (0..10).map(|l| format!("level{l}")).collect();
    assert_eq!(
        std::fs::read_to_string(out.join(rel).join("leaf.txt")).unwrap(),
        "deep\n"
    );
}

#[test]
fn test_empty_source_directory() {
    let source = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    let out = work.path().join("out");

    let combiner = plain_combiner();
    let report = combiner.combine(source.path(), &archive, false, None).unwrap();
    assert_eq!(report.files_processed, 0);
    assert!(archive.exists());

    let split = combiner.split(&archive, &out).unwrap();
    assert_eq!(split.files_restored, 0);
}

#[test]
fn test_files_without_trailing_newline_round_trip() {
    for format in ArchiveFormat::ALL {
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("no_nl.txt"), "no newline at end").unwrap();
        std::fs::write(source.path().join("one_nl.txt"), "one newline\n").unwrap();

        let work = TempDir::new().unwrap();
        let archive = work.path().join("a.dat");
        let out = work.path().join("out");

        let combiner = plain_combiner();
        combiner
            .combine(source.path(), &archive, false, Some(format))
            .unwrap();
        combiner.split(&archive, &out).unwrap();

        assert_eq!(
            std::fs::read_to_string(out.join("no_nl.txt")).unwrap(),
            "no newline at end",
            "{format}"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("one_nl.txt")).unwrap(),
            "one newline\n",
            "{format}"
        );
    }
}

#[test]
fn test_split_into_existing_directory_merges() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("new.txt"), "new\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    let out = work.path().join("out");
    std::fs::create_dir(&out).unwrap();
    std::fs::write(out.join("existing.txt"), "keep me\n").unwrap();

    let combiner = plain_combiner();
    combiner.combine(source.path(), &archive, false, None).unwrap();
    combiner.split(&archive, &out).unwrap();

    assert_eq!(std::fs::read_to_string(out.join("new.txt")).unwrap(), "new\n");
    assert_eq!(
        std::fs::read_to_string(out.join("existing.txt")).unwrap(),
        "keep me\n"
    );
}

#[test]
fn test_archive_of_archives() {
    // An archive containing a txt archive must not confuse the decoder.
    let inner_source = TempDir::new().unwrap();
    std::fs::write(inner_source.path().join("x.txt"), "inner\n").unwrap();

    let source = TempDir::new().unwrap();
    let combiner = plain_combiner();
    combiner
        .combine(inner_source.path(), &source.path().join("inner.txt"), false, None)
        .unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("outer.json");
    let out = work.path().join("out");
    combiner.combine(source.path(), &archive, false, None).unwrap();
    let split = combiner.split(&archive, &out).unwrap();
    assert_eq!(split.files_restored, 1);

    // The nested archive itself still splits cleanly.
    let inner_out = work.path().join("inner_out");
    let inner_split = combiner.split(&out.join("inner.txt"), &inner_out).unwrap();
    assert_eq!(inner_split.files_restored, 1);
    assert_eq!(
        std::fs::read_to_string(inner_out.join("x.txt")).unwrap(),
        "inner\n"
    );
}

#[test]
fn test_format_forced_over_extension() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("a.txt"), "x\n").unwrap();

    let work = TempDir::new().unwrap();
    // Extension says txt, override says xml; the content wins on split.
    let archive = work.path().join("a.txt");
    let combiner = plain_combiner();
    let report = combiner
        .combine(source.path(), &archive, false, Some(ArchiveFormat::Xml))
        .unwrap();
    assert_eq!(report.format, ArchiveFormat::Xml);

    let body = std::fs::read_to_string(&archive).unwrap();
    assert!(body.starts_with("<?xml"));
}

fn assert_tree_equal(left: &Path, right: &Path) {
    let mut left_files: Vec<_> = walk(left);
    let mut right_files: Vec<_> = walk(right);
    left_files.sort();
    right_files.sort();
    assert_eq!(left_files, right_files);
    for rel in &left_files {
        assert_eq!(
            std::fs::read(left.join(rel)).unwrap(),
            std::fs::read(right.join(rel)).unwrap(),
            "content mismatch for {rel}"
        );
    }
}

fn walk(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    out
}

#[test]
fn test_mixed_tree_identical_after_round_trip() {
    let source = TempDir::new().unwrap();
    std::fs::create_dir_all(source.path().join("src/nested")).unwrap();
    std::fs::write(source.path().join("src/lib.rs"), "pub fn x() {}\n").unwrap();
    std::fs::write(source.path().join("src/nested/data.bin"), [0u8, 159, 146, 150]).unwrap();
    std::fs::write(source.path().join("empty.txt"), "").unwrap();
    std::fs::write(source.path().join("README.md"), "line1\n\nline3\n").unwrap();

    for format in ArchiveFormat::ALL {
        let work = TempDir::new().unwrap();
        let archive = work.path().join("a.dat");
        let out = work.path().join("out");

        let combiner = plain_combiner();
        combiner
            .combine(source.path(), &archive, false, Some(format))
            .unwrap();
        let split = combiner.split(&archive, &out).unwrap();
        assert_eq!(split.files_restored, 4, "{format}");
        assert_tree_equal(source.path(), &out);
    }
}
