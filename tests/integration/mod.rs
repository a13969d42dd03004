//! End-to-end combine/split scenarios

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use textarc::{ArchiveFormat, CancellationToken, Combiner};

fn plain_combiner() -> Combiner {
    Combiner::builder().no_default_excludes().build().unwrap()
}

/// Mixed source: text with newline, raw binary, empty file.
fn mixed_source() -> TempDir {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("a.py"), "print(1)\n").unwrap();
    std::fs::write(source.path().join("b.bin"), [0u8, 1, 255]).unwrap();
    std::fs::write(source.path().join("c.txt"), "").unwrap();
    source
}

#[test]
fn test_json_archive_structure() {
    let source = mixed_source();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.json");

    plain_combiner()
        .combine(source.path(), &archive, false, None)
        .unwrap();

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&archive).unwrap()).unwrap();
    let files = doc["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);

    // Path-sorted entries.
    assert_eq!(files[0]["path"], "a.py");
    assert_eq!(files[1]["path"], "b.bin");
    assert_eq!(files[2]["path"], "c.txt");

    assert_eq!(files[0]["is_binary"], false);
    assert_eq!(files[0]["content"], "print(1)\n");
    assert_eq!(files[0]["ends_with_newline"], true);

    assert_eq!(files[1]["is_binary"], true);
    assert_eq!(files[1]["encoding"], "base64");

    assert_eq!(files[2]["content"], "");
    assert_eq!(files[2]["ends_with_newline"], false);
}

#[test]
fn test_mixed_source_round_trip_byte_identical() {
    for format in ArchiveFormat::ALL {
        let source = mixed_source();
        let work = TempDir::new().unwrap();
        let archive = work.path().join("a.dat");
        let out = work.path().join("out");

        let combiner = plain_combiner();
        combiner
            .combine(source.path(), &archive, false, Some(format))
            .unwrap();
        let split = combiner.split(&archive, &out).unwrap();
        assert_eq!(split.files_restored, 3, "{format}");

        assert_eq!(std::fs::read(out.join("a.py")).unwrap(), b"print(1)\n", "{format}");
        assert_eq!(std::fs::read(out.join("b.bin")).unwrap(), &[0u8, 1, 255], "{format}");
        assert_eq!(std::fs::read(out.join("c.txt")).unwrap(), b"", "{format}");
    }
}

#[test]
fn test_entries_path_sorted_in_txt_output() {
    let source = TempDir::new().unwrap();
    for name in ["zzz.txt", "mmm.txt", "aaa.txt"] {
        std::fs::write(source.path().join(name), "x\n").unwrap();
    }
    std::fs::create_dir(source.path().join("bbb")).unwrap();
    std::fs::write(source.path().join("bbb/inner.txt"), "y\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    plain_combiner()
        .combine(source.path(), &archive, false, None)
        .unwrap();

    let body = std::fs::read_to_string(&archive).unwrap();
    let order: Vec<String> = body
        .lines()
        .filter(|l| l.starts_with("FILE_METADATA:"))
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(&l["FILE_METADATA:".len()..]).unwrap();
            v["path"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(order, vec!["aaa.txt", "bbb/inner.txt", "mmm.txt", "zzz.txt"]);
}

#[test]
fn test_gzip_detected_despite_txt_extension() {
    let source = mixed_source();
    let work = TempDir::new().unwrap();
    // Named .txt but explicitly compressed; split must go by the magic.
    let archive = work.path().join("a.txt");
    let out = work.path().join("out");

    let combiner = plain_combiner();
    let report = combiner
        .combine(source.path(), &archive, true, None)
        .unwrap();
    assert!(report.compressed);

    let raw = std::fs::read(&archive).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let split = combiner.split(&archive, &out).unwrap();
    assert_eq!(split.files_restored, 3);
    assert_eq!(std::fs::read(out.join("a.py")).unwrap(), b"print(1)\n");
}

#[test]
fn test_gzip_magic_with_corrupt_frame_retried_as_plain() {
    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");

    // Starts with the gzip magic but is not a gzip stream; the split must
    // fall back to reading it as a plain archive.
    let mut body = vec![0x1f, 0x8b, b'\n'];
    body.extend_from_slice(
        b"=== FILE_SEPARATOR ===\n\
          FILE_METADATA: {\"path\":\"ok.txt\",\"ends_with_newline\":true}\n\
          ENCODING: utf-8\n\
          salvaged\n\n",
    );
    std::fs::write(&archive, &body).unwrap();

    let out = work.path().join("out");
    let report = plain_combiner().split(&archive, &out).unwrap();
    assert_eq!(report.files_restored, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(
        std::fs::read_to_string(out.join("ok.txt")).unwrap(),
        "salvaged\n"
    );
}

#[test]
fn test_format_sniffed_without_extension() {
    for format in ArchiveFormat::ALL {
        let source = mixed_source();
        let work = TempDir::new().unwrap();
        let archive = work.path().join("archive");
        let out = work.path().join("out");

        let combiner = plain_combiner();
        combiner
            .combine(source.path(), &archive, false, Some(format))
            .unwrap();
        let split = combiner.split(&archive, &out).unwrap();
        assert_eq!(split.format, format, "sniffing failed");
        assert_eq!(split.files_restored, 3, "{format}");
    }
}

#[test]
fn test_hostile_entries_contained() {
    let work = TempDir::new().unwrap();
    let archive = work.path().join("hostile.txt");
    let body = "\
=== FILE_SEPARATOR ===\n\
FILE_METADATA: {\"path\":\"../../escape.txt\",\"ends_with_newline\":false}\n\
ENCODING: utf-8\n\
bad\n\n\
=== FILE_SEPARATOR ===\n\
FILE_METADATA: {\"path\":\"/etc/textarc_test_marker\",\"ends_with_newline\":false}\n\
ENCODING: utf-8\n\
rerooted\n\n\
=== FILE_SEPARATOR ===\n\
FILE_METADATA: {\"path\":\"nested/../fine.txt\",\"ends_with_newline\":false}\n\
ENCODING: utf-8\n\
ok\n\n";
    std::fs::write(&archive, body).unwrap();

    let out = work.path().join("out");
    let report = plain_combiner().split(&archive, &out).unwrap();

    // Traversal blocked, absolute path re-rooted, internal .. resolved.
    assert_eq!(report.security_blocked.len(), 1);
    assert_eq!(report.files_restored, 2);
    assert!(!work.path().join("escape.txt").exists());
    assert!(!std::path::Path::new("/etc/textarc_test_marker").exists());
    assert_eq!(
        std::fs::read_to_string(out.join("etc/textarc_test_marker")).unwrap(),
        "rerooted"
    );
    assert_eq!(std::fs::read_to_string(out.join("fine.txt")).unwrap(), "ok");
}

#[test]
fn test_progress_callback_invoked() {
    let source = mixed_source();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let combiner = Combiner::builder()
        .no_default_excludes()
        .progress_callback(Arc::new(move |_info| {
            seen.fetch_add(1, Ordering::Relaxed);
        }))
        .build()
        .unwrap();

    combiner.combine(source.path(), &archive, false, None).unwrap();
    let combine_calls = calls.load(Ordering::Relaxed);
    assert!(combine_calls >= 3, "expected scan+encode progress, got {combine_calls}");

    combiner.split(&archive, &work.path().join("out")).unwrap();
    assert!(calls.load(Ordering::Relaxed) > combine_calls);
}

#[test]
fn test_pre_cancelled_token_aborts_cleanly() {
    let source = mixed_source();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");

    let token = CancellationToken::new();
    token.cancel();
    let combiner = Combiner::builder()
        .no_default_excludes()
        .cancellation(token)
        .build()
        .unwrap();

    let err = combiner
        .combine(source.path(), &archive, false, None)
        .unwrap_err();
    assert!(matches!(err, textarc::ArchiveError::Cancelled));
    // No archive and no stray temp files.
    assert!(!archive.exists());
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn test_checksums_recorded_in_archive() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("data.txt"), "payload\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.json");
    Combiner::builder()
        .no_default_excludes()
        .calculate_checksums(true)
        .build()
        .unwrap()
        .combine(source.path(), &archive, false, None)
        .unwrap();

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&archive).unwrap()).unwrap();
    let checksum = doc["files"][0]["checksum"].as_str().unwrap();
    assert_eq!(checksum.len(), 64);
}

#[cfg(unix)]
#[test]
fn test_permissions_round_trip() {
    use std::os::unix::fs::PermissionsExt;

    let source = TempDir::new().unwrap();
    let script = source.path().join("run.sh");
    std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    let out = work.path().join("out");

    let combiner = Combiner::builder()
        .no_default_excludes()
        .preserve_permissions(true)
        .build()
        .unwrap();
    combiner.combine(source.path(), &archive, false, None).unwrap();
    combiner.split(&archive, &out).unwrap();

    let mode = std::fs::metadata(out.join("run.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn test_default_excludes_applied() {
    let source = TempDir::new().unwrap();
    std::fs::create_dir(source.path().join(".git")).unwrap();
    std::fs::write(source.path().join(".git/HEAD"), "ref: main\n").unwrap();
    std::fs::write(source.path().join("kept.txt"), "x\n").unwrap();
    std::fs::write(source.path().join("debug.log"), "noise\n").unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("a.txt");
    let report = Combiner::builder()
        .build()
        .unwrap()
        .combine(source.path(), &archive, false, None)
        .unwrap();

    assert_eq!(report.files_processed, 1);
    assert_eq!(report.files_skipped, 2);
}

#[test]
fn test_cross_format_rewrite() {
    // Split a txt archive, re-combine as markdown, split again.
    let source = mixed_source();
    let work = TempDir::new().unwrap();
    let combiner = plain_combiner();

    let txt = work.path().join("a.txt");
    combiner.combine(source.path(), &txt, false, None).unwrap();
    let stage1 = work.path().join("stage1");
    combiner.split(&txt, &stage1).unwrap();

    let md = work.path().join("a.md");
    combiner.combine(&stage1, &md, false, None).unwrap();
    let stage2 = work.path().join("stage2");
    let report = combiner.split(&md, &stage2).unwrap();

    assert_eq!(report.format, ArchiveFormat::Markdown);
    assert_eq!(report.files_restored, 3);
    assert_eq!(std::fs::read(stage2.join("a.py")).unwrap(), b"print(1)\n");
    assert_eq!(std::fs::read(stage2.join("b.bin")).unwrap(), &[0u8, 1, 255]);
}
