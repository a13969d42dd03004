//! Property-based invariants
//!
//! Codec round trips run in memory against every format; filesystem-backed
//! properties (sanitizer containment) use a fresh temp root per case.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use proptest::prelude::*;
use std::io::BufReader;
use std::path::Path;
use tempfile::TempDir;
use textarc::content::decode_payload;
use textarc::formats::{codec_for, MemorySink};
use textarc::utils::parse_size;
use textarc::{sanitize, ArchiveFormat, ArchiveHeader, FileRecord};

fn rel_path() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,8}(/[a-z]{1,8}){0,2}\\.[a-z]{1,3}").unwrap()
}

/// Printable multi-line text whose trailing-newline shape survives the
/// codec contract: at most one trailing newline, and no line colliding with
/// the txt separator.
fn text_content() -> impl Strategy<Value = String> {
    (proptest::collection::vec("[ -~]{0,30}", 0..8), any::<bool>())
        .prop_map(|(lines, trailing)| {
            let mut content = lines.join("\n");
            if trailing && !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content
        })
        .prop_filter("single trailing newline only", |c| !c.ends_with("\n\n"))
        .prop_filter("txt separator collision", |c| {
            !c.lines().any(|l| l == "=== FILE_SEPARATOR ===")
        })
}

fn text_round_trip(format: ArchiveFormat, path: &str, content: &str) {
    let mut record = FileRecord::new(path, content.len() as u64, 0.0, 0o644);
    record.ends_with_newline = content.ends_with('\n');

    let header = ArchiveHeader::new(Path::new("/src"), 1, content.len() as u64);
    let codec = codec_for(format);
    let mut encoded = Vec::new();
    let mut stream = vec![(record.clone(), content.as_bytes().to_vec())].into_iter();
    codec.encode(&mut encoded, &header, &mut stream).unwrap();

    let mut sink = MemorySink::default();
    codec
        .decode(&mut BufReader::new(&encoded[..]), &mut sink)
        .unwrap();
    assert_eq!(sink.entries.len(), 1, "{format}: entry lost");

    let (decoded_record, captured) = &sink.entries[0];
    assert_eq!(decoded_record.path, record.path, "{format}");
    let bytes = decode_payload(captured, decoded_record).unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        content,
        "{format}: content mismatch"
    );
}

proptest! {
    #[test]
    fn prop_text_round_trip_all_formats(path in rel_path(), content in text_content()) {
        for format in ArchiveFormat::ALL {
            text_round_trip(format, &path, &content);
        }
    }

    #[test]
    fn prop_binary_round_trip_all_formats(
        path in rel_path(),
        bytes in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        for format in ArchiveFormat::ALL {
            let mut record = FileRecord::new(path.clone(), bytes.len() as u64, 0.0, 0o644);
            record.is_binary = true;
            record.encoding = "base64".to_string();
            let payload = BASE64.encode(&bytes).into_bytes();

            let header = ArchiveHeader::new(Path::new("/src"), 1, bytes.len() as u64);
            let codec = codec_for(format);
            let mut encoded = Vec::new();
            let mut stream = vec![(record, payload)].into_iter();
            codec.encode(&mut encoded, &header, &mut stream).unwrap();

            let mut sink = MemorySink::default();
            codec.decode(&mut BufReader::new(&encoded[..]), &mut sink).unwrap();
            prop_assert_eq!(sink.entries.len(), 1);
            let (decoded_record, captured) = &sink.entries[0];
            let restored = decode_payload(captured, decoded_record).unwrap();
            prop_assert_eq!(&restored, &bytes, "{} corrupted binary", format);
        }
    }

    #[test]
    fn prop_markdown_fences_never_break(
        runs in proptest::collection::vec(1usize..7, 1..5),
    ) {
        // Content made almost entirely of backtick runs is the worst case
        // for fence escaping.
        let content: String = runs
            .iter()
            .map(|n| format!("{}\n", "`".repeat(*n)))
            .collect();
        text_round_trip(ArchiveFormat::Markdown, "ticks.md", &content);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sanitize_never_escapes(raw in "[a-zA-Z0-9_./\\\\-]{1,40}") {
        let root = TempDir::new().unwrap();
        let resolved_root = root.path().canonicalize().unwrap();
        match sanitize(root.path(), &raw) {
            Ok(path) => {
                prop_assert!(path.starts_with(&resolved_root));
                prop_assert!(path != resolved_root);
            }
            Err(err) => prop_assert!(err.is_security()),
        }
    }

    #[test]
    fn prop_parse_size_accepts_valid(input in "[1-9][0-9]{0,4}(\\.[0-9]{1,2})?[KMGT]?B?") {
        prop_assert!(parse_size(&input).is_ok());
    }
}
