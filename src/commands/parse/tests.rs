use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::output::{ErrorLog, OutputArchive};
use super::run::{output_member_name, resolve_fields, run};
use crate::cli::{LineEnding, ParseArgs};
use crate::model::{DEFAULT_TRACKED_FIELDS, PatentField};

const APS_WEEK: &str = "HHHHHT APS1\r
PATN\r
WKU  039302155\r
APD  19740305\r
TTL  Widget\r
UREF\r
PNO  3000000\r
PATN\r
     stray continuation\r
";

fn write_input_archive(path: &Path, member: &str, text: &str) {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(member, SimpleFileOptions::default())
        .expect("start member");
    writer.write_all(text.as_bytes()).expect("write member");
    let bytes = writer.finish().expect("finish").into_inner();
    fs::write(path, bytes).expect("write archive");
}

fn read_member(path: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(fs::File::open(path).expect("open")).expect("zip");
    let mut member = archive.by_name(name).expect("member");
    let mut text = String::new();
    member.read_to_string(&mut text).expect("read");
    text
}

fn parse_args(archives: Vec<PathBuf>, output: PathBuf) -> ParseArgs {
    ParseArgs {
        archives,
        output,
        skip_list: None,
        attributes: Vec::new(),
        line_ending: LineEnding::Crlf,
        no_heading_space: false,
        manifest_path: None,
    }
}

#[test]
fn resolve_fields_defaults_and_rejects_unknown_attributes() {
    assert_eq!(resolve_fields(&[]).expect("defaults"), DEFAULT_TRACKED_FIELDS.to_vec());
    assert_eq!(
        resolve_fields(&["title".to_string(), "art_unit".to_string()]).expect("fields"),
        vec![PatentField::Title, PatentField::ArtUnit]
    );

    let err = resolve_fields(&["titel".to_string()]).expect_err("typo");
    assert_eq!(err.kind(), "InvalidFieldError");
}

#[test]
fn output_member_name_swaps_extension() {
    assert_eq!(
        output_member_name(Path::new("/data/pftaps19760106_wk01.zip")),
        "pftaps19760106_wk01.txt"
    );
}

#[test]
fn output_archive_appends_to_existing_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("patents.zip");

    let mut output = OutputArchive::open(&path).expect("create");
    output.write_member("a.txt", "first").expect("write a");
    output.finish().expect("finish");

    let mut output = OutputArchive::open(&path).expect("reopen");
    assert!(output.contains("a.txt"));
    assert!(!output.contains("b.txt"));
    output.write_member("b.txt", "second").expect("write b");
    output.finish().expect("finish");

    assert_eq!(read_member(&path, "a.txt"), "first");
    assert_eq!(read_member(&path, "b.txt"), "second");
}

#[test]
fn error_log_appends_single_line_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = ErrorLog::new(dir.path().join("patents_error.txt"));

    log.record("a.txt", "ArchiveError", "bad\nzip").expect("first");
    log.record("b.txt#3", "InvalidDocumentError", "no root").expect("second");

    let contents = fs::read_to_string(log.path()).expect("read log");
    assert_eq!(
        contents,
        "a.txt;ArchiveError;bad zip\r\nb.txt#3;InvalidDocumentError;no root\r\n"
    );
}

#[test]
fn run_writes_member_error_log_and_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("pftaps19760106_wk01.zip");
    write_input_archive(&input, "pftaps19760106_wk01.txt", APS_WEEK);
    let broken = dir.path().join("ipg140816.zip");
    fs::write(&broken, b"not a zip").expect("write broken");

    let output = dir.path().join("out").join("patents.zip");
    let mut args = parse_args(vec![input.clone(), broken], output.clone());
    args.manifest_path = Some(dir.path().join("manifest.json"));
    run(args).expect("parse run");

    let text = read_member(&output, "pftaps19760106_wk01.txt");
    assert!(text.starts_with("PATENT\r\nPATENT NUMBER: 039302155\r\n"));
    assert!(text.contains("\r\nTITLE: Widget\r\n"));
    assert!(text.contains("\r\nREFERENCES: 3000000\r\n"));

    let log = fs::read_to_string(dir.path().join("out").join("patents_error.txt")).expect("log");
    let lines = log.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("pftaps19760106_wk01.txt#1;MalformedInputError;"));
    assert!(lines[1].starts_with("ipg140816.txt;ArchiveError;"));

    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("manifest.json")).expect("manifest"),
    )
    .expect("manifest json");
    assert_eq!(manifest["status"], "completed_with_failures");
    assert_eq!(manifest["counts"]["patents_written"], 1);
    assert_eq!(manifest["counts"]["archive_failures"], 1);
    assert_eq!(manifest["counts"]["document_failures"], 1);

    // a second run finds the member already present and skips the archive
    let mut again = parse_args(vec![input], output.clone());
    again.manifest_path = Some(dir.path().join("manifest-2.json"));
    run(again).expect("second run");
    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("manifest-2.json")).expect("manifest"),
    )
    .expect("manifest json");
    assert_eq!(manifest["counts"]["skipped_archive_count"], 1);
}
