use std::fs;
use std::io::{Cursor, Write};

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::db_setup::{STORE_TABLES, count_rows, ensure_schema};
use super::records::{PatentNumber, PatentNumberParser, PatentRow, TextType, digits_only, safe_date};
use super::run;
use super::store::ingest_text;
use crate::cli::{IngestArgs, LineEnding};
use crate::flat_text::{FlatRecordParser, render_patents, split_blocks};
use crate::model::{DEFAULT_TRACKED_FIELDS, Patent, PatentField, USReference};

fn memory_store() -> Connection {
    let connection = Connection::open_in_memory().expect("open in-memory db");
    ensure_schema(&connection).expect("schema");
    connection
}

fn reference(number: &str) -> USReference {
    USReference {
        patent_number: Some(number.to_string()),
        ..USReference::default()
    }
}

fn sample_text() -> String {
    let utility = Patent {
        patent_number: Some("04000000".to_string()),
        series_code: Some("05".to_string()),
        application_number: Some("05/123456".to_string()),
        application_date: Some("19810230".to_string()),
        title: Some("Widget".to_string()),
        r#abstract: Some("An abstract.".to_string()),
        claims: vec!["1. A widget.".to_string()],
        us_references: vec![reference("3000000"), reference("D0250000"), reference("bogus")],
        ..Patent::default()
    };
    let design = Patent {
        patent_number: Some("D0260000".to_string()),
        design_claims: Some("The ornamental design for a widget.".to_string()),
        us_references: vec![reference("3000000")],
        ..Patent::default()
    };
    let unnumbered = Patent {
        title: Some("Lost".to_string()),
        ..Patent::default()
    };

    render_patents(
        &DEFAULT_TRACKED_FIELDS,
        &[utility, design, unnumbered],
        LineEnding::Crlf,
    )
}

#[test]
fn ensure_schema_is_idempotent_and_seeds_text_types() {
    let connection = memory_store();
    ensure_schema(&connection).expect("second schema pass");

    assert_eq!(count_rows(&connection, "texttypes").expect("count"), 4);
    for table in STORE_TABLES {
        assert!(count_rows(&connection, table).is_ok(), "missing table {table}");
    }

    let version: String = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version");
    assert_eq!(version, super::DB_SCHEMA_VERSION);
}

#[test]
fn foreign_keys_reject_orphan_citations() {
    let connection = memory_store();
    let enabled: i64 = connection
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .expect("pragma");
    assert_eq!(enabled, 1);

    assert!(
        connection
            .execute("INSERT INTO citations(CitingPNum, CitedPNum) VALUES (1, 2)", [])
            .is_err()
    );
}

#[test]
fn safe_date_walks_back_overflowing_days() {
    assert_eq!(
        safe_date("19810230").expect("repaired"),
        NaiveDate::from_ymd_opt(1981, 2, 28).expect("date")
    );
    assert_eq!(
        safe_date("19840231").expect("repaired"),
        NaiveDate::from_ymd_opt(1984, 2, 29).expect("date")
    );
    assert_eq!(
        safe_date("19810301").expect("valid"),
        NaiveDate::from_ymd_opt(1981, 3, 1).expect("date")
    );
}

#[test]
fn safe_date_rejects_other_malformations() {
    for raw in ["1981023", "19811301", "19810200", "19810232", "1981-2-1", "None"] {
        let err = safe_date(raw).expect_err(raw);
        assert_eq!(err.kind(), "InvalidDateError");
    }
}

#[test]
fn patent_numbers_split_letter_prefix() {
    let numbers = PatentNumberParser::new().expect("parser");

    assert_eq!(
        numbers.parse("04500000").expect("numeric"),
        PatentNumber {
            prefix: None,
            number: 4_500_000
        }
    );
    assert_eq!(
        numbers.parse("D0250000").expect("design"),
        PatentNumber {
            prefix: Some("D".to_string()),
            number: 250_000
        }
    );
    assert_eq!(
        numbers.parse("RE028671").expect("reissue").prefix.as_deref(),
        Some("RE")
    );

    for raw in ["abc", "", "None", "12a"] {
        let err = numbers.parse(raw).expect_err(raw);
        assert_eq!(err.kind(), "InvalidPatentNumberError");
    }
}

#[test]
fn application_numbers_keep_digits_only() {
    assert_eq!(digits_only("05/123,456"), "05123456");
    assert_eq!(digits_only("n/a"), "");
}

#[test]
fn patent_row_collects_fulltexts_and_valid_citations() {
    let text = sample_text();
    let blocks = split_blocks(&text);
    let parser = FlatRecordParser::new(&DEFAULT_TRACKED_FIELDS);
    let numbers = PatentNumberParser::new().expect("parser");

    let row = PatentRow::from_record(&parser.parse_block(&blocks[0]), &numbers).expect("row");
    assert_eq!(row.number, 4_000_000);
    assert_eq!(row.field_type, None);
    assert_eq!(row.application_number, Some(5_123_456));
    assert_eq!(row.series_code.as_deref(), Some("05"));
    assert_eq!(
        row.application_date,
        NaiveDate::from_ymd_opt(1981, 2, 28).map(|date| date.num_days_from_ce())
    );
    assert_eq!(row.title.as_deref(), Some("Widget"));
    assert_eq!(
        row.fulltexts,
        vec![
            (TextType::Abstract, "An abstract.".to_string()),
            (TextType::Claims, "1. A widget.".to_string()),
        ]
    );
    assert_eq!(row.citations, vec![3_000_000, 250_000]);

    let design = PatentRow::from_record(&parser.parse_block(&blocks[1]), &numbers).expect("row");
    assert_eq!(design.field_type.as_deref(), Some("D"));
    assert_eq!(design.application_date, None);
    assert_eq!(design.title, None);
    assert_eq!(design.fulltexts[0].0, TextType::Claims);
}

#[test]
fn ingest_text_stores_rows_placeholders_and_reports_bad_records() {
    let mut connection = memory_store();
    let outcome = ingest_text(&mut connection, "week01.txt", &sample_text()).expect("ingest");

    assert_eq!(outcome.records_parsed, 3);
    assert_eq!(outcome.patents_inserted, 2);
    assert_eq!(outcome.fulltexts_inserted, 3);
    assert_eq!(outcome.citations_inserted, 3);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].record_index, 2);
    assert_eq!(outcome.failures[0].kind, "InvalidPatentNumberError");

    // 4000000, 260000 and the cited-only 3000000 and 250000
    assert_eq!(count_rows(&connection, "patents").expect("count"), 4);
    assert_eq!(count_rows(&connection, "patentdata").expect("count"), 2);
    assert_eq!(count_rows(&connection, "citations").expect("count"), 3);

    let (field_type, application_number, title): (Option<String>, Option<i64>, Option<String>) =
        connection
            .query_row(
                "SELECT FieldType, ApplicationNumber, Title FROM patentdata WHERE PNum = 260000",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("design row");
    assert_eq!(field_type.as_deref(), Some("D"));
    assert_eq!(application_number, None);
    assert_eq!(title, None);

    let claims_type: String = connection
        .query_row(
            "SELECT t.Name FROM fulltexts f JOIN texttypes t ON t.Id = f.TextTypeId
             WHERE f.PNum = 260000",
            [],
            |row| row.get(0),
        )
        .expect("design claims");
    assert_eq!(claims_type, "CLAIMS");
}

#[test]
fn reingesting_the_same_text_does_not_duplicate_rows() {
    let mut connection = memory_store();
    let text = sample_text();
    ingest_text(&mut connection, "week01.txt", &text).expect("first ingest");
    let again = ingest_text(&mut connection, "week01.txt", &text).expect("second ingest");

    assert_eq!(again.citations_inserted, 0);
    assert_eq!(count_rows(&connection, "patents").expect("count"), 4);
    assert_eq!(count_rows(&connection, "fulltexts").expect("count"), 3);
    assert_eq!(count_rows(&connection, "citations").expect("count"), 3);
}

#[test]
fn empty_text_ingests_nothing() {
    let mut connection = memory_store();
    let outcome = ingest_text(&mut connection, "empty.txt", "").expect("ingest");
    assert_eq!(outcome.records_parsed, 0);
    assert_eq!(count_rows(&connection, "patents").expect("count"), 0);
}

#[test]
fn ingest_text_reads_blocks_rendered_with_custom_attributes() {
    let patent = Patent {
        patent_number: Some("04000000".to_string()),
        kind: Some("A".to_string()),
        date: Some("19770104".to_string()),
        title: Some("Widget".to_string()),
        ..Patent::default()
    };
    let text = render_patents(
        &[PatentField::PatentNumber, PatentField::Kind, PatentField::Date, PatentField::Title],
        &[patent],
        LineEnding::Lf,
    );

    let mut connection = memory_store();
    let outcome = ingest_text(&mut connection, "custom.txt", &text).expect("ingest");

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.patents_inserted, 1);
    let title: Option<String> = connection
        .query_row("SELECT Title FROM patentdata WHERE PNum = 4000000", [], |row| {
            row.get(0)
        })
        .expect("patentdata row");
    assert_eq!(title.as_deref(), Some("Widget"));
}

#[test]
fn run_records_unopenable_member_and_ingests_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive_path = dir.path().join("flat.zip");

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("week00.txt", options).expect("start broken");
    writer.write_all(sample_text().as_bytes()).expect("write broken");
    writer.start_file("week01.txt", options).expect("start member");
    writer.write_all(sample_text().as_bytes()).expect("write member");
    let mut bytes = writer.finish().expect("finish").into_inner();
    // first local header sits at offset 0; the central directory stays intact
    bytes[0] = b'X';
    fs::write(&archive_path, bytes).expect("write archive");

    let manifest_path = dir.path().join("ingest.json");
    run(IngestArgs {
        archive: archive_path,
        db_path: dir.path().join("patents.db"),
        skip_list: None,
        manifest_path: Some(manifest_path.clone()),
    })
    .expect("ingest run");

    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&manifest_path).expect("manifest")).expect("json");
    assert_eq!(manifest["status"], "completed_with_failures");
    assert_eq!(manifest["counts"]["member_count"], 1);
    assert_eq!(manifest["counts"]["failed_member_count"], 1);
    assert_eq!(manifest["counts"]["patents_total"], 4);
    assert_eq!(manifest["failures"][0]["name"], "#0");
    assert_eq!(manifest["failures"][0]["kind"], "ArchiveMemberError");
}
