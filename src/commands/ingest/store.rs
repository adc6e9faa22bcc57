use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::flat_text::{FlatRecordParser, split_blocks};
use crate::model::PatentField;

use super::records::{PatentNumberParser, PatentRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub source: String,
    pub record_index: usize,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub records_parsed: usize,
    pub patents_inserted: usize,
    pub fulltexts_inserted: usize,
    pub citations_inserted: usize,
    pub failures: Vec<RecordFailure>,
}

/// Loads one flattened text blob inside a single transaction. Records that
/// cannot be turned into rows are reported and skipped; a database error
/// rolls the whole blob back.
pub fn ingest_text(connection: &mut Connection, source: &str, text: &str) -> Result<IngestOutcome> {
    let parser = FlatRecordParser::new(&PatentField::ALL);
    let numbers = PatentNumberParser::new()?;
    let mut outcome = IngestOutcome::default();
    let mut rows = Vec::new();

    for (index, block) in split_blocks(text).iter().enumerate() {
        outcome.records_parsed += 1;
        let record = parser.parse_block(block);
        match PatentRow::from_record(&record, &numbers) {
            Ok(row) => rows.push(row),
            Err(err) => {
                warn!(
                    source = %source,
                    record = index,
                    kind = err.kind(),
                    error = %err,
                    "skipping record"
                );
                outcome.failures.push(RecordFailure {
                    source: source.to_string(),
                    record_index: index,
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    let tx = connection
        .transaction()
        .context("failed to begin ingest transaction")?;

    {
        let mut ensure_patent = tx.prepare("INSERT OR IGNORE INTO patents(PNum) VALUES (?1)")?;
        let mut replace_data = tx.prepare(
            "INSERT OR REPLACE INTO patentdata(
               PNum, FieldType, ApplicationNumber, SeriesCode, ApplicationDate, Title
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut clear_fulltexts = tx.prepare("DELETE FROM fulltexts WHERE PNum = ?1")?;
        let mut insert_fulltext = tx.prepare(
            "INSERT INTO fulltexts(PNum, TextTypeId, Text)
             SELECT ?1, Id, ?3 FROM texttypes WHERE Name = ?2",
        )?;
        let mut insert_citation = tx.prepare(
            "INSERT OR IGNORE INTO citations(CitingPNum, CitedPNum) VALUES (?1, ?2)",
        )?;

        for row in &rows {
            ensure_patent
                .execute([row.number])
                .with_context(|| format!("failed to upsert patent {}", row.number))?;
            replace_data
                .execute(params![
                    row.number,
                    row.field_type,
                    row.application_number,
                    row.series_code,
                    row.application_date,
                    row.title,
                ])
                .with_context(|| format!("failed to store patentdata for {}", row.number))?;
            outcome.patents_inserted += 1;

            clear_fulltexts.execute([row.number])?;
            for (text_type, text) in &row.fulltexts {
                outcome.fulltexts_inserted += insert_fulltext
                    .execute(params![row.number, text_type.name(), text])
                    .with_context(|| {
                        format!("failed to store {} for {}", text_type.name(), row.number)
                    })?;
            }
        }

        // cited patents need a row even when they are never ingested themselves
        for row in &rows {
            for cited in &row.citations {
                ensure_patent.execute([cited])?;
                outcome.citations_inserted += insert_citation
                    .execute(params![row.number, cited])
                    .with_context(|| format!("failed to store citation {} -> {cited}", row.number))?;
            }
        }
    }

    tx.commit().context("failed to commit ingest transaction")?;

    debug!(
        source = %source,
        records = outcome.records_parsed,
        stored = outcome.patents_inserted,
        citations = outcome.citations_inserted,
        "ingested text blob"
    );

    Ok(outcome)
}
