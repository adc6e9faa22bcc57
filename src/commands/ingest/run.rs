use std::fs::File;
use std::io::{BufReader, Read};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::cli::IngestArgs;
use crate::model::{FailureEntry, IngestCounts, IngestRunManifest, SourceEntry};
use crate::util::{
    load_skip_list, now_utc_string, sha256_file, sibling_path, utc_compact_string,
    write_json_pretty,
};

use super::DB_SCHEMA_VERSION;
use super::db_setup::{count_rows, initialize_store};
use super::store::ingest_text;

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        sibling_path(
            &args.db_path,
            &format!("_ingest_{}.json", utc_compact_string(started_ts)),
        )
    });

    info!(
        archive = %args.archive.display(),
        db_path = %args.db_path.display(),
        run_id = %run_id,
        "starting ingest"
    );

    let skip_list = load_skip_list(args.skip_list.as_deref())?;
    let source = SourceEntry {
        path: args.archive.display().to_string(),
        sha256: sha256_file(&args.archive)?,
    };

    let mut connection = initialize_store(&args.db_path)?;

    let file = File::open(&args.archive)
        .with_context(|| format!("failed to open {}", args.archive.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read zip archive {}", args.archive.display()))?;

    let mut counts = IngestCounts::default();
    let mut failures = Vec::new();
    let mut warnings = Vec::new();

    for index in 0..archive.len() {
        let mut member = match archive.by_index(index) {
            Ok(member) => member,
            Err(err) => {
                warn!(member = index, error = %err, "failed to open archive member");
                counts.failed_member_count += 1;
                failures.push(FailureEntry {
                    name: format!("#{index}"),
                    kind: "ArchiveMemberError".to_string(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        if member.is_dir() {
            continue;
        }

        let name = member.name().to_string();
        if skip_list.contains(&name) {
            info!(member = %name, "skipping listed member");
            counts.skipped_member_count += 1;
            continue;
        }
        counts.member_count += 1;

        let mut raw = Vec::new();
        if let Err(err) = member.read_to_end(&mut raw) {
            warn!(member = %name, error = %err, "failed to read archive member");
            counts.failed_member_count += 1;
            failures.push(FailureEntry {
                name,
                kind: "ArchiveMemberError".to_string(),
                message: err.to_string(),
            });
            continue;
        }

        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => {
                warnings.push(format!("{name}: invalid UTF-8 replaced"));
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };

        match ingest_text(&mut connection, &name, &text) {
            Ok(outcome) => {
                info!(
                    member = %name,
                    records = outcome.records_parsed,
                    stored = outcome.patents_inserted,
                    fulltexts = outcome.fulltexts_inserted,
                    citations = outcome.citations_inserted,
                    failures = outcome.failures.len(),
                    "ingested member"
                );
                counts.records_parsed += outcome.records_parsed;
                counts.patents_inserted += outcome.patents_inserted;
                counts.fulltexts_inserted += outcome.fulltexts_inserted;
                counts.citations_inserted += outcome.citations_inserted;
                counts.record_failures += outcome.failures.len();
                failures.extend(outcome.failures.into_iter().map(|failure| FailureEntry {
                    name: format!("{}#{}", failure.source, failure.record_index),
                    kind: failure.kind,
                    message: failure.message,
                }));
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(member = %name, error = %message, "member rolled back");
                counts.failed_member_count += 1;
                failures.push(FailureEntry {
                    name,
                    kind: "IngestError".to_string(),
                    message,
                });
            }
        }
    }

    counts.patents_total = count_rows(&connection, "patents")?;
    counts.citations_total = count_rows(&connection, "citations")?;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: if failures.is_empty() {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        db_path: args.db_path.display().to_string(),
        source,
        counts,
        failures,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote ingest run manifest");
    info!(
        patents = manifest.counts.patents_total,
        citations = manifest.counts.citations_total,
        failures = manifest.failures.len(),
        "ingest completed"
    );

    Ok(())
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "patent-fulltext".to_string(),
        "ingest".to_string(),
        "--archive".to_string(),
        args.archive.display().to_string(),
        "--db-path".to_string(),
        args.db_path.display().to_string(),
    ];

    if let Some(path) = &args.skip_list {
        command.push("--skip-list".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }

    command.join(" ")
}
