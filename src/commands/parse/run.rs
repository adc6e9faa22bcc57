use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ParseArgs;
use crate::error::PatentResult;
use crate::flat_text::render_patents;
use crate::model::{
    DEFAULT_TRACKED_FIELDS, FailureEntry, ParseCounts, ParseRunManifest, PatentField, SourceEntry,
};
use crate::parse::{ArchiveParse, HeadingSpacing, ParseOptions, parse_archive};
use crate::util::{
    load_skip_list, now_utc_string, sha256_file, sibling_path, utc_compact_string,
    write_json_pretty,
};

use super::output::{ErrorLog, OutputArchive};

pub fn run(args: ParseArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let fields = resolve_fields(&args.attributes)?;
    let options = ParseOptions {
        heading_spacing: if args.no_heading_space {
            HeadingSpacing::Plain
        } else {
            HeadingSpacing::Spaced
        },
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        sibling_path(
            &args.output,
            &format!("_manifest_{}.json", utc_compact_string(started_ts)),
        )
    });
    let error_log = ErrorLog::new(sibling_path(&args.output, "_error.txt"));
    let skip_list = load_skip_list(args.skip_list.as_deref())?;

    info!(
        archives = args.archives.len(),
        output = %args.output.display(),
        run_id = %run_id,
        "starting parse"
    );

    let mut output = OutputArchive::open(&args.output)?;
    let mut counts = ParseCounts::default();
    let mut sources = Vec::new();
    let mut members = Vec::new();
    let mut failures = Vec::new();

    for archive_path in &args.archives {
        counts.archive_count += 1;
        let member_name = output_member_name(archive_path);

        if skip_list.contains(&member_name) || output.contains(&member_name) {
            info!(archive = %archive_path.display(), member = %member_name, "skipping archive");
            counts.skipped_archive_count += 1;
            continue;
        }

        let (sha256, parsed) = match parse_input(archive_path, &options) {
            Ok(result) => result,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(archive = %archive_path.display(), error = %message, "archive failed");
                error_log.record(&member_name, "ArchiveError", &message)?;
                counts.archive_failures += 1;
                failures.push(FailureEntry {
                    name: member_name,
                    kind: "ArchiveError".to_string(),
                    message,
                });
                continue;
            }
        };

        for failure in &parsed.failures {
            let name = match failure.document_index {
                Some(index) => format!("{}#{index}", failure.source),
                None => failure.source.clone(),
            };
            error_log.record(&name, &failure.kind, &failure.message)?;
            failures.push(FailureEntry {
                name,
                kind: failure.kind.clone(),
                message: failure.message.clone(),
            });
        }

        counts.member_count += parsed.members.len();
        counts.document_failures += parsed.failure_count();
        sources.push(SourceEntry {
            path: archive_path.display().to_string(),
            sha256,
        });

        if parsed.patents.is_empty() {
            info!(archive = %archive_path.display(), "no patents parsed; nothing written");
        } else {
            let text = render_patents(&fields, &parsed.patents, args.line_ending);
            output.write_member(&member_name, &text)?;
            counts.patents_written += parsed.patents.len();
            info!(
                member = %member_name,
                patents = parsed.patents.len(),
                failures = parsed.failure_count(),
                "wrote archive member"
            );
        }

        members.extend(parsed.members);
    }

    output.finish()?;

    let manifest = ParseRunManifest {
        manifest_version: 1,
        run_id,
        status: if failures.is_empty() {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        command: render_parse_command(&args),
        output_path: args.output.display().to_string(),
        tracked_fields: fields.iter().map(|field| field.name().to_string()).collect(),
        counts,
        sources,
        members,
        failures,
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote parse run manifest");
    if !manifest.failures.is_empty() {
        info!(
            path = %error_log.path().display(),
            failures = manifest.failures.len(),
            "failures recorded in error log"
        );
    }
    info!(
        patents = manifest.counts.patents_written,
        archives = manifest.counts.archive_count,
        "parse completed"
    );

    Ok(())
}

/// Tracked attributes, defaulting to the standard set; a misspelled
/// attribute fails before any archive is read.
pub fn resolve_fields(attributes: &[String]) -> PatentResult<Vec<PatentField>> {
    if attributes.is_empty() {
        return Ok(DEFAULT_TRACKED_FIELDS.to_vec());
    }
    attributes
        .iter()
        .map(|name| PatentField::from_name(name))
        .collect()
}

/// `pftaps19760106_wk01.zip` becomes `pftaps19760106_wk01.txt`.
pub fn output_member_name(archive_path: &Path) -> String {
    let stem = archive_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}.txt")
}

fn parse_input(archive_path: &Path, options: &ParseOptions) -> Result<(String, ArchiveParse)> {
    let sha256 = sha256_file(archive_path)?;
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    let parsed = parse_archive(BufReader::new(file), options)
        .with_context(|| format!("failed to parse {}", archive_path.display()))?;
    Ok((sha256, parsed))
}

fn render_parse_command(args: &ParseArgs) -> String {
    let mut command = vec!["patent-fulltext".to_string(), "parse".to_string()];

    for path in &args.archives {
        command.push("--archive".to_string());
        command.push(path.display().to_string());
    }
    command.push("--output".to_string());
    command.push(args.output.display().to_string());
    if let Some(path) = &args.skip_list {
        command.push("--skip-list".to_string());
        command.push(path.display().to_string());
    }
    for attribute in &args.attributes {
        command.push("--attribute".to_string());
        command.push(attribute.clone());
    }
    command.push("--line-ending".to_string());
    command.push(args.line_ending.as_str().to_string());
    if args.no_heading_space {
        command.push("--no-heading-space".to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }

    command.join(" ")
}
