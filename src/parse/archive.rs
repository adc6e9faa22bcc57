use std::io::{Read, Seek};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::model::{MemberSummary, Patent};

use super::{Dialect, DocumentFailure, ParseOptions};

/// Bytes inspected when sniffing a member's dialect from its header.
const SNIFF_BYTES: usize = 4096;

#[derive(Debug, Default)]
pub struct ArchiveParse {
    pub patents: Vec<Patent>,
    pub failures: Vec<DocumentFailure>,
    pub members: Vec<MemberSummary>,
}

impl ArchiveParse {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Parses every member of a bulk full-text archive whose name matches a
/// known dialect. A broken document or member is recorded and skipped.
pub fn parse_archive<R: Read + Seek>(reader: R, options: &ParseOptions) -> Result<ArchiveParse> {
    let mut archive = ZipArchive::new(reader).context("failed to open zip archive")?;
    let mut result = ArchiveParse::default();

    for index in 0..archive.len() {
        let mut member = match archive.by_index(index) {
            Ok(member) => member,
            Err(err) => {
                warn!(member = index, error = %err, "failed to open archive member");
                result.failures.push(DocumentFailure {
                    source: format!("#{index}"),
                    document_index: None,
                    kind: "ArchiveMemberError".to_string(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        let name = member.name().to_string();

        if member.is_dir() {
            continue;
        }
        if Dialect::from_member_name(&name).is_none() {
            debug!(member = %name, "skipping member with unknown dialect");
            continue;
        }

        let mut raw = Vec::new();
        if let Err(err) = member.read_to_end(&mut raw) {
            warn!(member = %name, error = %err, "failed to read archive member");
            result.failures.push(DocumentFailure {
                source: name.clone(),
                document_index: None,
                kind: "ArchiveMemberError".to_string(),
                message: err.to_string(),
            });
            continue;
        }

        let text = String::from_utf8_lossy(&raw);
        let Some(dialect) = Dialect::detect(&name, head(&text, SNIFF_BYTES)) else {
            continue;
        };

        let parsed = dialect.parse_buffer(&name, &text, options)?;
        info!(
            member = %name,
            dialect = dialect.as_str(),
            patents = parsed.patents.len(),
            failures = parsed.failures.len(),
            "parsed archive member"
        );

        result.members.push(MemberSummary {
            name,
            dialect: dialect.as_str().to_string(),
            patents: parsed.patents.len(),
            failures: parsed.failures.len(),
        });
        result.patents.extend(parsed.patents);
        result.failures.extend(parsed.failures);
    }

    Ok(result)
}

fn head(text: &str, limit: usize) -> &str {
    let mut end = limit.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
