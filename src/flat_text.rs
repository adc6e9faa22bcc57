//! Compact line-oriented form written between parsing and relational
//! ingestion. One block per patent:
//!
//! ```text
//! PATENT
//! PATENT NUMBER: 04000000
//! TITLE: Widget
//! ...
//! CLAIMS: first claim second claim
//! REFERENCES: 3000000;3100000
//!
//! ```
//!
//! Absent values are written as the literal `None`.

use std::collections::BTreeMap;

use crate::cli::LineEnding;
use crate::model::{Patent, PatentField};

pub const BLOCK_START: &str = "PATENT";
pub const CLAIMS_HEADER: &str = "CLAIMS";
pub const REFERENCES_HEADER: &str = "REFERENCES";
pub const ABSENT: &str = "None";

pub fn format_patent_as_lines(fields: &[PatentField], patent: &Patent) -> Vec<String> {
    let mut lines = Vec::with_capacity(fields.len() + 4);
    lines.push(BLOCK_START.to_string());

    for field in fields {
        lines.push(format!(
            "{}: {}",
            field.header(),
            field.get(patent).unwrap_or(ABSENT)
        ));
    }

    let claims = if patent.claims.is_empty() {
        ABSENT.to_string()
    } else {
        patent.claims.join(" ")
    };
    lines.push(format!("{CLAIMS_HEADER}: {claims}"));

    let references = patent
        .us_references
        .iter()
        .filter_map(|reference| reference.patent_number.as_deref())
        .collect::<Vec<_>>();
    let references = if references.is_empty() {
        ABSENT.to_string()
    } else {
        references.join(";")
    };
    lines.push(format!("{REFERENCES_HEADER}: {references}"));

    lines.push(String::new());
    lines
}

pub fn render_patents(fields: &[PatentField], patents: &[Patent], ending: LineEnding) -> String {
    patents
        .iter()
        .flat_map(|patent| format_patent_as_lines(fields, patent))
        .collect::<Vec<_>>()
        .join(ending.separator())
}

/// Splits a stream into per-patent line groups on `PATENT` lines. Stream
/// lines are separated by the detected line ending; values may still hold
/// embedded newlines.
pub fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let separator = LineEnding::detect(text).separator();
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for segment in text.split(separator) {
        if segment == BLOCK_START {
            if let Some(block) = current.replace(Vec::new()) {
                blocks.push(block);
            }
        } else if let Some(block) = current.as_mut() {
            block.push(segment);
        }
    }

    blocks.extend(current);
    blocks
}

/// Header → raw value for one block, exactly as written (`None` included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    pub values: BTreeMap<String, String>,
}

impl FlatRecord {
    pub fn raw(&self, header: &str) -> Option<&str> {
        self.values.get(header).map(String::as_str)
    }

    /// Value of `header`, treating a missing header and `None` alike.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.raw(header).filter(|value| *value != ABSENT)
    }

    pub fn field(&self, field: PatentField) -> Option<&str> {
        self.value(&field.header())
    }

    pub fn references(&self) -> Vec<&str> {
        self.raw(REFERENCES_HEADER)
            .map(|value| value.trim().split(';').collect())
            .unwrap_or_default()
    }
}

pub struct FlatRecordParser {
    headers: Vec<String>,
}

impl FlatRecordParser {
    pub fn new(fields: &[PatentField]) -> Self {
        let mut headers = fields.iter().map(|field| field.header()).collect::<Vec<_>>();
        headers.push(CLAIMS_HEADER.to_string());
        headers.push(REFERENCES_HEADER.to_string());
        Self { headers }
    }

    /// Lines following a recognised `HEADER: ` line belong to that header
    /// until the next recognised header.
    pub fn parse_block(&self, block: &[&str]) -> FlatRecord {
        let mut lines = Vec::new();
        for segment in block {
            if segment.is_empty() {
                lines.push("");
            } else {
                lines.extend(segment.lines());
            }
        }
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }

        let mut collected = BTreeMap::<String, Vec<&str>>::new();
        let mut current_header: Option<&str> = None;

        for line in lines {
            if let Some((header, data)) = self.split_header(line) {
                current_header = Some(header);
                collected.entry(header.to_string()).or_default().push(data);
            } else if let Some(header) = current_header {
                collected.entry(header.to_string()).or_default().push(line);
            }
        }

        FlatRecord {
            values: collected
                .into_iter()
                .map(|(header, data)| (header, data.join("\n")))
                .collect(),
        }
    }

    fn split_header<'a>(&'a self, line: &'a str) -> Option<(&'a str, &'a str)> {
        self.headers.iter().find_map(|header| {
            line.strip_prefix(header.as_str())
                .and_then(|rest| rest.strip_prefix(": "))
                .map(|data| (header.as_str(), data))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DEFAULT_TRACKED_FIELDS, USReference};

    fn sample_patent() -> Patent {
        Patent {
            patent_number: Some("04000000".to_string()),
            application_number: Some("05/123456".to_string()),
            application_date: Some("19750102".to_string()),
            title: Some("Widget assembly".to_string()),
            r#abstract: Some("First line.\nSecond line.".to_string()),
            claims: vec!["1. A widget.".to_string(), "2. The widget of claim 1.".to_string()],
            us_references: vec![
                USReference {
                    patent_number: Some("3000000".to_string()),
                    ..USReference::default()
                },
                USReference {
                    patent_number: Some("D0250000".to_string()),
                    ..USReference::default()
                },
            ],
            ..Patent::default()
        }
    }

    #[test]
    fn format_patent_as_lines_writes_fixed_order_block() {
        let lines = format_patent_as_lines(&DEFAULT_TRACKED_FIELDS, &sample_patent());

        assert_eq!(lines[0], "PATENT");
        assert_eq!(lines[1], "PATENT NUMBER: 04000000");
        assert_eq!(lines[2], "SERIES CODE: None");
        assert_eq!(lines[11], "CLAIMS: 1. A widget. 2. The widget of claim 1.");
        assert_eq!(lines[12], "REFERENCES: 3000000;D0250000");
        assert_eq!(lines[13], "");
        assert_eq!(lines.len(), 14);
    }

    #[test]
    fn empty_claims_and_references_render_as_none() {
        let patent = Patent {
            patent_number: Some("1".to_string()),
            ..Patent::default()
        };
        let lines = format_patent_as_lines(&[PatentField::PatentNumber], &patent);
        assert_eq!(lines[2], "CLAIMS: None");
        assert_eq!(lines[3], "REFERENCES: None");
    }

    #[test]
    fn rendered_blocks_parse_back_to_same_values_for_both_line_endings() {
        let patents = vec![sample_patent(), Patent::default()];
        let parser = FlatRecordParser::new(&DEFAULT_TRACKED_FIELDS);

        for ending in [LineEnding::Crlf, LineEnding::Lf] {
            let text = render_patents(&DEFAULT_TRACKED_FIELDS, &patents, ending);
            let blocks = split_blocks(&text);
            assert_eq!(blocks.len(), 2);

            let first = parser.parse_block(&blocks[0]);
            assert_eq!(first.field(PatentField::PatentNumber), Some("04000000"));
            assert_eq!(first.field(PatentField::Abstract), Some("First line.\nSecond line."));
            assert_eq!(first.field(PatentField::SeriesCode), None);
            assert_eq!(first.raw("SERIES CODE"), Some("None"));
            assert_eq!(first.references(), vec!["3000000", "D0250000"]);

            let second = parser.parse_block(&blocks[1]);
            assert_eq!(second.raw("PATENT NUMBER"), Some("None"));
            assert_eq!(second.references(), vec!["None"]);
        }
    }

    #[test]
    fn parse_block_keeps_blank_lines_inside_values_and_unknown_prefixes() {
        let parser = FlatRecordParser::new(&[PatentField::Title, PatentField::Description]);
        let block = vec![
            "TITLE: Gear",
            "DESCRIPTION: BACKGROUND ",
            "",
            "NOTE: not a header",
            "CLAIMS: None",
            "REFERENCES: None",
            "",
        ];

        let record = parser.parse_block(&block);
        assert_eq!(
            record.value("DESCRIPTION"),
            Some("BACKGROUND \n\nNOTE: not a header")
        );
        assert_eq!(record.value("CLAIMS"), None);
        assert_eq!(record.raw("REFERENCES"), Some("None"));
    }

    #[test]
    fn split_blocks_ignores_patent_inside_values() {
        let text = "PATENT\nTITLE: Improved PATENT\nPATENT\nTITLE: Other\n";
        let blocks = split_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], vec!["TITLE: Improved PATENT"]);
    }
}
