use std::iter::Skip;
use std::str::Lines;

use crate::error::{PatentError, PatentResult};
use crate::model::{Inventor, Patent, PatentClassification, PatentField, USReference};

use super::ParseOptions;
use super::namespace::{Namespace, Tag};

const PATENT_BOUNDARY: &str = "PATN";
const INVENTOR_NAMESPACE: &str = "INVT";

const PATN_FIELDS: &[(&str, PatentField)] = &[
    ("WKU", PatentField::PatentNumber),
    ("SRC", PatentField::SeriesCode),
    ("APN", PatentField::ApplicationNumber),
    ("APT", PatentField::ApplicationType),
    ("APD", PatentField::ApplicationDate),
    ("TTL", PatentField::Title),
    ("EXP", PatentField::PrimaryExaminer),
    ("ISD", PatentField::Date),
    ("ART", PatentField::ArtUnit),
];

const RLAP_FIELDS: &[(&str, PatentField)] = &[
    ("COD", PatentField::ParentCode),
    ("APN", PatentField::ParentApplicationNumber),
    ("PSC", PatentField::ParentStatusCode),
];

/// Lazily splits a weekly legacy file into per-patent line groups.
pub struct ApsChunks<'a> {
    lines: Skip<Lines<'a>>,
    current: Option<Vec<&'a str>>,
}

impl<'a> Iterator for ApsChunks<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        for raw_line in self.lines.by_ref() {
            // trailing blanks and empty lines both occur inside real patents
            let line = raw_line.trim_end();
            if line.is_empty() {
                continue;
            }

            if line == PATENT_BOUNDARY {
                let finished = self.current.replace(vec![line]);
                if finished.is_some() {
                    return finished;
                }
            } else if let Some(current) = self.current.as_mut() {
                current.push(line);
            }
        }

        self.current.take()
    }
}

/// The first line of a legacy file is a manifest header and never data.
pub fn chunk_aps(text: &str) -> ApsChunks<'_> {
    ApsChunks {
        lines: text.lines().skip(1),
        current: None,
    }
}

pub fn parse_aps_namespaces(lines: &[&str]) -> PatentResult<Vec<Namespace>> {
    let mut namespaces = Vec::<Namespace>::new();
    // (namespace index, tag index) of the field continuation lines extend
    let mut last_field: Option<(usize, usize)> = None;

    for (line_index, &raw_line) in lines.iter().enumerate() {
        // pftaps19800101_wk01.txt carries data glued onto an INVT header
        let line = if raw_line.starts_with(INVENTOR_NAMESPACE) {
            INVENTOR_NAMESPACE
        } else {
            raw_line
        };

        if line.chars().count() == 4 {
            namespaces.push(Namespace::new(line));
            continue;
        }

        let (key, data) = split_field_line(line);
        if key.trim().is_empty() {
            let Some((namespace_index, tag_index)) = last_field else {
                return Err(PatentError::MalformedInput(format!(
                    "continuation line {} precedes any field",
                    line_index + 1
                )));
            };
            namespaces[namespace_index].tags[tag_index]
                .data
                .push_str(data);
            continue;
        }

        let namespace_index = namespaces.len().checked_sub(1).ok_or_else(|| {
            PatentError::MalformedInput(format!(
                "field line {} ({key}) precedes any namespace",
                line_index + 1
            ))
        })?;
        let namespace = &mut namespaces[namespace_index];
        namespace.push_tag(Tag::new(key, data));
        last_field = Some((namespace_index, namespace.tags.len() - 1));
    }

    Ok(namespaces)
}

pub fn parse_aps_chunk(lines: &[&str], options: &ParseOptions) -> PatentResult<Patent> {
    let namespaces = parse_aps_namespaces(lines)?;
    let mut patent = Patent {
        country: Some("US".to_string()),
        ..Patent::default()
    };

    for namespace in &namespaces {
        match namespace.name.as_str() {
            "PATN" => apply_field_table(namespace, PATN_FIELDS, &mut patent),
            "RLAP" => apply_field_table(namespace, RLAP_FIELDS, &mut patent),
            "ABST" => patent.r#abstract = Some(namespace.as_paragraphs(options.heading_spacing)),
            "BSUM" => {
                patent.brief_summary = Some(namespace.as_paragraphs(options.heading_spacing))
            }
            "DETD" => patent.description = Some(namespace.as_paragraphs(options.heading_spacing)),
            "DCLM" => {
                patent.design_claims = Some(namespace.as_paragraphs(options.heading_spacing))
            }
            "CLAS" => patent.patent_classification = Some(classification_from_aps(namespace)),
            "INVT" => patent.inventors.push(inventor_from_aps(namespace)),
            "UREF" => patent.us_references.push(reference_from_aps(namespace)),
            "CLMS" => patent.claims = claims_from_aps(namespace),
            _ => {}
        }
    }

    Ok(patent)
}

/// Groups each run of consecutive paragraph tags into one newline-joined claim.
pub fn claims_from_aps(namespace: &Namespace) -> Vec<String> {
    let mut claims = Vec::new();
    let mut current = Vec::<&str>::new();

    for tag in &namespace.tags {
        if tag.is_paragraph() {
            current.push(&tag.data);
        } else if !current.is_empty() {
            claims.push(current.join("\n"));
            current.clear();
        }
    }

    if !current.is_empty() {
        claims.push(current.join("\n"));
    }

    claims
}

fn apply_field_table(namespace: &Namespace, table: &[(&str, PatentField)], patent: &mut Patent) {
    for (key, field) in table {
        *field.slot_mut(patent) = namespace.joined(key);
    }
}

fn inventor_from_aps(namespace: &Namespace) -> Inventor {
    Inventor {
        name: namespace.joined("NAM"),
        country: namespace.joined("CNT"),
        city: namespace.joined("CTY"),
        state: namespace.joined("STA"),
        zip_code: namespace.joined("ZIP"),
    }
}

fn classification_from_aps(namespace: &Namespace) -> PatentClassification {
    PatentClassification {
        us_classification: namespace.joined("OCL"),
        cross_reference: namespace.joined("XCL"),
        unofficial_reference: namespace.joined("UCL"),
        digest_reference: namespace.joined("DCL"),
        edition_field: namespace.joined("EDF"),
        international_classification: namespace.joined("ICL"),
        field_of_search_class: namespace.joined("FSC"),
        field_of_search_subclasses: namespace.joined("FSS"),
    }
}

fn reference_from_aps(namespace: &Namespace) -> USReference {
    USReference {
        patent_number: namespace.joined("PNO"),
        issue_date: namespace.joined("ISD"),
        patentee_name: namespace.joined("NAM"),
        country: namespace.joined("CNT"),
    }
}

/// `KEY  DATA`: three key characters, two separator characters, payload.
fn split_field_line(line: &str) -> (&str, &str) {
    let key_end = char_boundary(line, 3);
    let data_start = char_boundary(line, 5);
    (&line[..key_end], &line[data_start..])
}

fn char_boundary(line: &str, char_count: usize) -> usize {
    line.char_indices()
        .nth(char_count)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}
