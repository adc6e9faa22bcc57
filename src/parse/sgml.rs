use crate::error::{PatentError, PatentResult};
use crate::model::{Inventor, Patent, PatentClassification, USReference};

use super::join_non_empty;
use super::markup::{Element, parse_markup};
use super::tagged::TaggedChunks;

pub fn chunk_sgml(text: &str) -> TaggedChunks<'_> {
    TaggedChunks::new(text, "PATDOC")
}

pub fn parse_sgml_chunk(chunk: &str) -> PatentResult<Patent> {
    let document = parse_markup(chunk)?;
    let root = document
        .find("patdoc")
        .ok_or_else(|| PatentError::InvalidDocument("no PATDOC element in chunk".to_string()))?;

    let patent_number = root
        .find_text("b110")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PatentError::InvalidDocument("PATDOC without B110 number".to_string()))?;

    let claims = root
        .find("cl")
        .map(|claims| {
            claims
                .find_all("clm")
                .into_iter()
                .map(|claim| claim.text().trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Patent {
        patent_number: Some(patent_number),
        date: root.find_text("b140"),
        country: root.find_text("b190"),
        kind: root.find_text("b130"),
        // archival line-wrapping leaves whitespace inside these values
        application_number: root.find_text("b210").map(|value| strip_whitespace(&value)),
        application_date: root.find_text("b220").map(|value| strip_whitespace(&value)),
        title: root.find_text("b540"),
        primary_examiner: root.find("b746").map(name_or_text),
        r#abstract: root.find_text("sdoab"),
        brief_summary: root.find_text("brfsum"),
        description: root.find_text("detdesc"),
        claims,
        inventors: root.find_all("b721").into_iter().map(inventor_from_sgml).collect(),
        us_references: root
            .find_all("b561")
            .into_iter()
            .filter_map(reference_from_sgml)
            .collect(),
        patent_classification: classification_from_sgml(root),
        ..Patent::default()
    })
}

fn inventor_from_sgml(tag: &Element) -> Inventor {
    Inventor {
        name: tag.find("nam").map(name_or_text),
        city: tag.find_text("city"),
        country: tag.find_text("ctry"),
        state: tag.find_text("state"),
        zip_code: tag.find_text("pcode"),
    }
}

fn reference_from_sgml(tag: &Element) -> Option<USReference> {
    let patent_number = tag
        .find("dnum")
        .map(|dnum| dnum.text().trim().to_string())
        .filter(|value| !value.is_empty())?;

    let parties = tag
        .find_all("party-us")
        .into_iter()
        .map(|party| party.text().trim().to_string())
        .collect::<Vec<_>>();

    Some(USReference {
        patent_number: Some(patent_number),
        issue_date: tag.find_text("date"),
        patentee_name: if parties.is_empty() {
            None
        } else {
            Some(parties.join("; "))
        },
        country: tag.find_text("ctry"),
    })
}

/// One record per document: the record type holds a single classification,
/// so every field-of-search entry is folded into `field_of_search_class`.
fn classification_from_sgml(root: &Element) -> Option<PatentClassification> {
    let search_entries = root.find_all_text("b582");
    let classification = PatentClassification {
        us_classification: root
            .find_text("b521")
            .or_else(|| search_entries.first().cloned()),
        cross_reference: join_non_empty(&root.find_all_text("b522")),
        international_classification: join_non_empty(&root.find_all_text("b511")),
        field_of_search_class: join_non_empty(&search_entries),
        ..PatentClassification::default()
    };

    if classification == PatentClassification::default() {
        None
    } else {
        Some(classification)
    }
}

/// `FNM SNM` when the element carries a name group, plain text otherwise.
fn name_or_text(tag: &Element) -> String {
    let parts = [tag.find_text("fnm"), tag.find_text("snm")]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();

    if parts.is_empty() {
        tag.text().trim().to_string()
    } else {
        parts.join(" ")
    }
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|ch| !ch.is_whitespace()).collect()
}
