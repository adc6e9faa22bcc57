use crate::error::{PatentError, PatentResult};
use crate::model::{Inventor, Patent, PatentClassification, USReference};

use super::join_non_empty;
use super::markup::{Element, parse_markup};
use super::tagged::TaggedChunks;

/// First dialect version using the `us-` prefixed citation and applicant layout.
const US_LAYOUT_CUTOFF: &str = "v4.3";

pub fn chunk_xml(text: &str) -> TaggedChunks<'_> {
    TaggedChunks::new(text, "us-patent-grant")
}

/// Punctuation-free comparison key; the archive writes `v4.3` and `v43`
/// interchangeably.
pub fn version_key(version: &str) -> String {
    version
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

pub fn uses_us_layout(version: &str) -> bool {
    version_key(version) >= version_key(US_LAYOUT_CUTOFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationLayout {
    pub container: &'static str,
    pub entry: &'static str,
}

pub fn citation_layout(version: &str) -> CitationLayout {
    if uses_us_layout(version) {
        CitationLayout {
            container: "us-references-cited",
            entry: "us-citation",
        }
    } else {
        CitationLayout {
            container: "references-cited",
            entry: "citation",
        }
    }
}

pub fn parse_xml_chunk(chunk: &str) -> PatentResult<Patent> {
    let document = parse_markup(chunk)?;
    let root = document.find("us-patent-grant").ok_or_else(|| {
        PatentError::InvalidDocument("no us-patent-grant element in chunk".to_string())
    })?;

    let version = root
        .attribute("dtd-version")
        .and_then(|value| value.split_whitespace().next())
        .ok_or_else(|| PatentError::InvalidDocument("us-patent-grant without dtd-version".to_string()))?
        .to_string();

    let publication = root.find("publication-reference").ok_or_else(|| {
        PatentError::InvalidDocument("us-patent-grant without publication-reference".to_string())
    })?;
    let patent_number = publication
        .find_text("doc-number")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            PatentError::InvalidDocument("publication-reference without doc-number".to_string())
        })?;
    let country = publication.find_text("country");

    let application = root.find("application-reference");
    let examiner = root.find("primary-examiner");

    let claims = root
        .find("claims")
        .map(|claims| {
            claims
                .find_all("claim")
                .into_iter()
                .map(|claim| claim.text().trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Patent {
        patent_number: Some(patent_number),
        kind: publication.find_text("kind"),
        date: publication.find_text("date"),
        application_number: application.and_then(|tag| tag.find_text("doc-number")),
        application_country: application.and_then(|tag| tag.find_text("country")),
        application_date: application.and_then(|tag| tag.find_text("date")),
        series_code: root.find_text("us-application-series-code"),
        title: root.find_text("invention-title"),
        primary_examiner: examiner.and_then(|tag| name_group(tag).name),
        art_unit: examiner.and_then(|tag| tag.find_text("department")),
        r#abstract: root.find_text("abstract"),
        description: root.find_text("description"),
        claims,
        us_references: references_from_xml(root, &version),
        inventors: inventors_from_xml(root, &version, country.as_deref()),
        patent_classification: classification_from_xml(root),
        country,
        ..Patent::default()
    })
}

fn references_from_xml(root: &Element, version: &str) -> Vec<USReference> {
    let layout = citation_layout(version);
    let Some(container) = root.find(layout.container) else {
        return Vec::new();
    };

    container
        .find_all(layout.entry)
        .into_iter()
        .filter_map(|citation| {
            // non-patent literature citations carry no document-id
            let document_id = citation.find("document-id")?;
            let patent_number = document_id
                .find_text("doc-number")
                .filter(|value| !value.is_empty())?;
            Some(USReference {
                patent_number: Some(patent_number),
                country: document_id.find_text("country"),
                patentee_name: document_id.find_text("name"),
                issue_date: document_id.find_text("date"),
            })
        })
        .collect()
}

fn inventors_from_xml(root: &Element, version: &str, country: Option<&str>) -> Vec<Inventor> {
    if country == Some("US") {
        let applicants = if uses_us_layout(version) {
            root.find("us-applicants")
                .map(|container| container.find_all("us-applicant"))
        } else {
            root.find("applicants").map(|container| {
                container
                    .find_all("applicant")
                    .into_iter()
                    .filter(|applicant| {
                        applicant.attribute("app-type") == Some("applicant-inventor")
                    })
                    .collect()
            })
        };

        if let Some(applicants) = applicants {
            return applicants.into_iter().map(name_group).collect();
        }
    }

    root.find("inventors")
        .map(|container| {
            container
                .find_all("inventor")
                .into_iter()
                .map(name_group)
                .collect()
        })
        .unwrap_or_default()
}

fn name_group(tag: &Element) -> Inventor {
    let name = [tag.find_text("first-name"), tag.find_text("last-name")]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();

    Inventor {
        name: if name.is_empty() {
            None
        } else {
            Some(name.join(" "))
        },
        city: tag.find_text("city"),
        country: tag.find_text("country"),
        state: tag.find_text("state"),
        zip_code: tag.find_text("postcode"),
    }
}

fn classification_from_xml(root: &Element) -> Option<PatentClassification> {
    let national = root.find("classification-national");
    let further = national
        .map(|tag| tag.find_all_text("further-classification"))
        .unwrap_or_default();

    let mut international = root
        .find_all("classification-ipcr")
        .into_iter()
        .filter_map(ipcr_symbol)
        .collect::<Vec<_>>();
    if international.is_empty() {
        if let Some(ipc) = root.find("classification-ipc") {
            international = ipc.find_all_text("main-classification");
        }
    }

    let search = root
        .find("us-field-of-classification-search")
        .or_else(|| root.find("field-of-search"))
        .map(|tag| {
            tag.find_all("classification-national")
                .into_iter()
                .filter_map(|entry| entry.find_text("main-classification"))
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let classification = PatentClassification {
        us_classification: national.and_then(|tag| tag.find_text("main-classification")),
        cross_reference: join_non_empty(&further),
        international_classification: join_non_empty(&international),
        field_of_search_class: join_non_empty(&search),
        ..PatentClassification::default()
    };

    if classification == PatentClassification::default() {
        None
    } else {
        Some(classification)
    }
}

/// `H01L 21/02` style symbol from the split IPCR fields.
fn ipcr_symbol(tag: &Element) -> Option<String> {
    let section = tag.find_text("section")?;
    let class = tag.find_text("class")?;
    let subclass = tag.find_text("subclass")?;
    let main_group = tag.find_text("main-group")?;
    let subgroup = tag.find_text("subgroup")?;
    Some(format!("{section}{class}{subclass} {main_group}/{subgroup}"))
}
