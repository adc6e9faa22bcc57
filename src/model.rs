use serde::{Deserialize, Serialize};

use crate::error::{PatentError, PatentResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventor {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatentClassification {
    pub us_classification: Option<String>,
    pub cross_reference: Option<String>,
    pub unofficial_reference: Option<String>,
    pub digest_reference: Option<String>,
    pub edition_field: Option<String>,
    pub international_classification: Option<String>,
    pub field_of_search_class: Option<String>,
    pub field_of_search_subclasses: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct USReference {
    pub patent_number: Option<String>,
    pub issue_date: Option<String>,
    pub patentee_name: Option<String>,
    pub country: Option<String>,
}

/// Dialect-independent granted-patent record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patent {
    pub patent_number: Option<String>,
    pub date: Option<String>,
    pub country: Option<String>,
    pub series_code: Option<String>,
    pub kind: Option<String>,
    pub application_number: Option<String>,
    pub application_type: Option<String>,
    pub application_country: Option<String>,
    pub application_date: Option<String>,
    pub art_unit: Option<String>,
    pub title: Option<String>,
    pub primary_examiner: Option<String>,

    pub parent_code: Option<String>,
    pub parent_application_number: Option<String>,
    pub parent_status_code: Option<String>,

    pub us_references: Vec<USReference>,
    pub inventors: Vec<Inventor>,
    pub claims: Vec<String>,
    pub design_claims: Option<String>,

    pub r#abstract: Option<String>,
    pub brief_summary: Option<String>,
    pub description: Option<String>,

    pub patent_classification: Option<PatentClassification>,
}

impl Patent {
    /// Display identifier such as `US 07000000 B2-20060214`; never a storage key.
    pub fn document_id(&self) -> String {
        let mut document_id = [&self.country, &self.patent_number, &self.kind]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(date) = self.date.as_deref().filter(|date| !date.is_empty()) {
            document_id.push('-');
            document_id.push_str(date);
        }

        document_id
    }
}

/// Scalar text attributes of [`Patent`], addressable by name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PatentField {
    PatentNumber,
    Date,
    Country,
    SeriesCode,
    Kind,
    ApplicationNumber,
    ApplicationType,
    ApplicationCountry,
    ApplicationDate,
    ArtUnit,
    Title,
    PrimaryExaminer,
    ParentCode,
    ParentApplicationNumber,
    ParentStatusCode,
    DesignClaims,
    Abstract,
    BriefSummary,
    Description,
}

pub const DEFAULT_TRACKED_FIELDS: [PatentField; 10] = [
    PatentField::PatentNumber,
    PatentField::SeriesCode,
    PatentField::ApplicationNumber,
    PatentField::ApplicationType,
    PatentField::ApplicationDate,
    PatentField::Title,
    PatentField::Abstract,
    PatentField::BriefSummary,
    PatentField::Description,
    PatentField::DesignClaims,
];

impl PatentField {
    pub const ALL: [PatentField; 19] = [
        Self::PatentNumber,
        Self::Date,
        Self::Country,
        Self::SeriesCode,
        Self::Kind,
        Self::ApplicationNumber,
        Self::ApplicationType,
        Self::ApplicationCountry,
        Self::ApplicationDate,
        Self::ArtUnit,
        Self::Title,
        Self::PrimaryExaminer,
        Self::ParentCode,
        Self::ParentApplicationNumber,
        Self::ParentStatusCode,
        Self::DesignClaims,
        Self::Abstract,
        Self::BriefSummary,
        Self::Description,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PatentNumber => "patent_number",
            Self::Date => "date",
            Self::Country => "country",
            Self::SeriesCode => "series_code",
            Self::Kind => "kind",
            Self::ApplicationNumber => "application_number",
            Self::ApplicationType => "application_type",
            Self::ApplicationCountry => "application_country",
            Self::ApplicationDate => "application_date",
            Self::ArtUnit => "art_unit",
            Self::Title => "title",
            Self::PrimaryExaminer => "primary_examiner",
            Self::ParentCode => "parent_code",
            Self::ParentApplicationNumber => "parent_application_number",
            Self::ParentStatusCode => "parent_status_code",
            Self::DesignClaims => "design_claims",
            Self::Abstract => "abstract",
            Self::BriefSummary => "brief_summary",
            Self::Description => "description",
        }
    }

    /// Header used in the flattened text form, e.g. `BRIEF SUMMARY`.
    pub fn header(self) -> String {
        self.name().to_uppercase().replace('_', " ")
    }

    pub fn from_name(name: &str) -> PatentResult<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| PatentError::InvalidField(name.to_string()))
    }

    pub fn get(self, patent: &Patent) -> Option<&str> {
        let value = match self {
            Self::PatentNumber => &patent.patent_number,
            Self::Date => &patent.date,
            Self::Country => &patent.country,
            Self::SeriesCode => &patent.series_code,
            Self::Kind => &patent.kind,
            Self::ApplicationNumber => &patent.application_number,
            Self::ApplicationType => &patent.application_type,
            Self::ApplicationCountry => &patent.application_country,
            Self::ApplicationDate => &patent.application_date,
            Self::ArtUnit => &patent.art_unit,
            Self::Title => &patent.title,
            Self::PrimaryExaminer => &patent.primary_examiner,
            Self::ParentCode => &patent.parent_code,
            Self::ParentApplicationNumber => &patent.parent_application_number,
            Self::ParentStatusCode => &patent.parent_status_code,
            Self::DesignClaims => &patent.design_claims,
            Self::Abstract => &patent.r#abstract,
            Self::BriefSummary => &patent.brief_summary,
            Self::Description => &patent.description,
        };
        value.as_deref()
    }

    pub fn slot_mut(self, patent: &mut Patent) -> &mut Option<String> {
        match self {
            Self::PatentNumber => &mut patent.patent_number,
            Self::Date => &mut patent.date,
            Self::Country => &mut patent.country,
            Self::SeriesCode => &mut patent.series_code,
            Self::Kind => &mut patent.kind,
            Self::ApplicationNumber => &mut patent.application_number,
            Self::ApplicationType => &mut patent.application_type,
            Self::ApplicationCountry => &mut patent.application_country,
            Self::ApplicationDate => &mut patent.application_date,
            Self::ArtUnit => &mut patent.art_unit,
            Self::Title => &mut patent.title,
            Self::PrimaryExaminer => &mut patent.primary_examiner,
            Self::ParentCode => &mut patent.parent_code,
            Self::ParentApplicationNumber => &mut patent.parent_application_number,
            Self::ParentStatusCode => &mut patent.parent_status_code,
            Self::DesignClaims => &mut patent.design_claims,
            Self::Abstract => &mut patent.r#abstract,
            Self::BriefSummary => &mut patent.brief_summary,
            Self::Description => &mut patent.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub name: String,
    pub dialect: String,
    pub patents: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub name: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseCounts {
    pub archive_count: usize,
    pub skipped_archive_count: usize,
    pub member_count: usize,
    pub patents_written: usize,
    pub document_failures: usize,
    pub archive_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub output_path: String,
    pub tracked_fields: Vec<String>,
    pub counts: ParseCounts,
    pub sources: Vec<SourceEntry>,
    pub members: Vec<MemberSummary>,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub member_count: usize,
    pub skipped_member_count: usize,
    pub failed_member_count: usize,
    pub records_parsed: usize,
    pub patents_inserted: usize,
    pub fulltexts_inserted: usize,
    pub citations_inserted: usize,
    pub record_failures: usize,
    pub patents_total: i64,
    pub citations_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub db_path: String,
    pub source: SourceEntry,
    pub counts: IngestCounts,
    pub failures: Vec<FailureEntry>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_joins_present_parts_and_date() {
        let patent = Patent {
            country: Some("US".to_string()),
            patent_number: Some("07000000".to_string()),
            kind: Some("B2".to_string()),
            date: Some("20060214".to_string()),
            ..Patent::default()
        };
        assert_eq!(patent.document_id(), "US 07000000 B2-20060214");

        let bare = Patent {
            patent_number: Some("04000000".to_string()),
            kind: Some(String::new()),
            ..Patent::default()
        };
        assert_eq!(bare.document_id(), "04000000");

        let undated = Patent {
            country: Some("US".to_string()),
            patent_number: Some("1".to_string()),
            kind: Some("A".to_string()),
            date: Some(String::new()),
            ..Patent::default()
        };
        assert_eq!(undated.document_id(), "US 1 A");
    }

    #[test]
    fn field_names_round_trip_and_reject_typos() {
        for field in PatentField::ALL {
            assert_eq!(
                PatentField::from_name(field.name()).expect("known field"),
                field
            );
        }

        let err = PatentField::from_name("patent_numbr").expect_err("typo rejected");
        assert!(matches!(err, PatentError::InvalidField(_)));
        assert_eq!(PatentField::BriefSummary.header(), "BRIEF SUMMARY");
    }

    #[test]
    fn slot_mut_writes_through_to_record() {
        let mut patent = Patent::default();
        *PatentField::Abstract.slot_mut(&mut patent) = Some("text".to_string());
        assert_eq!(patent.r#abstract.as_deref(), Some("text"));
        assert_eq!(PatentField::Abstract.get(&patent), Some("text"));
        assert!(patent.claims.is_empty());
        assert!(patent.inventors.is_empty());
    }
}
