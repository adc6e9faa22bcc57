use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{PatentError, PatentResult};
use crate::flat_text::{ABSENT, CLAIMS_HEADER, FlatRecord};
use crate::model::PatentField;

/// Rows of the `texttypes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Abstract,
    BriefSummary,
    Description,
    Claims,
}

impl TextType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Abstract => "ABSTRACT",
            Self::BriefSummary => "BRIEF SUMMARY",
            Self::Description => "DESCRIPTION",
            Self::Claims => "CLAIMS",
        }
    }
}

/// Flat-text headers stored as full texts. Design claims share the CLAIMS type.
const FULLTEXT_HEADERS: [(&str, TextType); 5] = [
    ("DESCRIPTION", TextType::Description),
    ("ABSTRACT", TextType::Abstract),
    ("BRIEF SUMMARY", TextType::BriefSummary),
    (CLAIMS_HEADER, TextType::Claims),
    ("DESIGN CLAIMS", TextType::Claims),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatentNumber {
    /// Letter prefix such as `D` or `RE`; stored as the field type.
    pub prefix: Option<String>,
    pub number: i64,
}

pub struct PatentNumberParser {
    lettered: Regex,
}

impl PatentNumberParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lettered: Regex::new(r"^([A-Za-z]+)(\d+)")
                .context("failed to compile patent-number pattern")?,
        })
    }

    pub fn parse(&self, raw: &str) -> PatentResult<PatentNumber> {
        let invalid = || PatentError::InvalidPatentNumber(raw.to_string());

        if !raw.is_empty() && raw.bytes().all(|byte| byte.is_ascii_digit()) {
            let number = raw.parse().map_err(|_| invalid())?;
            return Ok(PatentNumber {
                prefix: None,
                number,
            });
        }

        let captures = self.lettered.captures(raw).ok_or_else(invalid)?;
        let number = captures[2].parse().map_err(|_| invalid())?;
        Ok(PatentNumber {
            prefix: Some(captures[1].to_string()),
            number,
        })
    }
}

/// Parses a `YYYYMMDD` date. A day past the end of its month is walked back
/// until the date exists (`19810230` becomes 1981-02-28); any other
/// malformation is an error.
pub fn safe_date(raw: &str) -> PatentResult<NaiveDate> {
    let invalid = || PatentError::InvalidDate(raw.to_string());

    if raw.len() != 8 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = raw[..4].parse().map_err(|_| invalid())?;
    let month: u32 = raw[4..6].parse().map_err(|_| invalid())?;
    let day: u32 = raw[6..].parse().map_err(|_| invalid())?;
    if year < 1 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }

    (1..=day)
        .rev()
        .find_map(|candidate| NaiveDate::from_ymd_opt(year, month, candidate))
        .ok_or_else(invalid)
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Everything stored for one flattened record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatentRow {
    pub number: i64,
    pub field_type: Option<String>,
    pub application_number: Option<i64>,
    pub series_code: Option<String>,
    /// Proleptic Gregorian day number, 0001-01-01 being day 1.
    pub application_date: Option<i32>,
    pub title: Option<String>,
    pub fulltexts: Vec<(TextType, String)>,
    /// Cited patent numbers; unparseable references are dropped.
    pub citations: Vec<i64>,
}

impl PatentRow {
    pub fn from_record(record: &FlatRecord, numbers: &PatentNumberParser) -> PatentResult<Self> {
        let patent_number = numbers.parse(
            record
                .raw(&PatentField::PatentNumber.header())
                .unwrap_or(ABSENT),
        )?;

        let application_number = record
            .field(PatentField::ApplicationNumber)
            .map(digits_only)
            .and_then(|digits| digits.parse().ok());

        let application_date = record
            .field(PatentField::ApplicationDate)
            .map(safe_date)
            .transpose()?
            .map(|date| date.num_days_from_ce());

        let fulltexts = FULLTEXT_HEADERS
            .iter()
            .filter_map(|(header, text_type)| {
                record
                    .value(header)
                    .map(|text| (*text_type, text.to_string()))
            })
            .collect();

        let citations = record
            .references()
            .into_iter()
            .filter_map(|reference| numbers.parse(reference).ok())
            .map(|reference| reference.number)
            .collect();

        Ok(Self {
            number: patent_number.number,
            field_type: patent_number.prefix,
            application_number,
            series_code: record.field(PatentField::SeriesCode).map(str::to_string),
            application_date,
            title: record.field(PatentField::Title).map(str::to_string),
            fulltexts,
            citations,
        })
    }
}
