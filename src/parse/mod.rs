use tracing::{debug, warn};

use crate::error::PatentResult;
use crate::model::Patent;

mod aps;
mod archive;
mod markup;
mod namespace;
mod patft;
mod sgml;
mod tagged;
mod xml;

pub use archive::{ArchiveParse, parse_archive};
pub use namespace::HeadingSpacing;

use aps::{chunk_aps, parse_aps_chunk};
use patft::parse_patft_page;
use sgml::{chunk_sgml, parse_sgml_chunk};
use xml::{chunk_xml, parse_xml_chunk};

/// Header fragment that marks XML-dialect files shipped under a `pg*` name.
const XML_DOCTYPE_MARKER: &str = "us-patent-grant-v4";

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub heading_spacing: HeadingSpacing,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dialect {
    Aps,
    Sgml,
    Xml,
    Patft,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aps => "aps",
            Self::Sgml => "sgml",
            Self::Xml => "xml",
            Self::Patft => "patft",
        }
    }

    /// Dialect implied by an archive member's file name alone. `pg*` files
    /// are SGML until their header says otherwise, see [`Dialect::refine`].
    /// Saved search-site pages hold a single patent each.
    pub fn from_member_name(member_name: &str) -> Option<Self> {
        let base = member_name
            .rsplit('/')
            .next()
            .unwrap_or(member_name)
            .to_ascii_lowercase();

        if base.ends_with(".htm") || base.ends_with(".html") {
            Some(Self::Patft)
        } else if base.starts_with("pftaps") {
            Some(Self::Aps)
        } else if base.starts_with("ipg") {
            Some(Self::Xml)
        } else if base.starts_with("pg") {
            Some(Self::Sgml)
        } else {
            None
        }
    }

    pub fn refine(self, head: &str) -> Self {
        if self == Self::Sgml && head.contains(XML_DOCTYPE_MARKER) {
            Self::Xml
        } else {
            self
        }
    }

    pub fn detect(member_name: &str, head: &str) -> Option<Self> {
        Self::from_member_name(member_name).map(|dialect| dialect.refine(head))
    }

    /// Chunks `text` and parses every document. Document-local failures are
    /// tallied in the result; only mapping defects abort the pass.
    pub fn parse_buffer(
        self,
        source: &str,
        text: &str,
        options: &ParseOptions,
    ) -> PatentResult<ParsedBuffer> {
        match self {
            Self::Aps => parse_chunks(source, chunk_aps(text), |chunk| {
                parse_aps_chunk(chunk, options)
            }),
            Self::Sgml => parse_chunks(source, chunk_sgml(text), |chunk| parse_sgml_chunk(chunk)),
            Self::Xml => parse_chunks(source, chunk_xml(text), |chunk| parse_xml_chunk(chunk)),
            Self::Patft => parse_chunks(source, std::iter::once(text), |page| parse_patft_page(page)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub source: String,
    pub document_index: Option<usize>,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ParsedBuffer {
    pub patents: Vec<Patent>,
    pub failures: Vec<DocumentFailure>,
}

fn parse_chunks<C>(
    source: &str,
    chunks: impl Iterator<Item = C>,
    parse: impl Fn(&C) -> PatentResult<Patent>,
) -> PatentResult<ParsedBuffer> {
    let mut parsed = ParsedBuffer::default();

    for (index, chunk) in chunks.enumerate() {
        match parse(&chunk) {
            Ok(patent) => {
                debug!(source = %source, document = %patent.document_id(), "parsed document");
                parsed.patents.push(patent);
            }
            Err(err) if err.is_document_local() => {
                warn!(
                    source = %source,
                    document = index,
                    kind = err.kind(),
                    error = %err,
                    "failed to parse document"
                );
                parsed.failures.push(DocumentFailure {
                    source: source.to_string(),
                    document_index: Some(index),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(parsed)
}

pub(crate) fn join_non_empty(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}
