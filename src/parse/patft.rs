//! Saved full-text pages from the office's patent search site.
//!
//! One page holds one patent. Sections open with a `<CENTER>` heading
//! (`Abstract`, `Claims`, `Description`). The abstract is the run of `<P>`
//! elements after its heading; claims and description sit between the next
//! two `<HR>` rules as `<BR><BR>`-separated runs.

use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;

use crate::error::{PatentError, PatentResult};
use crate::model::Patent;

use super::markup::lowercase_name;
use super::namespace::is_upper_heading;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open(String),
    Close(String),
    Text(String),
}

impl Token {
    fn is_open(&self, tag: &str) -> bool {
        matches!(self, Self::Open(name) if name == tag)
    }

    fn is_close(&self, tag: &str) -> bool {
        matches!(self, Self::Close(name) if name == tag)
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text(value) if value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionSection {
    /// Upper-case heading line; absent for text ahead of the first heading.
    pub heading: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatftPage {
    pub patent_id: String,
    pub r#abstract: Option<String>,
    pub claims: Vec<String>,
    pub descriptions: Vec<DescriptionSection>,
}

impl PatftPage {
    pub fn into_patent(self) -> Patent {
        let description = (!self.descriptions.is_empty()).then(|| {
            self.descriptions
                .iter()
                .map(|section| match &section.heading {
                    Some(heading) => format!("{heading}\n{}", section.text),
                    None => section.text.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n")
        });

        Patent {
            patent_number: Some(self.patent_id),
            r#abstract: self.r#abstract,
            claims: self.claims,
            description,
            ..Patent::default()
        }
    }
}

pub fn parse_patft_page(html: &str) -> PatentResult<Patent> {
    read_patft_page(html).map(PatftPage::into_patent)
}

pub fn read_patft_page(html: &str) -> PatentResult<PatftPage> {
    let tokens = tokenize(html)?;

    Ok(PatftPage {
        patent_id: patent_id(&tokens)?,
        r#abstract: section_start(&tokens, "abstract").and_then(|start| abstract_from(&tokens, start)),
        claims: section_start(&tokens, "claims")
            .map(|start| claims_from(&tokens, start))
            .unwrap_or_default(),
        descriptions: section_start(&tokens, "description")
            .map(|start| descriptions_from(&tokens, start))
            .unwrap_or_default(),
    })
}

fn tokenize(html: &str) -> PatentResult<Vec<Token>> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut tokens = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start) | Event::Empty(start)) => {
                tokens.push(Token::Open(lowercase_name(start.name().as_ref())));
            }
            Ok(Event::End(end)) => tokens.push(Token::Close(lowercase_name(end.name().as_ref()))),
            Ok(Event::Text(content)) => {
                let value = match content.unescape_with(resolve_page_entity) {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&content).into_owned(),
                };
                tokens.push(Token::Text(value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(PatentError::InvalidDocument(format!(
                    "unreadable page at byte {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
    }

    Ok(tokens)
}

fn resolve_page_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some(" "),
        _ => resolve_xml_entity(entity),
    }
}

/// Text tokens from `from` up to the close of `tag`, and the index after it.
fn text_until_close(tokens: &[Token], from: usize, tag: &str) -> (String, usize) {
    let mut text = String::new();
    for (index, token) in tokens.iter().enumerate().skip(from) {
        match token {
            Token::Text(value) => text.push_str(value),
            token if token.is_close(tag) => return (text, index + 1),
            _ => {}
        }
    }
    (text, tokens.len())
}

/// The page title reads `United States Patent: 7000000`.
fn patent_id(tokens: &[Token]) -> PatentResult<String> {
    let start = tokens
        .iter()
        .position(|token| token.is_open("title"))
        .ok_or_else(|| PatentError::InvalidDocument("page without title".to_string()))?;
    let (title, _) = text_until_close(tokens, start + 1, "title");

    title
        .split_once(": ")
        .map(|(_, id)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PatentError::InvalidDocument(format!("no patent id in title {title:?}")))
}

/// Index just past the `<CENTER>` heading whose text is `heading`.
fn section_start(tokens: &[Token], heading: &str) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| token.is_open("center"))
        .map(|(index, _)| text_until_close(tokens, index + 1, "center"))
        .find(|(text, _)| text.trim().eq_ignore_ascii_case(heading))
        .map(|(_, after)| after)
}

fn abstract_from(tokens: &[Token], start: usize) -> Option<String> {
    let mut index = start + tokens.get(start..)?.iter().position(|token| token.is_open("p"))?;
    let mut paragraphs = Vec::new();

    while tokens.get(index).is_some_and(|token| token.is_open("p")) {
        index += 1;
        let mut text = String::new();
        while let Some(token) = tokens.get(index) {
            if token.is_open("p") {
                break;
            }
            index += 1;
            match token {
                Token::Text(value) => text.push_str(value),
                token if token.is_close("p") => break,
                _ => {}
            }
        }

        let paragraph = collapse_whitespace(&text);
        if !paragraph.is_empty() {
            paragraphs.push(paragraph);
        }
        while tokens.get(index).is_some_and(Token::is_blank_text) {
            index += 1;
        }
    }

    (!paragraphs.is_empty()).then(|| paragraphs.join("\n"))
}

/// Text between the first `<HR>` after `start` and the next one, split at
/// every `<BR><BR>` pair. A lone `<BR>` reads as a space.
fn ruled_runs(tokens: &[Token], start: usize) -> Vec<String> {
    let Some(rule) = tokens
        .get(start..)
        .and_then(|rest| rest.iter().position(|token| token.is_open("hr")))
    else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut current = String::new();
    let mut pending_break = false;

    for token in &tokens[start + rule + 1..] {
        match token {
            token if token.is_open("hr") => break,
            token if token.is_open("br") => {
                if pending_break {
                    runs.push(std::mem::take(&mut current));
                }
                pending_break = !pending_break;
            }
            Token::Text(value) => {
                if value.trim().is_empty() && pending_break {
                    continue;
                }
                if pending_break {
                    current.push(' ');
                    pending_break = false;
                }
                current.push_str(value);
            }
            _ => {}
        }
    }
    runs.push(current);

    runs.into_iter().map(|run| collapse_whitespace(&run)).collect()
}

fn claims_from(tokens: &[Token], start: usize) -> Vec<String> {
    ruled_runs(tokens, start)
        .into_iter()
        .filter(|run| starts_with_claim_number(run))
        .collect()
}

fn descriptions_from(tokens: &[Token], start: usize) -> Vec<DescriptionSection> {
    let runs = ruled_runs(tokens, start);
    // the runs before the first and after the last break are page chrome
    let inner = match runs.len() {
        0..=2 => &[][..],
        len => &runs[1..len - 1],
    };

    let mut sections: Vec<(Option<String>, Vec<&str>)> = Vec::new();
    let mut heading: Option<String> = None;

    for line in inner.iter().map(String::as_str) {
        if is_upper_heading(line) {
            heading = Some(line.to_string());
            continue;
        }
        if line.is_empty() {
            continue;
        }
        match sections.iter_mut().find(|(key, _)| *key == heading) {
            Some((_, lines)) => lines.push(line),
            None => sections.push((heading.clone(), vec![line])),
        }
    }

    sections
        .into_iter()
        .map(|(heading, lines)| DescriptionSection {
            heading,
            text: lines.join(" "),
        })
        .collect()
}

fn starts_with_claim_number(text: &str) -> bool {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && text[digits..].starts_with(". ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
