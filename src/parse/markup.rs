//! Forgiving element tree for the SGML and XML dialects.
//!
//! Archive SGML is not well-formed XML: end tags are sometimes omitted and
//! entity references point at DTDs that are not shipped with each document.
//! The tree is therefore built from `quick-xml` events with end-name checks
//! disabled; unmatched end tags close back to the nearest open element of
//! the same name, unknown entities are kept verbatim, and all element and
//! attribute names are lower-cased.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{PatentError, PatentResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First descendant named `name`, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant named `name`, in document order. Matches are not
    /// searched for nested matches.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if child.name == name {
                found.push(child);
            } else {
                child.collect_named(name, found);
            }
        }
    }

    /// Concatenated text of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.push_text(out),
            }
        }
    }

    /// Trimmed, non-empty texts of every descendant named `name`.
    pub fn find_all_text(&self, name: &str) -> Vec<String> {
        self.find_all(name)
            .into_iter()
            .map(|element| element.text().trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Trimmed text of the first descendant named `name`, absent when missing.
    pub fn find_text(&self, name: &str) -> Option<String> {
        self.find(name).map(|element| element.text().trim().to_string())
    }
}

/// Parses `text` into a synthetic root element (empty name) holding the
/// top-level nodes.
pub fn parse_markup(text: &str) -> PatentResult<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = false;

    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from_start(&start)),
            Ok(Event::Empty(start)) => {
                append_node(&mut stack, Node::Element(element_from_start(&start)));
            }
            Ok(Event::End(end)) => {
                close_element(&mut stack, &lowercase_name(end.name().as_ref()));
            }
            Ok(Event::Text(content)) => {
                let value = match content.unescape() {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&content).into_owned(),
                };
                append_node(&mut stack, Node::Text(value));
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                append_node(&mut stack, Node::Text(value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(PatentError::InvalidDocument(format!(
                    "unreadable markup at byte {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }

    stack
        .pop()
        .ok_or_else(|| PatentError::InvalidDocument("empty markup".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Element {
    let attributes = start
        .html_attributes()
        .flatten()
        .map(|attribute| {
            let key = lowercase_name(attribute.key.as_ref());
            let value = attribute
                .unescape_value()
                .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attribute.value).into_owned()))
                .into_owned();
            (key, value)
        })
        .collect();

    Element {
        name: lowercase_name(start.name().as_ref()),
        attributes,
        children: Vec::new(),
    }
}

pub(super) fn lowercase_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn append_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn close_top(stack: &mut Vec<Element>) {
    if let Some(element) = stack.pop() {
        append_node(stack, Node::Element(element));
    }
}

/// Closes back to the nearest open element named `name`; implicitly closes
/// anything opened after it. Stray end tags are ignored.
fn close_element(stack: &mut Vec<Element>, name: &str) {
    let Some(position) = stack.iter().skip(1).rposition(|element| element.name == name) else {
        return;
    };
    let target_len = position + 1;
    while stack.len() > target_len {
        close_top(stack);
    }
}
