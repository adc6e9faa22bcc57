/// Spacing applied to all-uppercase paragraph lines (section headings)
/// when a legacy paragraph group is joined.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HeadingSpacing {
    #[default]
    Spaced,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub data: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }

    /// `PAR`, `PAC`, `PA1`, `PAL` and friends.
    pub fn is_paragraph(&self) -> bool {
        self.key.starts_with("PA") && self.key.chars().count() >= 3
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub tags: Vec<Tag>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
        }
    }

    pub fn push_tag(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn tags_by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |tag| tag.key == key)
    }

    /// Newline-joined data of every tag with `key`; `None` when the key is absent.
    pub fn joined(&self, key: &str) -> Option<String> {
        let values = self
            .tags_by_key(key)
            .map(|tag| tag.data.as_str())
            .collect::<Vec<_>>();
        if values.is_empty() {
            None
        } else {
            Some(values.join("\n"))
        }
    }

    pub fn as_paragraphs(&self, spacing: HeadingSpacing) -> String {
        self.tags
            .iter()
            .filter(|tag| tag.is_paragraph())
            .map(|tag| {
                if spacing == HeadingSpacing::Spaced && is_upper_heading(&tag.data) {
                    format!("{} ", tag.data)
                } else {
                    tag.data.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(super) fn is_upper_heading(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}
