use std::str::Lines;

/// Lazily yields the literal line span between a `<TAG` line and the next
/// `</TAG` line. Outer files are not well-formed, so boundaries are found by
/// line prefix rather than by parsing.
pub struct TaggedChunks<'a> {
    lines: Lines<'a>,
    start_tag: String,
    end_tag: String,
    open: Option<Vec<&'a str>>,
}

impl<'a> TaggedChunks<'a> {
    pub fn new(text: &'a str, tag: &str) -> Self {
        Self {
            lines: text.lines(),
            start_tag: format!("<{tag}"),
            end_tag: format!("</{tag}"),
            open: None,
        }
    }
}

impl Iterator for TaggedChunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if line.starts_with(&self.start_tag) {
                self.open = Some(vec![line]);
            } else if let Some(open) = self.open.as_mut() {
                open.push(line);
                if line.starts_with(&self.end_tag) {
                    return self.open.take().map(|span| span.join("\n"));
                }
            }
        }

        None
    }
}
