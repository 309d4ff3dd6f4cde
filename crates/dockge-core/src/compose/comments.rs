//! # Comment Preservation
//!
//! `serde_yaml` drops comments on parse. To keep hand-written notes alive
//! across an edit, the source text is scanned into a structural outline
//! (one anchor per content line) and every comment is recorded against the
//! anchor that follows it. After serialization the emitted text is outlined
//! the same way and the comments are re-inserted in front of the matching
//! lines.
//!
//! Matching prefers an anchor with the same path and the same scalar value,
//! then falls back to the same path alone. Among equal candidates the first
//! unused one in document order wins, so the k-th of several identical
//! siblings receives the comments of the k-th source sibling.
//!
//! The scanner understands block mappings, block sequences (including
//! sequences at the same indent as their key), quoted scalars and block
//! scalars. Flow collections and multi-line plain scalars are passed through
//! without anchors.

use std::mem::take;

// =============================================================================
// OUTLINE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Item { index: usize, text: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    path: Vec<Segment>,
    value: Option<String>,
}

#[derive(Debug)]
enum Line {
    Blank,
    Comment(String),
    Content {
        anchor: Option<Anchor>,
        inline: Option<String>,
    },
}

impl Line {
    const fn text() -> Self {
        Self::Content {
            anchor: None,
            inline: None,
        }
    }
}

#[derive(Debug)]
struct Frame {
    indent: usize,
    segment: Segment,
    /// A key with no inline value; a sequence may follow at the same indent.
    owns_block: bool,
    items: usize,
}

#[derive(Debug, Default)]
struct Outliner {
    frames: Vec<Frame>,
    root_items: usize,
    block_scalar: Option<usize>,
}

impl Outliner {
    fn classify(&mut self, line: &str) -> Line {
        let body = line.trim_start();
        let indent = line.len() - body.len();
        let trimmed = body.trim_end();

        if let Some(limit) = self.block_scalar {
            if trimmed.is_empty() || indent > limit {
                return Line::text();
            }
            self.block_scalar = None;
        }

        if trimmed.is_empty() {
            return Line::Blank;
        }
        if trimmed.starts_with('#') {
            return Line::Comment(trimmed.to_string());
        }
        if trimmed == "---" || trimmed == "..." || trimmed.starts_with("--- ") || trimmed.starts_with('%') {
            return Line::text();
        }
        self.content(trimmed, indent)
    }

    fn content(&mut self, mut rest: &str, mut col: usize) -> Line {
        loop {
            if rest == "-" || rest.starts_with("- ") {
                self.pop_for_item(col);
                let index = self.next_index();
                let after = rest[1..].trim_start();
                let next_col = col + (rest.len() - after.len());
                let (value, inline) = split_comment(after);

                if value.is_empty() {
                    self.push(col, Segment::Item { index, text: None }, false);
                    return Line::Content {
                        anchor: Some(self.anchor(None)),
                        inline,
                    };
                }
                if value == "-" || value.starts_with("- ") || split_key(value).is_some() {
                    self.push(col, Segment::Item { index, text: None }, false);
                    rest = after;
                    col = next_col;
                    continue;
                }
                if is_block_indicator(value) {
                    self.block_scalar = Some(col);
                }
                let text = normalize(value);
                self.push(
                    col,
                    Segment::Item {
                        index,
                        text: Some(text.clone()),
                    },
                    false,
                );
                return Line::Content {
                    anchor: Some(self.anchor(Some(text))),
                    inline,
                };
            }

            let Some((key, value)) = split_key(rest) else {
                return Line::text();
            };
            while self.frames.last().is_some_and(|top| top.indent >= col) {
                self.frames.pop();
            }
            let (value, inline) = split_comment(value);
            if is_block_indicator(value) {
                self.block_scalar = Some(col);
            }
            self.push(col, Segment::Key(key), value.is_empty());
            let value = (!value.is_empty()).then(|| normalize(value));
            return Line::Content {
                anchor: Some(self.anchor(value)),
                inline,
            };
        }
    }

    fn pop_for_item(&mut self, col: usize) {
        while let Some(top) = self.frames.last() {
            let parent = top.indent < col
                || (top.indent == col && top.owns_block && matches!(top.segment, Segment::Key(_)));
            if parent {
                break;
            }
            self.frames.pop();
        }
    }

    fn next_index(&mut self) -> usize {
        let counter = match self.frames.last_mut() {
            Some(frame) => &mut frame.items,
            None => &mut self.root_items,
        };
        let index = *counter;
        *counter += 1;
        index
    }

    fn push(&mut self, indent: usize, segment: Segment, owns_block: bool) {
        self.frames.push(Frame {
            indent,
            segment,
            owns_block,
            items: 0,
        });
    }

    fn anchor(&self, value: Option<String>) -> Anchor {
        Anchor {
            path: self.frames.iter().map(|f| f.segment.clone()).collect(),
            value,
        }
    }
}

/// Split `key: value` at the mapping colon. Flow collections are not keys.
fn split_key(s: &str) -> Option<(String, &str)> {
    if s.starts_with(['[', '{', '#', '|', '>', '?', '*', '&', '!']) {
        return None;
    }
    let (key, rest) = match s.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let end = s[1..].find(quote)? + 1;
            (s[1..end].to_string(), &s[end + 1..])
        }
        _ => {
            let pos = key_colon(s)?;
            (s[..pos].trim_end().to_string(), &s[pos..])
        }
    };
    let rest = rest.strip_prefix(':')?;
    if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
        return None;
    }
    Some((key, rest.trim_start()))
}

fn key_colon(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'#' if i > 0 && bytes[i - 1] == b' ' => return None,
            b':' if bytes.get(i + 1).is_none_or(|n| *n == b' ' || *n == b'\t') => {
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

/// Split a trailing ` # comment` off a value, ignoring `#` inside quotes.
fn split_comment(s: &str) -> (&str, Option<String>) {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('\'') if c == '\'' => {
                if chars.peek().is_some_and(|(_, n)| *n == '\'') {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if (c == '"' || c == '\'') && matches!(prev, ' ' | '\t' | '[' | '{' | ',') => {
                quote = Some(c);
            }
            None if c == '#' && matches!(prev, ' ' | '\t') => {
                return (s[..i].trim_end(), Some(s[i..].to_string()));
            }
            None => {}
        }
        prev = c;
    }
    (s.trim_end(), None)
}

fn is_block_indicator(value: &str) -> bool {
    value.starts_with(['|', '>'])
}

/// Strip one level of matching quotes so `"80:80"` and `80:80` compare equal.
fn normalize(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

// =============================================================================
// COMMENT MAP
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    anchor: Anchor,
    before: Vec<String>,
    inline: Option<String>,
}

/// Comments of a source document, keyed by structural position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CommentMap {
    header: Vec<String>,
    entries: Vec<Entry>,
    footer: Vec<String>,
}

impl CommentMap {
    /// Record every comment of `source`.
    pub(crate) fn extract(source: &str) -> Self {
        let mut outliner = Outliner::default();
        let mut map = Self::default();
        let mut pending = Vec::new();
        let mut seen_content = false;

        for line in source.lines() {
            match outliner.classify(line) {
                Line::Blank => {}
                Line::Comment(text) => pending.push(text),
                Line::Content { anchor, inline } => {
                    let Some(anchor) = anchor else {
                        continue;
                    };
                    if !seen_content {
                        map.header = take(&mut pending);
                        seen_content = true;
                    }
                    map.entries.push(Entry {
                        anchor,
                        before: take(&mut pending),
                        inline,
                    });
                }
            }
        }
        map.footer = pending;
        map
    }

    /// Whether the source carried no comments at all.
    pub(crate) fn is_empty(&self) -> bool {
        self.header.is_empty()
            && self.footer.is_empty()
            && self
                .entries
                .iter()
                .all(|e| e.before.is_empty() && e.inline.is_none())
    }

    /// Re-insert the recorded comments into freshly emitted YAML.
    pub(crate) fn reattach(&self, emitted: &str) -> String {
        if self.is_empty() {
            return emitted.to_string();
        }
        let mut outliner = Outliner::default();
        let mut used = vec![false; self.entries.len()];
        let mut out = String::with_capacity(emitted.len() + 256);

        for comment in &self.header {
            out.push_str(comment);
            out.push('\n');
        }

        for line in emitted.lines() {
            if let Line::Content {
                anchor: Some(anchor),
                ..
            } = outliner.classify(line)
            {
                if let Some(index) = self.find(&anchor, &used) {
                    used[index] = true;
                    let entry = &self.entries[index];
                    let indent = &line[..line.len() - line.trim_start().len()];
                    for comment in &entry.before {
                        out.push_str(indent);
                        out.push_str(comment);
                        out.push('\n');
                    }
                    out.push_str(line);
                    if let Some(comment) = &entry.inline {
                        out.push(' ');
                        out.push_str(comment);
                    }
                    out.push('\n');
                    continue;
                }
            }
            out.push_str(line);
            out.push('\n');
        }

        for comment in &self.footer {
            out.push_str(comment);
            out.push('\n');
        }
        out
    }

    fn find(&self, anchor: &Anchor, used: &[bool]) -> Option<usize> {
        let unused = || {
            self.entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !used.get(*i).copied().unwrap_or(true))
        };
        unused()
            .find(|(_, e)| e.anchor.value == anchor.value && path_matches(&e.anchor.path, &anchor.path, true))
            .or_else(|| unused().find(|(_, e)| path_matches(&e.anchor.path, &anchor.path, false)))
            .map(|(i, _)| i)
    }
}

fn path_matches(a: &[Segment], b: &[Segment], strict: bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| segment_matches(x, y, strict))
}

fn segment_matches(a: &Segment, b: &Segment, strict: bool) -> bool {
    match (a, b) {
        (Segment::Key(x), Segment::Key(y)) => x == y,
        (
            Segment::Item { index: i, text: t },
            Segment::Item { index: j, text: u },
        ) => match (t, u) {
            (Some(t), Some(u)) if t == u => true,
            (None, None) => i == j,
            _ => !strict && i == j,
        },
        _ => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors(text: &str) -> Vec<Anchor> {
        let mut outliner = Outliner::default();
        text.lines()
            .filter_map(|line| match outliner.classify(line) {
                Line::Content { anchor, .. } => anchor,
                _ => None,
            })
            .collect()
    }

    fn key(k: &str) -> Segment {
        Segment::Key(k.to_string())
    }

    #[test]
    fn outline_handles_same_indent_sequences() {
        let found = anchors("services:\n  web:\n    ports:\n    - 80:80\n    image: nginx\n");
        assert_eq!(found.len(), 5);
        assert_eq!(
            found[3].path,
            vec![
                key("services"),
                key("web"),
                key("ports"),
                Segment::Item {
                    index: 0,
                    text: Some("80:80".into())
                }
            ]
        );
        assert_eq!(found[4].path, vec![key("services"), key("web"), key("image")]);
    }

    #[test]
    fn outline_handles_mapping_items() {
        let found = anchors("list:\n  - name: a\n    port: 1\n  - name: b\n");
        assert_eq!(
            found[2].path,
            vec![
                key("list"),
                Segment::Item {
                    index: 0,
                    text: None
                },
                key("port")
            ]
        );
        assert_eq!(
            found[3].path,
            vec![
                key("list"),
                Segment::Item {
                    index: 1,
                    text: None
                },
                key("name")
            ]
        );
    }

    #[test]
    fn block_scalars_are_opaque() {
        let found = anchors("cmd: |\n  # not a comment\n  key: no\nnext: 1\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].path, vec![key("next")]);
    }

    #[test]
    fn comment_splitting_respects_quotes() {
        assert_eq!(split_comment("\"a # b\" # c"), ("\"a # b\"", Some("# c".into())));
        assert_eq!(split_comment("'it''s # x'"), ("'it''s # x'", None));
        assert_eq!(split_comment("url#frag"), ("url#frag", None));
        assert_eq!(split_comment("# only"), ("", Some("# only".into())));
    }

    #[test]
    fn reattach_to_reformatted_text() {
        let source = "# stack header\nservices:\n  # the web tier\n  web:\n    image: \"nginx:1.25\" # pinned\n# trailing\n";
        let emitted = "services:\n  web:\n    image: nginx:1.26\n";
        let out = CommentMap::extract(source).reattach(emitted);
        assert_eq!(
            out,
            "# stack header\nservices:\n  # the web tier\n  web:\n    image: nginx:1.26 # pinned\n# trailing\n"
        );
    }

    #[test]
    fn identical_siblings_take_comments_in_order() {
        let source = "ports:\n  # first\n  - \"80:80\"\n  # second\n  - \"80:80\"\n";
        let emitted = "ports:\n- 80:80\n- 80:80\n";
        let out = CommentMap::extract(source).reattach(emitted);
        assert_eq!(out, "ports:\n# first\n- 80:80\n# second\n- 80:80\n");
    }

    #[test]
    fn no_comments_passes_through() {
        let map = CommentMap::extract("a: 1\nb: 2\n");
        assert!(map.is_empty());
        assert_eq!(map.reattach("a: 1\n"), "a: 1\n");
    }
}
