//! The five-post reply contract.
//!
//! A reply is exactly five blocks in this shape, separated by one blank line:
//!
//! ```text
//! Post 1:
//! Title: <single line>
//! Content: <one or more lines>
//! Keywords: #tag1 #tag2
//! ```
//!
//! [`ContentBatch::parse`] is strict about structure and lenient about
//! decoration: it skips chatter before `Post 1:` and after the final
//! Keywords line, and it accepts Markdown emphasis around labels. Anything
//! else that breaks the shape is a [`FormatError`]; there is no partial
//! result. [`ContentBatch::format`] writes the canonical shape, and parsing
//! its output yields the same batch.

use std::fmt;
use std::sync::LazyLock;

use postwright_core::error::FormatError;
use regex_lite::Regex;

/// Number of posts in every reply.
pub const POSTS_PER_BATCH: usize = 5;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*)?(?:\*\*)?post\s+(\d+)\s*:?\s*(?:\*\*)?\s*:?$")
        .expect("header pattern is valid")
});

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // `**Label:**` and `**Label**:` close their own emphasis; a bare `Label:`
    // leaves the value untouched, leading `**` included.
    Regex::new(
        r"(?i)^(?:#+\s*)?(?:\*\*(title|content|keywords)(?::\*\*|\*\*\s*:)|(title|content|keywords)\s*:)\s*(.*)$",
    )
    .expect("label pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Title,
    Content,
    Keywords,
}

impl Label {
    fn field(self) -> &'static str {
        match self {
            Label::Title => "Title",
            Label::Content => "Content",
            Label::Keywords => "Keywords",
        }
    }
}

fn header_number(line: &str) -> Option<usize> {
    HEADER_RE
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn label(line: &str) -> Option<(Label, String)> {
    let caps = LABEL_RE.captures(line.trim())?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().to_ascii_lowercase();
    let rest = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
    let label = match name.as_str() {
        "title" => Label::Title,
        "content" => Label::Content,
        _ => Label::Keywords,
    };
    Some((label, rest.to_string()))
}

/// Trim every line, drop leading and trailing blank lines, and collapse runs
/// of blank lines into one.
fn normalize_body(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() && lines.last().is_none_or(|prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// A keyword as `parse_tags` accepts it once trailing commas are gone.
fn valid_tag(tag: &str) -> bool {
    tag.len() > 1
        && tag.starts_with('#')
        && !tag.ends_with(',')
        && !tag.chars().any(char::is_whitespace)
}

/// Whether `line` reads back as `expected` with `value`.
fn reads_back(line: &str, expected: Label, value: &str) -> bool {
    label(line).is_some_and(|(found, rest)| found == expected && rest == value)
}

fn parse_tags(index: usize, raw: &str) -> Result<Vec<String>, FormatError> {
    raw.split_whitespace()
        .map(|token| token.trim_end_matches(','))
        .filter(|token| !token.is_empty())
        .map(|token| {
            if valid_tag(token) {
                Ok(token.to_string())
            } else {
                Err(FormatError::InvalidKeyword {
                    index,
                    token: token.to_string(),
                })
            }
        })
        .collect()
}

/// One generated post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    index: usize,
    title: String,
    body: String,
    tags: Vec<String>,
}

impl ContentItem {
    /// Build a post, normalizing whitespace.
    ///
    /// Rejects an empty or multi-line title, an empty body, body lines that
    /// would read back as a header or label, and tags that are not a single
    /// `#word` token.
    pub fn new(
        index: usize,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Self, FormatError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(FormatError::EmptyField { index, field: "Title" });
        }
        if title.contains('\n') || !reads_back(&format!("Title: {title}"), Label::Title, &title) {
            return Err(FormatError::UnexpectedLine { index, line: title });
        }

        let body = normalize_body(&body.into());
        if body.is_empty() {
            return Err(FormatError::EmptyField { index, field: "Content" });
        }
        let first = body.lines().next().unwrap_or_default();
        if !reads_back(&format!("Content: {first}"), Label::Content, first) {
            return Err(FormatError::UnexpectedLine {
                index,
                line: first.to_string(),
            });
        }
        if let Some(line) = body
            .lines()
            .skip(1)
            .find(|line| header_number(line).is_some() || label(line).is_some())
        {
            return Err(FormatError::UnexpectedLine {
                index,
                line: line.to_string(),
            });
        }

        for tag in &tags {
            if !valid_tag(tag) {
                return Err(FormatError::InvalidKeyword {
                    index,
                    token: tag.clone(),
                });
            }
        }

        Ok(Self { index, title, body, tags })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Post {}:", self.index)?;
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Content: {}", self.body)?;
        if self.tags.is_empty() {
            write!(f, "Keywords:")
        } else {
            write!(f, "Keywords: {}", self.tags.join(" "))
        }
    }
}

/// Exactly [`POSTS_PER_BATCH`] posts, indexed 1..=5 in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBatch {
    items: Vec<ContentItem>,
}

impl ContentBatch {
    /// Assemble a batch, enforcing the count and the index sequence.
    pub fn new(items: Vec<ContentItem>) -> Result<Self, FormatError> {
        if items.len() != POSTS_PER_BATCH {
            return Err(FormatError::WrongPostCount {
                expected: POSTS_PER_BATCH,
                found: items.len(),
            });
        }
        for (position, item) in items.iter().enumerate() {
            if item.index != position + 1 {
                return Err(FormatError::OutOfOrder {
                    expected: position + 1,
                    found: item.index,
                });
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Serialize to the reply text. No trailing newline.
    pub fn format(&self) -> String {
        self.items
            .iter()
            .map(ContentItem::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Parse generator output into a batch.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut blocks: Vec<(usize, Vec<&str>)> = Vec::new();

        for line in text.lines() {
            if let Some(number) = header_number(line) {
                let expected = blocks.len() + 1;
                if number != expected {
                    return Err(FormatError::OutOfOrder {
                        expected,
                        found: number,
                    });
                }
                blocks.push((number, Vec::new()));
            } else if let Some((_, lines)) = blocks.last_mut() {
                lines.push(line);
            }
            // Lines before the first header are preamble.
        }

        if blocks.is_empty() {
            return Err(FormatError::NoPosts);
        }
        if blocks.len() != POSTS_PER_BATCH {
            return Err(FormatError::WrongPostCount {
                expected: POSTS_PER_BATCH,
                found: blocks.len(),
            });
        }

        let items = blocks
            .into_iter()
            .map(|(index, lines)| parse_block(index, &lines, index == POSTS_PER_BATCH))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(items)
    }
}

impl fmt::Display for ContentBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    ExpectTitle,
    ExpectContent,
    InContent,
    AfterKeywords,
}

/// Parse the lines following a `Post N:` header.
///
/// `last` relaxes the check on trailing text, which for the final block is
/// generator sign-off rather than part of the post.
fn parse_block(index: usize, lines: &[&str], last: bool) -> Result<ContentItem, FormatError> {
    let mut state = BlockState::ExpectTitle;
    let mut title = String::new();
    let mut body: Vec<String> = Vec::new();
    let mut tags = Vec::new();

    for raw in lines {
        let line = raw.trim();
        let labelled = label(line);

        state = match (state, labelled) {
            (BlockState::ExpectTitle | BlockState::ExpectContent, None) if line.is_empty() => state,
            (BlockState::AfterKeywords, None) if line.is_empty() || last => state,

            (BlockState::ExpectTitle, Some((Label::Title, rest))) => {
                title = rest;
                BlockState::ExpectContent
            }
            (BlockState::ExpectTitle, Some(_)) => {
                return Err(FormatError::MissingField { index, field: "Title" });
            }

            (BlockState::ExpectContent, Some((Label::Content, rest))) => {
                body.push(rest);
                BlockState::InContent
            }
            (BlockState::ExpectContent, Some((Label::Keywords, _))) => {
                return Err(FormatError::MissingField { index, field: "Content" });
            }

            (BlockState::InContent, None) => {
                body.push(line.to_string());
                BlockState::InContent
            }
            (BlockState::InContent, Some((Label::Keywords, rest))) => {
                tags = parse_tags(index, &rest)?;
                BlockState::AfterKeywords
            }

            (_, Some((found, _))) => {
                return Err(FormatError::DuplicateField {
                    index,
                    field: found.field(),
                });
            }
            (_, None) => {
                return Err(FormatError::UnexpectedLine {
                    index,
                    line: line.to_string(),
                });
            }
        };
    }

    match state {
        BlockState::ExpectTitle => Err(FormatError::MissingField { index, field: "Title" }),
        BlockState::ExpectContent => Err(FormatError::MissingField { index, field: "Content" }),
        BlockState::InContent => Err(FormatError::MissingField { index, field: "Keywords" }),
        BlockState::AfterKeywords => ContentItem::new(index, title, body.join("\n"), tags),
    }
}
