//! Line tokenizer for the block structurer.
//!
//! Each line outside a code block is tagged with the construct it starts.
//! Precedence is fixed: heading, ordered item, unordered item, blockquote,
//! table row, plain.

use once_cell::sync::Lazy;
use regex::Regex;

static ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\d+\.\s+(.*)$").expect("ordered item pattern"));
static UNORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").expect("unordered item pattern"));
static QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(>+)\s*(.*)$").expect("blockquote pattern"));

/// A tagged source line. Content is still raw markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Heading { level: u8, text: &'a str },
    /// `indent` is the raw count of leading whitespace characters.
    OrderedItem { indent: usize, text: &'a str },
    UnorderedItem { text: &'a str },
    /// `depth` is the number of leading `>` characters.
    Quote { depth: usize, text: &'a str },
    TableRow { cells: Vec<&'a str> },
    Plain(&'a str),
}

impl Line<'_> {
    /// True when two lines belong to the same kind of run.
    pub fn same_kind(&self, other: &Line<'_>) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Line::Plain(text) if text.trim().is_empty())
    }
}

/// Tag a single line (no trailing newline).
pub fn classify(line: &str) -> Line<'_> {
    // Longest marker first
    if let Some(text) = line.strip_prefix("### ") {
        return Line::Heading { level: 3, text };
    }
    if let Some(text) = line.strip_prefix("## ") {
        return Line::Heading { level: 2, text };
    }
    if let Some(text) = line.strip_prefix("# ") {
        return Line::Heading { level: 1, text };
    }

    if let Some(caps) = ORDERED_ITEM.captures(line) {
        let indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
        let text = caps.get(2).map_or("", |m| m.as_str());
        return Line::OrderedItem { indent, text };
    }

    if let Some(caps) = UNORDERED_ITEM.captures(line) {
        let text = caps.get(1).map_or("", |m| m.as_str());
        return Line::UnorderedItem { text };
    }

    if let Some(caps) = QUOTE.captures(line) {
        let depth = caps.get(1).map_or(0, |m| m.as_str().len());
        let text = caps.get(2).map_or("", |m| m.as_str());
        return Line::Quote { depth, text };
    }

    if let Some(cells) = table_cells(line) {
        return Line::TableRow { cells };
    }

    Line::Plain(line)
}

/// Split `|a|b|` into trimmed cells. Pipes inside backtick spans do not split.
fn table_cells(line: &str) -> Option<Vec<&str>> {
    let row = line.trim_end();
    if row.len() < 3 || !row.starts_with('|') || !row.ends_with('|') {
        return None;
    }
    let inner = &row[1..row.len() - 1];

    let mut cells = Vec::new();
    let mut start = 0;
    let mut in_code = false;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '`' => in_code = !in_code,
            '|' if !in_code => {
                cells.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    cells.push(inner[start..].trim());
    Some(cells)
}
