//! Fenced code block extraction.
//!
//! Runs before every other pass. The document is cut into text blocks and
//! code blocks; code blocks are escaped and wrapped here and become protected
//! segments, so heading, list and emphasis rules never see their contents.

use tracing::debug;

use crate::escape::{escape_html, is_bare_identifier};

const FENCE: &str = "```";

/// A top-level block of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block<'a> {
    /// Consecutive lines outside any fence.
    Text(Vec<&'a str>),
    /// A fenced code block with its (validated) language tag.
    Code { lang: Option<&'a str>, body: String },
}

/// Split a newline-normalized document into text and code blocks.
///
/// A fence opens on any line whose left-trimmed text starts with three
/// backticks and closes on the next line that is exactly three backticks.
/// An unclosed fence runs to the end of the document.
pub fn extract_blocks(doc: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut text: Vec<&str> = Vec::new();
    let mut lines = doc.split('\n');

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        let Some(after_fence) = trimmed.strip_prefix(FENCE) else {
            text.push(line);
            continue;
        };

        if !text.is_empty() {
            blocks.push(Block::Text(std::mem::take(&mut text)));
        }

        // "```code```" on a single line
        let rest = after_fence.trim_end();
        if let Some(inline_body) = rest.strip_suffix(FENCE) {
            blocks.push(Block::Code {
                lang: None,
                body: inline_body.trim().to_string(),
            });
            continue;
        }

        let tag = rest.trim();
        let lang = if is_bare_identifier(tag) {
            Some(tag)
        } else {
            if !tag.is_empty() {
                debug!("Dropping invalid code fence language tag: {:?}", tag);
            }
            None
        };

        let mut body_lines: Vec<&str> = Vec::new();
        let mut closed = false;
        for body_line in lines.by_ref() {
            if body_line.trim() == FENCE {
                closed = true;
                break;
            }
            body_lines.push(body_line);
        }
        if !closed {
            debug!("Unclosed code fence, closing at end of input");
        }

        blocks.push(Block::Code {
            lang,
            body: trim_body(&body_lines),
        });
    }

    if !text.is_empty() {
        blocks.push(Block::Text(text));
    }

    blocks
}

/// Drop leading blank lines and trailing whitespace, keeping first-line indentation.
fn trim_body(lines: &[&str]) -> String {
    let first = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    lines[first..].join("\n").trim_end().to_string()
}

/// Wrap an (unescaped) code body in `<pre><code>` markup.
pub fn code_block_html(lang: Option<&str>, body: &str) -> String {
    match lang.filter(|l| is_bare_identifier(l)) {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            lang,
            escape_html(body)
        ),
        None => format!("<pre><code>{}</code></pre>", escape_html(body)),
    }
}
