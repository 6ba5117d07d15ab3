//! Markdown-to-HTML rendering for chat messages.
//!
//! The engine understands a deliberately small dialect: `#`/`##`/`###`
//! headings, fenced code blocks with an optional language tag, inline code,
//! bold, italic, strikethrough, links, ordered lists nested by indentation,
//! flat unordered lists, blockquotes nested by `>` count and pipe table rows.
//! Everything else passes through as escaped text.
//!
//! Passes, in order:
//! - fenced code extraction (protected segments)
//! - line tagging and structural reduction (structural and plain segments)
//! - inline styling of every piece of content
//! - line breaks for plain segments, then stray-break cleanup
//!
//! No raw input character reaches the output without being escaped, except
//! the delimiters the engine emits itself.

pub mod escape;
pub mod fence;
pub mod inline;
pub mod linebreak;
pub mod lines;
pub mod structure;

pub use escape::escape_html;

use tracing::trace;

use fence::{code_block_html, extract_blocks, Block};
use linebreak::{apply_line_breaks, strip_stray_breaks};
use structure::structure;

/// A piece of the document between structuring and the line-break pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Code block HTML. Never scanned again.
    Protected(String),
    /// Heading, list, blockquote or table HTML.
    Structural(String),
    /// Inline-styled text whose newlines still need `<br>`.
    Plain(String),
}

/// Render markdown to an HTML fragment.
///
/// Total: any input produces best-effort HTML, nothing panics.
pub fn render(markdown: &str) -> String {
    let normalized = markdown.replace("\r\n", "\n").replace('\r', "\n");

    let mut segments = Vec::new();
    for block in extract_blocks(&normalized) {
        match block {
            Block::Code { lang, body } => {
                segments.push(Segment::Protected(code_block_html(lang, &body)))
            }
            Block::Text(lines) => segments.extend(structure(&lines)),
        }
    }
    trace!(
        "Rendering {} bytes of markdown into {} segments",
        markdown.len(),
        segments.len()
    );

    strip_stray_breaks(&apply_line_breaks(segments))
}

/// Something that turns a finished markdown buffer into HTML.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// The default [`Renderer`], backed by [`render`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, markdown: &str) -> String {
        render(markdown)
    }
}
