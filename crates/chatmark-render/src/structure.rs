//! Block structurer: folds tagged lines into HTML segments.
//!
//! Runs of consecutive lines of one kind become one structure. Ordered lists
//! and blockquotes nest through a [`NestingStack`]; any line of another kind
//! (or the end of the text block) closes every open level.

use crate::inline::style_inline;
use crate::lines::{classify, Line};
use crate::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    OrderedList,
    Quote,
}

impl FrameKind {
    fn open_tag(self) -> &'static str {
        match self {
            FrameKind::OrderedList => "<ol>",
            FrameKind::Quote => "<blockquote>",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            FrameKind::OrderedList => "</ol>",
            FrameKind::Quote => "</blockquote>",
        }
    }
}

#[derive(Debug)]
struct Frame {
    depth: usize,
    kind: FrameKind,
    /// An `<li>` is open inside this list level.
    item_open: bool,
}

/// Open nesting levels, strictly increasing in depth from bottom to top.
#[derive(Debug, Default)]
struct NestingStack {
    frames: Vec<Frame>,
}

impl NestingStack {
    fn top_depth(&self) -> Option<usize> {
        self.frames.last().map(|f| f.depth)
    }

    fn open(&mut self, depth: usize, kind: FrameKind, out: &mut String) {
        debug_assert!(self.top_depth().map_or(true, |top| top < depth));
        out.push_str(kind.open_tag());
        self.frames.push(Frame {
            depth,
            kind,
            item_open: false,
        });
    }

    /// Close every level deeper than `depth`.
    fn close_to(&mut self, depth: usize, out: &mut String) {
        while self.top_depth().is_some_and(|top| top > depth) {
            if let Some(frame) = self.frames.pop() {
                Self::close_frame(frame, out);
            }
        }
    }

    fn close_all(&mut self, out: &mut String) {
        while let Some(frame) = self.frames.pop() {
            Self::close_frame(frame, out);
        }
    }

    fn close_frame(frame: Frame, out: &mut String) {
        if frame.item_open {
            out.push_str("</li>");
        }
        out.push_str(frame.kind.close_tag());
    }

    fn start_item(&mut self, out: &mut String) {
        if let Some(top) = self.frames.last_mut() {
            if top.item_open {
                out.push_str("</li>");
            }
            out.push_str("<li>");
            top.item_open = true;
        }
    }
}

/// Structure the lines of one text block (no code fences inside).
pub fn structure(lines: &[&str]) -> Vec<Segment> {
    let tagged: Vec<Line<'_>> = lines.iter().map(|line| classify(line)).collect();
    let mut segments = Vec::new();

    let mut start = 0;
    while start < tagged.len() {
        let first = &tagged[start];
        let len = tagged[start..]
            .iter()
            .take_while(|line| line.same_kind(first))
            .count();
        let run = &tagged[start..start + len];
        start += len;

        match first {
            Line::Heading { .. } => {
                for line in run {
                    if let Line::Heading { level, text } = line {
                        segments.push(Segment::Structural(format!(
                            "<h{level}>{}</h{level}>",
                            style_inline(text)
                        )));
                    }
                }
            }
            Line::OrderedItem { .. } => segments.push(Segment::Structural(ordered_list(run))),
            Line::UnorderedItem { .. } => segments.push(Segment::Structural(unordered_list(run))),
            Line::Quote { .. } => segments.push(Segment::Structural(blockquote(run))),
            Line::TableRow { .. } => segments.push(Segment::Structural(table(run))),
            Line::Plain(_) => {
                if let Some(plain) = plain_text(run) {
                    segments.push(Segment::Plain(plain));
                }
            }
        }
    }

    segments
}

fn ordered_list(run: &[Line<'_>]) -> String {
    let mut out = String::new();
    let mut stack = NestingStack::default();

    for line in run {
        let Line::OrderedItem { indent, text } = line else { continue };
        let indent = *indent;

        match stack.top_depth() {
            None => stack.open(indent, FrameKind::OrderedList, &mut out),
            // Deeper: the new list lives inside the currently open item
            Some(top) if indent > top => stack.open(indent, FrameKind::OrderedList, &mut out),
            Some(_) => {
                stack.close_to(indent, &mut out);
                if stack.top_depth() != Some(indent) {
                    // Dedent to a level that was never opened
                    stack.close_all(&mut out);
                    stack.open(indent, FrameKind::OrderedList, &mut out);
                }
            }
        }

        stack.start_item(&mut out);
        out.push_str(&style_inline(text));
    }

    stack.close_all(&mut out);
    out
}

fn unordered_list(run: &[Line<'_>]) -> String {
    let mut out = String::from("<ul>");
    for line in run {
        if let Line::UnorderedItem { text } = line {
            out.push_str("<li>");
            out.push_str(&style_inline(text));
            out.push_str("</li>");
        }
    }
    out.push_str("</ul>");
    out
}

fn blockquote(run: &[Line<'_>]) -> String {
    let mut out = String::new();
    let mut stack = NestingStack::default();
    let mut after_text = false;

    for line in run {
        let Line::Quote { depth, text } = line else { continue };
        let depth = *depth;

        let current = stack.top_depth().unwrap_or(0);
        if depth < current {
            stack.close_to(depth, &mut out);
            after_text = false;
        }
        // One frame per level, so every shallower depth is already on the stack
        let mut level = stack.top_depth().unwrap_or(0);
        while level < depth {
            level += 1;
            stack.open(level, FrameKind::Quote, &mut out);
            after_text = false;
        }

        if !text.is_empty() {
            if after_text {
                out.push('\n');
            }
            out.push_str(&style_inline(text));
            after_text = true;
        }
    }

    stack.close_all(&mut out);
    out
}

fn table(run: &[Line<'_>]) -> String {
    let mut out = String::from("<table>");
    for line in run {
        if let Line::TableRow { cells } = line {
            out.push_str("<tr>");
            for cell in cells {
                out.push_str("<td>");
                out.push_str(&style_inline(cell));
                out.push_str("</td>");
            }
            out.push_str("</tr>");
        }
    }
    out.push_str("</table>");
    out
}

/// Blank lines at the edges of a plain run only separate it from its
/// neighbours and are dropped.
fn plain_text(run: &[Line<'_>]) -> Option<String> {
    let first = run.iter().position(|line| !line.is_blank())?;
    let last = run.iter().rposition(|line| !line.is_blank())?;
    let styled: Vec<String> = run[first..=last]
        .iter()
        .map(|line| match line {
            Line::Plain(text) => style_inline(text),
            _ => String::new(),
        })
        .collect();
    Some(styled.join("\n"))
}
